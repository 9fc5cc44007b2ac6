//! License API readiness latch.
//!
//! The `LicenseKey` kind is served by an aggregated API that may come up
//! after the controller. A background task polls discovery until the kind
//! appears, then sets a one-way flag and wakes anyone waiting on it so a
//! reconcile can be triggered. Reconciliation only reads the flag.

use cluster_client::ClusterStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval between discovery polls.
pub const LICENSE_API_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct Inner {
    ready: AtomicBool,
    notify: Notify,
}

/// One-shot readiness flag. Once set it never resets.
#[derive(Debug, Clone, Default)]
pub struct ReadyFlag {
    inner: Arc<Inner>,
}

impl ReadyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Sets the flag. Returns `true` only for the call that flipped it.
    pub fn mark_ready(&self) -> bool {
        let first = !self.inner.ready.swap(true, Ordering::AcqRel);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Resolves once the flag is set.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_ready() {
                return;
            }
            notified.await;
        }
    }
}

/// Polls discovery until the license API is served, then sets `flag`.
/// Returns early on cancellation.
pub async fn wait_for_license_api(
    store: Arc<dyn ClusterStore>,
    flag: ReadyFlag,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        match store.license_api_available().await {
            Ok(true) => {
                if flag.mark_ready() {
                    info!("LicenseKey API is available");
                }
                return;
            }
            Ok(false) => debug!("LicenseKey API not yet available"),
            Err(e) => warn!("Failed to check LicenseKey API availability: {}", e),
        }

        tokio::select! {
            () = cancel.cancelled() => {
                debug!("License API bootstrap cancelled");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_client::MockClusterStore;

    #[tokio::test]
    async fn test_flag_is_monotonic() {
        let flag = ReadyFlag::new();
        assert!(!flag.is_ready());
        assert!(flag.mark_ready());
        assert!(!flag.mark_ready());
        assert!(flag.is_ready());
        flag.wait().await;
    }

    #[tokio::test]
    async fn test_waiters_are_woken() {
        let flag = ReadyFlag::new();
        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.wait().await })
        };
        tokio::task::yield_now().await;
        flag.mark_ready();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_bootstrap_sets_flag_when_api_appears() {
        let mock = MockClusterStore::new();
        let store: Arc<dyn ClusterStore> = Arc::new(mock.clone());
        let flag = ReadyFlag::new();

        let task = tokio::spawn(wait_for_license_api(
            store,
            flag.clone(),
            Duration::from_millis(5),
            CancellationToken::new(),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!flag.is_ready());

        mock.set_license_api_available(true);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(flag.is_ready());
    }

    #[tokio::test]
    async fn test_bootstrap_stops_on_cancel() {
        let store: Arc<dyn ClusterStore> = Arc::new(MockClusterStore::new());
        let flag = ReadyFlag::new();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(wait_for_license_api(
            store,
            flag.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        ));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!flag.is_ready());
    }
}
