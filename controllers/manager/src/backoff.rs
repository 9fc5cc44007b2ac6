//! # Exponential Backoff
//!
//! Per-key retry delays for failed reconcile passes. Delays start at 5s,
//! double on each consecutive failure and are capped at 5 minutes. A
//! successful pass resets the key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Exponential backoff calculator
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }
}

/// Backoff state tracked per reconcile key
#[derive(Debug, Default)]
pub struct BackoffTracker {
    states: Mutex<HashMap<String, ExponentialBackoff>>,
}

impl BackoffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before retrying `key` after another failure.
    pub fn next_delay(&self, key: &str) -> Duration {
        match self.states.lock() {
            Ok(mut states) => states.entry(key.to_string()).or_default().next_backoff(),
            Err(_) => ExponentialBackoff::default().next_backoff(),
        }
    }

    /// Forget failures recorded for `key`.
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }
}
