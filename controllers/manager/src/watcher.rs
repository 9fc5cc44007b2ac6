//! Kubernetes resource watchers.
//!
//! The `Manager` is a singleton, so every watched dependency, rendered
//! Deployments included, maps to the same cluster-scoped reconcile key. `kube_runtime::Controller` guarantees at most one
//! pass per key runs at a time.

use crate::backoff::BackoffTracker;
use crate::error::ControllerError;
use crate::names::*;
use crate::probes::Metrics;
use crate::reconciler::Reconciler;
use crds::{
    APIServer, Authentication, Compliance, ImageSet, Installation, LicenseKey, Manager, ManagementCluster,
    ManagementClusterConnection, DEFAULT_INSTANCE_NAME,
};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller, WatchStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared state handed to every reconcile.
pub struct Context {
    pub reconciler: Arc<Reconciler>,
    pub backoff: BackoffTracker,
    pub metrics: Metrics,
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

fn singleton<T>(_: T) -> Option<ObjectRef<Manager>> {
    Some(ObjectRef::new(DEFAULT_INSTANCE_NAME))
}

fn named(names: &'static [&'static str]) -> impl Fn(&str) -> Option<ObjectRef<Manager>> + Clone {
    move |name| {
        names
            .iter()
            .any(|n| *n == name)
            .then(|| ObjectRef::new(DEFAULT_INSTANCE_NAME))
    }
}

fn by_name(name: &str) -> watcher::Config {
    watcher::Config::default().fields(&format!("metadata.name={name}"))
}

async fn reconcile(manager: Arc<Manager>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = manager.name_any();
    if key != DEFAULT_INSTANCE_NAME {
        debug!(%key, "Ignoring Manager with non-default name");
        return Ok(Action::await_change());
    }

    let result = ctx.reconciler.reconcile(&key, &ctx.cancel).await;
    ctx.metrics.observe(result.as_ref().map(|report| &report.status));

    let report = result?;
    ctx.backoff.reset(&key);
    Ok(match report.requeue_after {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    })
}

fn error_policy(manager: Arc<Manager>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = manager.name_any();
    let delay = ctx.backoff.next_delay(&key);
    error!(
        %key,
        kind = error.kind().as_str(),
        "Reconciliation failed, retrying in {:?}: {}",
        delay,
        error
    );
    Action::requeue(delay)
}

/// Triggers a reconcile of every Manager once the license API is ready,
/// and again on every `LicenseKey` change.
async fn forward_license_events(client: Client, ctx: Arc<Context>, mut trigger: mpsc::Sender<()>) {
    let flag = ctx.reconciler.license_api_ready().clone();
    tokio::select! {
        () = ctx.cancel.cancelled() => return,
        () = flag.wait() => {}
    }
    if trigger.send(()).await.is_err() {
        return;
    }

    info!("Starting LicenseKey watcher");
    let licenses: Api<LicenseKey> = Api::all(client);
    let mut events = watcher(licenses, watcher::Config::default())
        .default_backoff()
        .applied_objects()
        .boxed();

    loop {
        let next = tokio::select! {
            () = ctx.cancel.cancelled() => return,
            next = events.next() => next,
        };
        match next {
            Some(Ok(license)) => {
                debug!(name = %license.name_any(), "LicenseKey changed");
                if trigger.send(()).await.is_err() {
                    return;
                }
            }
            Some(Err(e)) => warn!("LicenseKey watch error: {}", e),
            None => return,
        }
    }
}

/// Runs the Manager controller until `ctx.cancel` fires.
pub async fn watch_managers(client: Client, operator_namespace: String, ctx: Arc<Context>) -> Result<(), ControllerError> {
    info!("Starting Manager watcher");

    let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
    tokio::spawn(forward_license_events(client.clone(), Arc::clone(&ctx), trigger_tx));

    let secrets = named(WATCHED_SECRETS);
    let manager_secrets = named(WATCHED_SECRETS);
    let deployments = named(WATCHED_DEPLOYMENTS);
    let config_maps = named(WATCHED_CONFIG_MAPS);
    let cancel = ctx.cancel.clone();

    Controller::new(Api::<Manager>::all(client.clone()), watcher::Config::default())
        .with_config(RuntimeConfig::default().debounce(Duration::from_secs(1)))
        .watches(
            Api::<Deployment>::namespaced(client.clone(), MANAGER_NAMESPACE),
            watcher::Config::default(),
            move |deployment: Deployment| deployments(&deployment.name_any()),
        )
        .watches(Api::<Installation>::all(client.clone()), watcher::Config::default(), singleton)
        .watches(Api::<APIServer>::all(client.clone()), watcher::Config::default(), singleton)
        .watches(Api::<Compliance>::all(client.clone()), watcher::Config::default(), singleton)
        .watches(Api::<ManagementCluster>::all(client.clone()), watcher::Config::default(), singleton)
        .watches(
            Api::<ManagementClusterConnection>::all(client.clone()),
            watcher::Config::default(),
            singleton,
        )
        .watches(Api::<Authentication>::all(client.clone()), watcher::Config::default(), singleton)
        .watches(Api::<ImageSet>::all(client.clone()), watcher::Config::default(), singleton)
        .watches(
            Api::<Secret>::namespaced(client.clone(), &operator_namespace),
            watcher::Config::default(),
            move |secret: Secret| secrets(&secret.name_any()),
        )
        .watches(
            Api::<Secret>::namespaced(client.clone(), MANAGER_NAMESPACE),
            watcher::Config::default(),
            move |secret: Secret| manager_secrets(&secret.name_any()),
        )
        .watches(
            Api::<ConfigMap>::namespaced(client.clone(), &operator_namespace),
            watcher::Config::default(),
            move |cm: ConfigMap| config_maps(&cm.name_any()),
        )
        .watches(
            Api::<ConfigMap>::namespaced(client.clone(), ECK_OPERATOR_NAMESPACE),
            by_name(ECK_LICENSE_CONFIG_MAP),
            singleton,
        )
        .watches(Api::<Namespace>::all(client), by_name(PROMETHEUS_NAMESPACE), singleton)
        .reconcile_all_on(trigger_rx)
        .graceful_shutdown_on(cancel.cancelled_owned())
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {}", obj.name),
                Err(e) => debug!("Controller event error: {}", e),
            }
        })
        .await;

    info!("Manager watcher stopped");
    Ok(())
}
