use std::fmt::Debug;
use std::sync::Arc;

use async_channel::Sender;
use futures::{Stream, StreamExt};
use kube::api::ListParams;
use kube::core::WatchEvent;
use kube::{Api, Resource, ResourceExt};
use kube_client::config::KubeConfigOptions;
use kube_client::{Client, Config};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::configuration::{ClusterSettings, OrchestratorKind};
use crate::kubernetes::model::{
    ClusterError, ClusterOrchestrator, WatchAction, WatchStream, WorkloadEvent,
};

pub mod kubers;
pub mod model;
pub mod openshift;
#[cfg(test)]
pub mod stubs;

pub type SharedOrchestrator = Arc<dyn ClusterOrchestrator + Send + Sync + 'static>;

/// Condition the controllers set when pods can not be created.
const REPLICA_FAILURE: &str = "ReplicaFailure";

pub async fn connect(settings: &ClusterSettings) -> anyhow::Result<SharedOrchestrator> {
    let config = client_config(settings).await?;
    let master_url = config.cluster_url.to_string();
    let client = Client::try_from(config)?;

    let orchestrator: SharedOrchestrator = match settings.orchestrator {
        OrchestratorKind::Kubernetes => Arc::new(kubers::KubernetesCluster::new(
            client,
            master_url,
            settings,
        )),
        OrchestratorKind::Openshift => Arc::new(openshift::OpenShiftCluster::new(
            client,
            master_url,
            settings,
        )),
    };
    Ok(orchestrator)
}

async fn client_config(settings: &ClusterSettings) -> anyhow::Result<Config> {
    let mut config = match &settings.context {
        Some(context) => {
            let context_options = KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            };
            Config::from_kubeconfig(&context_options).await?
        }
        None => Config::infer().await?,
    };
    if let Some(master) = settings.master.as_deref().filter(|m| !m.trim().is_empty()) {
        config.cluster_url = master.parse()?;
    }
    config.accept_invalid_certs = settings.accept_invalid_certs;
    Ok(config)
}

/// Runs the API watch on its own task so the returned stream owns everything it needs.
/// Watches the server expires are resumed from the last seen resource version.
/// The stream ends after the first transport error or error response.
fn forward_watch<K, F>(api: Api<K>, resource_version: String, convert: F) -> WatchStream
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    F: Fn(WatchAction, K) -> WorkloadEvent + Send + Sync + 'static,
{
    let (events_s, events_r) = async_channel::bounded(64);

    tokio::spawn(async move {
        let mut resource_version = resource_version;
        loop {
            let events = match api.watch(&ListParams::default(), &resource_version).await {
                Ok(events) => events,
                Err(e) => {
                    let _ = events_s.send(Err(ClusterError::from(e))).await;
                    return;
                }
            };
            let relayed = relay(events, &mut resource_version, &convert, &events_s).await;
            if relayed == Relay::Stopped {
                return;
            }
            debug!(%resource_version, "watch expired, resuming");
        }
    });

    events_r.boxed()
}

#[derive(Debug, PartialEq, Eq)]
enum Relay {
    /// The server closed the watch.
    Exhausted,
    /// An error was forwarded or nobody listens anymore.
    Stopped,
}

enum WatchStep<K> {
    Forward(WatchAction, K),
    Bookmark(String),
    End(ClusterError),
}

fn watch_step<K>(event: Result<WatchEvent<K>, kube::Error>) -> WatchStep<K> {
    match event {
        Ok(WatchEvent::Added(o)) => WatchStep::Forward(WatchAction::Added, o),
        Ok(WatchEvent::Modified(o)) => WatchStep::Forward(WatchAction::Modified, o),
        Ok(WatchEvent::Deleted(o)) => WatchStep::Forward(WatchAction::Deleted, o),
        Ok(WatchEvent::Bookmark(b)) => WatchStep::Bookmark(b.metadata.resource_version),
        Ok(WatchEvent::Error(e)) => WatchStep::End(ClusterError::WatchRejected {
            code: e.code,
            message: e.message,
        }),
        Err(e) => WatchStep::End(ClusterError::from(e)),
    }
}

/// Forwards one watch call, keeping `resource_version` at the newest version seen.
async fn relay<K, S, F>(
    events: S,
    resource_version: &mut String,
    convert: &F,
    events_s: &Sender<Result<WorkloadEvent, ClusterError>>,
) -> Relay
where
    K: Resource,
    S: Stream<Item = Result<WatchEvent<K>, kube::Error>>,
    F: Fn(WatchAction, K) -> WorkloadEvent,
{
    let mut events = Box::pin(events);
    while let Some(event) = events.next().await {
        let forwarded = match watch_step(event) {
            WatchStep::Forward(action, o) => {
                if let Some(version) = o.resource_version() {
                    *resource_version = version;
                }
                Ok(convert(action, o))
            }
            WatchStep::Bookmark(version) => {
                *resource_version = version;
                continue;
            }
            WatchStep::End(e) => Err(e),
        };
        let failed = forwarded.is_err();
        if events_s.send(forwarded).await.is_err() || failed {
            return Relay::Stopped;
        }
    }
    Relay::Exhausted
}

/// Modifications of a workload whose controller reports a replica failure surface as errors.
fn modified_or_error(action: WatchAction, replica_failure: bool) -> WatchAction {
    match action {
        WatchAction::Modified if replica_failure => WatchAction::Error,
        other => other,
    }
}
