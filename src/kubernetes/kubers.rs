use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, ResourceExt};
use kube_client::Client;
use serde_json::json;

use crate::configuration::ClusterSettings;
use crate::kubernetes::model::{
    ClusterError, ClusterOrchestrator, LabelKeys, WatchAction, WatchStream, Workload,
    WorkloadEvent, WorkloadList,
};
use crate::kubernetes::{forward_watch, modified_or_error, REPLICA_FAILURE};

/// Kubernetes `apps/v1` deployments of a single namespace.
pub struct KubernetesCluster {
    api: Api<Deployment>,
    master_url: String,
    labels: LabelKeys,
}

impl KubernetesCluster {
    pub fn new(client: Client, master_url: String, settings: &ClusterSettings) -> KubernetesCluster {
        KubernetesCluster {
            api: Api::namespaced(client, &settings.namespace),
            master_url,
            labels: settings.labels.clone(),
        }
    }
}

fn to_workload(deployment: &Deployment, labels: &LabelKeys) -> Workload {
    Workload::from_labels(
        deployment.name_any(),
        deployment.spec.as_ref().and_then(|spec| spec.replicas),
        deployment.labels(),
        labels,
    )
}

fn replica_failure(deployment: &Deployment) -> bool {
    deployment
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map_or(false, |conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == REPLICA_FAILURE && c.status == "True")
        })
}

#[async_trait]
impl ClusterOrchestrator for KubernetesCluster {
    fn name(&self) -> &'static str {
        "Kubernetes"
    }

    fn master_url(&self) -> String {
        self.master_url.clone()
    }

    async fn list(&self) -> Result<WorkloadList, ClusterError> {
        let deployments = self.api.list(&ListParams::default()).await?;
        Ok(WorkloadList {
            items: deployments
                .items
                .iter()
                .map(|d| to_workload(d, &self.labels))
                .collect(),
            resource_version: deployments.metadata.resource_version.unwrap_or_default(),
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream, ClusterError> {
        let labels = self.labels.clone();
        Ok(forward_watch(
            self.api.clone(),
            resource_version.to_owned(),
            move |action: WatchAction, deployment: Deployment| WorkloadEvent {
                action: modified_or_error(action, replica_failure(&deployment)),
                workload: to_workload(&deployment, &labels),
            },
        ))
    }

    async fn scale(&self, name: &str, replicas: u32) -> Result<Workload, ClusterError> {
        let patch = json!({ "spec": { "replicas": replicas } });
        let deployment = self
            .api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(to_workload(&deployment, &self.labels))
    }
}
