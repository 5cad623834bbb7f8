use async_trait::async_trait;
use kube::api::{ListParams, Patch, PatchParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, ResourceExt};
use kube_client::Client;
use serde_json::{json, Value};

use crate::configuration::ClusterSettings;
use crate::kubernetes::model::{
    ClusterError, ClusterOrchestrator, LabelKeys, WatchAction, WatchStream, Workload,
    WorkloadEvent, WorkloadList,
};
use crate::kubernetes::{forward_watch, modified_or_error, REPLICA_FAILURE};

/// OpenShift `DeploymentConfig`s of a single project.
/// k8s-openapi has no types for them, so they are handled as dynamic objects.
pub struct OpenShiftCluster {
    api: Api<DynamicObject>,
    master_url: String,
    labels: LabelKeys,
}

impl OpenShiftCluster {
    pub fn new(client: Client, master_url: String, settings: &ClusterSettings) -> OpenShiftCluster {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk(
            "apps.openshift.io",
            "v1",
            "DeploymentConfig",
        ));
        OpenShiftCluster {
            api: Api::namespaced_with(client, &settings.namespace, &resource),
            master_url,
            labels: settings.labels.clone(),
        }
    }
}

fn to_workload(config: &DynamicObject, labels: &LabelKeys) -> Workload {
    let replicas = config
        .data
        .pointer("/spec/replicas")
        .and_then(Value::as_i64)
        .and_then(|r| i32::try_from(r).ok());
    Workload::from_labels(config.name_any(), replicas, config.labels(), labels)
}

fn replica_failure(config: &DynamicObject) -> bool {
    config
        .data
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .map_or(false, |conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some(REPLICA_FAILURE)
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        })
}

#[async_trait]
impl ClusterOrchestrator for OpenShiftCluster {
    fn name(&self) -> &'static str {
        "OpenShift"
    }

    fn master_url(&self) -> String {
        self.master_url.clone()
    }

    async fn list(&self) -> Result<WorkloadList, ClusterError> {
        let configs = self.api.list(&ListParams::default()).await?;
        Ok(WorkloadList {
            items: configs
                .items
                .iter()
                .map(|c| to_workload(c, &self.labels))
                .collect(),
            resource_version: configs.metadata.resource_version.unwrap_or_default(),
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream, ClusterError> {
        let labels = self.labels.clone();
        Ok(forward_watch(
            self.api.clone(),
            resource_version.to_owned(),
            move |action: WatchAction, config: DynamicObject| WorkloadEvent {
                action: modified_or_error(action, replica_failure(&config)),
                workload: to_workload(&config, &labels),
            },
        ))
    }

    async fn scale(&self, name: &str, replicas: u32) -> Result<Workload, ClusterError> {
        let patch = json!({ "spec": { "replicas": replicas } });
        let config = self
            .api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(to_workload(&config, &self.labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment_config(value: Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn converts_deployment_config() {
        let dc = deployment_config(json!({
            "apiVersion": "apps.openshift.io/v1",
            "kind": "DeploymentConfig",
            "metadata": {
                "name": "billing",
                "labels": { "cloudcontrol.enabled": "True" }
            },
            "spec": { "replicas": 4 }
        }));
        assert_eq!(
            to_workload(&dc, &LabelKeys::default()),
            Workload {
                name: "billing".into(),
                replicas: 4,
                enabled: true,
                index: None,
            }
        );
        assert!(!replica_failure(&dc));
    }

    #[test]
    fn detects_replica_failure() {
        let dc = deployment_config(json!({
            "apiVersion": "apps.openshift.io/v1",
            "kind": "DeploymentConfig",
            "metadata": { "name": "billing" },
            "status": { "conditions": [ { "type": "ReplicaFailure", "status": "True" } ] }
        }));
        assert!(replica_failure(&dc));
    }
}
