use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;

/// Label keys opting a workload into device tracking.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LabelKeys {
    pub enabled: String,
    pub index: String,
}

impl Default for LabelKeys {
    fn default() -> Self {
        LabelKeys {
            enabled: "cloudcontrol.enabled".into(),
            index: "cloudcontrol.index".into(),
        }
    }
}

/// Snapshot of a cluster workload. Replaced as a whole on every update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    pub replicas: u32,
    pub enabled: bool,
    /// Explicit slot requested through the index label.
    pub index: Option<usize>,
}

impl Workload {
    pub fn from_labels(
        name: String,
        replicas: Option<i32>,
        labels: &BTreeMap<String, String>,
        keys: &LabelKeys,
    ) -> Workload {
        let enabled = labels
            .get(&keys.enabled)
            .map_or(false, |v| v.eq_ignore_ascii_case("true"));

        let index = labels.get(&keys.index).and_then(|v| match v.trim().parse::<i64>() {
            Ok(i) if i < 0 => None,
            Ok(i) => usize::try_from(i).ok(),
            Err(_) => {
                tracing::warn!(workload = %name, label = %v, "ignoring unparsable index label");
                None
            }
        });

        Workload {
            replicas: replicas.and_then(|r| u32::try_from(r).ok()).unwrap_or(0),
            name,
            enabled,
            index,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchAction {
    Added,
    Modified,
    Deleted,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadEvent {
    pub action: WatchAction,
    pub workload: Workload,
}

pub struct WorkloadList {
    pub items: Vec<Workload>,
    /// Point in time the watch continues from.
    pub resource_version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("cluster API request failed: {0}")]
    Api(#[from] kube::Error),
    #[error("watch rejected by API server ({code}): {message}")]
    WatchRejected { code: u16, message: String },
}

/// Ends when the connection to the API server is lost.
pub type WatchStream = BoxStream<'static, Result<WorkloadEvent, ClusterError>>;

#[async_trait]
pub trait ClusterOrchestrator {
    fn name(&self) -> &'static str;

    fn master_url(&self) -> String;

    async fn list(&self) -> Result<WorkloadList, ClusterError>;

    async fn watch(&self, resource_version: &str) -> Result<WatchStream, ClusterError>;

    async fn scale(&self, name: &str, replicas: u32) -> Result<Workload, ClusterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn enabled_label_is_case_insensitive() {
        let keys = LabelKeys::default();
        let w = Workload::from_labels(
            "api".into(),
            Some(2),
            &labels(&[("cloudcontrol.enabled", "TRUE")]),
            &keys,
        );
        assert!(w.enabled);
        assert_eq!(w.replicas, 2);
        assert_eq!(w.index, None);
    }

    #[test]
    fn missing_or_false_label_disables() {
        let keys = LabelKeys::default();
        assert!(!Workload::from_labels("a".into(), None, &labels(&[]), &keys).enabled);
        assert!(
            !Workload::from_labels(
                "a".into(),
                None,
                &labels(&[("cloudcontrol.enabled", "yes")]),
                &keys
            )
            .enabled
        );
    }

    #[test]
    fn index_label_parsing() {
        let keys = LabelKeys::default();
        let index_of = |v: &str| {
            Workload::from_labels("a".into(), None, &labels(&[("cloudcontrol.index", v)]), &keys)
                .index
        };
        assert_eq!(index_of("3"), Some(3));
        assert_eq!(index_of("-1"), None);
        assert_eq!(index_of("three"), None);
        assert_eq!(index_of("42"), Some(42));
    }

    #[test]
    fn missing_replicas_default_to_zero() {
        let w = Workload::from_labels("a".into(), None, &labels(&[]), &LabelKeys::default());
        assert_eq!(w.replicas, 0);
    }
}
