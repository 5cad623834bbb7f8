use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::kubernetes::model::{
    ClusterError, ClusterOrchestrator, WatchAction, WatchStream, Workload, WorkloadEvent,
    WorkloadList,
};

pub fn workload(name: &str, replicas: u32, index: Option<usize>) -> Workload {
    Workload {
        name: name.into(),
        replicas,
        enabled: true,
        index,
    }
}

pub fn event(action: WatchAction, workload: Workload) -> Result<WorkloadEvent, ClusterError> {
    Ok(WorkloadEvent { action, workload })
}

fn unavailable(message: &str) -> ClusterError {
    ClusterError::WatchRejected {
        code: 503,
        message: message.into(),
    }
}

/// In-memory cluster. Every `watch` replays the next scripted session and then closes.
#[derive(Default)]
pub struct ScriptedCluster {
    listed: Mutex<Vec<Workload>>,
    sessions: Mutex<VecDeque<Vec<Result<WorkloadEvent, ClusterError>>>>,
    unreachable: AtomicBool,
    pub lists: AtomicUsize,
    scaled: Mutex<Vec<(String, u32)>>,
    scale_delay: Option<Duration>,
    scale_in_flight: AtomicBool,
    pub scale_overlapped: AtomicBool,
    reject_scale: bool,
}

impl ScriptedCluster {
    pub fn new(listed: Vec<Workload>) -> ScriptedCluster {
        ScriptedCluster {
            listed: Mutex::new(listed),
            ..Default::default()
        }
    }

    pub fn with_scale_delay(mut self, delay: Duration) -> ScriptedCluster {
        self.scale_delay = Some(delay);
        self
    }

    pub fn rejecting_scale(mut self) -> ScriptedCluster {
        self.reject_scale = true;
        self
    }

    pub fn set_listed(&self, listed: Vec<Workload>) {
        *self.listed.lock().unwrap() = listed;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn script(&self, session: Vec<Result<WorkloadEvent, ClusterError>>) {
        self.sessions.lock().unwrap().push_back(session);
    }

    pub fn scaled(&self) -> Vec<(String, u32)> {
        self.scaled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterOrchestrator for ScriptedCluster {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn master_url(&self) -> String {
        "memory://".into()
    }

    async fn list(&self) -> Result<WorkloadList, ClusterError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(unavailable("scripted outage"));
        }
        Ok(WorkloadList {
            items: self.listed.lock().unwrap().clone(),
            resource_version: "1".into(),
        })
    }

    async fn watch(&self, _resource_version: &str) -> Result<WatchStream, ClusterError> {
        let session = self.sessions.lock().unwrap().pop_front().unwrap_or_default();
        Ok(futures::stream::iter(session).boxed())
    }

    async fn scale(&self, name: &str, replicas: u32) -> Result<Workload, ClusterError> {
        if self.scale_in_flight.swap(true, Ordering::SeqCst) {
            self.scale_overlapped.store(true, Ordering::SeqCst);
        }
        if let Some(delay) = self.scale_delay {
            tokio::time::sleep(delay).await;
        }
        self.scaled.lock().unwrap().push((name.to_owned(), replicas));
        self.scale_in_flight.store(false, Ordering::SeqCst);

        if self.reject_scale {
            Err(unavailable("scale rejected"))
        } else {
            Ok(workload(name, replicas, None))
        }
    }
}
