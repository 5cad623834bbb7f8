use async_channel::{Receiver, Sender};
use tokio::spawn;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::configuration::ScaleTransform;
use crate::kubernetes::SharedOrchestrator;
use crate::midi::model::{InputEvent, KnobRow};
use crate::registry::{self, SharedRegistry};
use crate::sync::SlotLayout;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScaleRequest {
    pub index: usize,
    pub name: String,
    pub replicas: u32,
}

/// Turns knob movements into scale requests for the workload on the addressed slot.
pub struct Dispatcher {
    registry: SharedRegistry,
    layout: SlotLayout,
    transform: ScaleTransform,
    requests: Sender<ScaleRequest>,
}

impl Dispatcher {
    pub fn new(
        registry: SharedRegistry,
        layout: SlotLayout,
        transform: ScaleTransform,
    ) -> (Dispatcher, Receiver<ScaleRequest>) {
        let (requests, requests_r) = async_channel::unbounded();
        let dispatcher = Dispatcher {
            registry,
            layout,
            transform,
            requests,
        };
        (dispatcher, requests_r)
    }

    /// Only the upper knob row scales, everything else is left alone.
    pub fn resolve(&self, event: &InputEvent) -> Option<ScaleRequest> {
        let (channel, column, value) = match *event {
            InputEvent::Knob {
                channel,
                row: KnobRow::Upper,
                column,
                value,
            } => (channel, column, value),
            _ => return None,
        };
        let index = self.layout.index_of(channel, column)?;
        let name = registry::lock(&self.registry).occupant(index)?.name.clone();

        Some(ScaleRequest {
            index,
            name,
            replicas: self.transform.replicas(value),
        })
    }

    pub fn dispatch(&self, event: &InputEvent) {
        if let Some(request) = self.resolve(event) {
            debug!(?request, "queueing scale request");
            if self.requests.try_send(request).is_err() {
                warn!("Scale worker has stopped, dropping request.");
            }
        }
    }
}

/// Writes replica counts, one request at a time.
pub struct ScaleWriter {
    orchestrator: SharedOrchestrator,
    write_lock: Mutex<()>,
}

impl ScaleWriter {
    pub fn new(orchestrator: SharedOrchestrator) -> ScaleWriter {
        ScaleWriter {
            orchestrator,
            write_lock: Mutex::new(()),
        }
    }

    /// The outcome only shows on the device once the watch reports it.
    pub async fn write(&self, request: &ScaleRequest) {
        let _guard = self.write_lock.lock().await;
        info!(
            "Scaling {} workload {} at index {} to {} replicas.",
            self.orchestrator.name(),
            request.name,
            request.index,
            request.replicas
        );
        if let Err(e) = self
            .orchestrator
            .scale(&request.name, request.replicas)
            .await
        {
            warn!("Scaling workload {} failed: {}.", request.name, e);
        }
    }
}

/// Drains queued requests in order. Requests for a workload that are superseded
/// by a newer one in the same batch are skipped.
pub struct ScaleWorker(pub JoinHandle<()>);

impl ScaleWorker {
    pub fn start_worker(writer: ScaleWriter, requests_r: Receiver<ScaleRequest>) -> ScaleWorker {
        ScaleWorker(spawn(async move {
            while let Ok(first) = requests_r.recv().await {
                let mut batch = vec![first];
                while let Ok(next) = requests_r.try_recv() {
                    batch.push(next);
                }
                for request in latest_per_workload(batch) {
                    writer.write(&request).await;
                }
            }
        }))
    }
}

fn latest_per_workload(batch: Vec<ScaleRequest>) -> Vec<ScaleRequest> {
    let mut latest: Vec<ScaleRequest> = Vec::with_capacity(batch.len());
    for request in batch {
        latest.retain(|r| r.name != request.name);
        latest.push(request);
    }
    latest
}
