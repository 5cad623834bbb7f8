use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::kubernetes::model::{ClusterError, WatchAction, Workload, WorkloadEvent};
use crate::kubernetes::SharedOrchestrator;
use crate::registry::{self, SharedRegistry, SlotRegistry};
use crate::sync::projector::{project, Led, LedProjector};

/// Why a watch session ended.
#[derive(Debug, thiserror::Error)]
pub enum CloseCause {
    #[error("watch stream closed by the API server")]
    Closed,
    #[error(transparent)]
    Failed(#[from] ClusterError),
}

type LedUpdates = Vec<(usize, Led)>;

/// Keeps the slot registry in line with the enabled workloads of the cluster.
pub struct Reconciler {
    orchestrator: SharedOrchestrator,
    registry: SharedRegistry,
    projector: Arc<LedProjector>,
    reconnect_delay: Duration,
}

impl Reconciler {
    pub fn new(
        orchestrator: SharedOrchestrator,
        registry: SharedRegistry,
        projector: Arc<LedProjector>,
        reconnect_delay: Duration,
    ) -> Reconciler {
        Reconciler {
            orchestrator,
            registry,
            projector,
            reconnect_delay,
        }
    }

    /// Watches forever. Every lost connection is followed by a full re-list.
    pub async fn run(&self) {
        loop {
            let cause = self.session().await;
            self.reconnect(cause).await;
        }
    }

    /// Lists and tracks all enabled workloads, then applies watch events until the stream ends.
    pub async fn session(&self) -> CloseCause {
        info!(
            "Connecting to {} master {}.",
            self.orchestrator.name(),
            self.orchestrator.master_url()
        );

        let listed = match self.orchestrator.list().await {
            Ok(listed) => listed,
            Err(e) => return e.into(),
        };
        for workload in listed.items.into_iter().filter(|w| w.enabled) {
            self.apply(WorkloadEvent {
                action: WatchAction::Added,
                workload,
            });
        }
        self.display();

        let mut events = match self.orchestrator.watch(&listed.resource_version).await {
            Ok(events) => events,
            Err(e) => return e.into(),
        };
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => self.apply(event),
                Err(e) => return e.into(),
            }
        }
        CloseCause::Closed
    }

    /// Forgets every slot so the next session starts from a clean re-list.
    pub async fn reconnect(&self, cause: CloseCause) {
        info!(
            "Reconnecting to {} master {} due to {}.",
            self.orchestrator.name(),
            self.orchestrator.master_url(),
            cause
        );
        let cleared = registry::lock(&self.registry).clear_all();
        self.show(cleared.into_iter().map(|index| (index, Led::Off)).collect());
        tokio::time::sleep(self.reconnect_delay).await;
    }

    /// Workloads without the enabled label are ignored, whatever happened to them.
    pub fn apply(&self, event: WorkloadEvent) {
        let WorkloadEvent { action, workload } = event;
        if !workload.enabled {
            return;
        }

        let updates = {
            let mut registry = registry::lock(&self.registry);
            match action {
                WatchAction::Added => add(&mut registry, workload),
                WatchAction::Modified => modify(&mut registry, workload),
                WatchAction::Deleted => remove(&mut registry, &workload.name, Led::Off),
                WatchAction::Error => remove(&mut registry, &workload.name, Led::Failure),
            }
        };
        self.show(updates);
    }

    pub fn display(&self) {
        let registry = registry::lock(&self.registry);
        for (index, workload) in registry.occupied() {
            info!(
                "{} workload {} (replicas: {}) at index {}.",
                self.orchestrator.name(),
                workload.name,
                workload.replicas,
                index
            );
        }
    }

    fn show(&self, updates: LedUpdates) {
        for (index, led) in updates {
            self.projector.show(index, led);
        }
    }
}

fn add(registry: &mut SlotRegistry, workload: Workload) -> LedUpdates {
    let mut updates = LedUpdates::new();
    let tracked = registry.find_by_name(&workload.name);
    let target = match (workload.index, tracked) {
        (None, Some(index)) => Some(index),
        _ => registry.find_free_or_by_label(&workload),
    };

    let index = match target {
        Some(index) => index,
        None => {
            warn!("No free slot for workload {}, it will not be shown.", workload.name);
            return updates;
        }
    };

    // A relabelled workload moves, it never occupies two slots.
    if let Some(old) = tracked.filter(|old| *old != index) {
        if let Ok(Some(_)) = registry.clear(old) {
            updates.push((old, Led::Off));
        }
    }

    info!("Adding workload {} at index {}.", workload.name, index);
    let led = project(Some(&workload));
    match registry.assign(index, workload) {
        Ok(Some(displaced)) if Some(index) != tracked => {
            warn!(
                "Workload {} lost index {} to a workload labelled for it.",
                displaced.name, index
            );
            updates.push((index, led));
        }
        Ok(_) => updates.push((index, led)),
        Err(e) => warn!("Can not add workload: {}.", e),
    }
    updates
}

fn modify(registry: &mut SlotRegistry, workload: Workload) -> LedUpdates {
    match registry.find_by_name(&workload.name) {
        Some(index) => {
            info!("Modifying workload {} at index {}.", workload.name, index);
            let led = project(Some(&workload));
            match registry.assign(index, workload) {
                Ok(_) => vec![(index, led)],
                Err(e) => {
                    warn!("Can not modify workload: {}.", e);
                    Vec::new()
                }
            }
        }
        None => {
            debug!("Ignoring modification of untracked workload {}.", workload.name);
            Vec::new()
        }
    }
}

fn remove(registry: &mut SlotRegistry, name: &str, led: Led) -> LedUpdates {
    match registry.find_by_name(name) {
        Some(index) => {
            if led == Led::Failure {
                info!("Error for workload {} at index {}.", name, index);
            } else {
                info!("Removing workload {} at index {}.", name, index);
            }
            match registry.clear(index) {
                Ok(_) => vec![(index, led)],
                Err(e) => {
                    warn!("Can not remove workload: {}.", e);
                    Vec::new()
                }
            }
        }
        None => {
            debug!("Ignoring removal of untracked workload {}.", name);
            Vec::new()
        }
    }
}
