mod configuration;
mod kubernetes;
mod midi;
mod registry;
mod sync;
mod worker;

use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::midi::controller::midir::{MidirBased, MidirListener};
use crate::midi::controller::stubs::JustLog;
use crate::midi::controller::SharedMidiSender;
use crate::registry::{SharedRegistry, SlotRegistry};
use crate::sync::dispatcher::{Dispatcher, ScaleWorker, ScaleWriter};
use crate::sync::projector::LedProjector;
use crate::sync::reconciler::Reconciler;
use crate::sync::SlotLayout;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = configuration::Args::parse();
    let settings = configuration::load(&args)?;

    // Device first, the LEDs are reset before any cluster state is shown.
    let (midi_sender, frames_r, _listener) = if args.dry_run {
        let sender: SharedMidiSender = Arc::new(JustLog);
        let (_, frames_r) = async_channel::unbounded();
        (sender, frames_r, None)
    } else {
        let sender: SharedMidiSender = Arc::new(MidirBased::new(&settings.controller_name)?);
        let (listener, frames_r) = MidirListener::new(&settings.controller_name)?;
        (sender, frames_r, Some(listener))
    };

    let layout = SlotLayout {
        primary: settings.primary_channel,
    };
    let projector = Arc::new(LedProjector::new(
        midi_sender,
        settings.color_palette.clone(),
        layout,
    ));
    projector.init();

    let orchestrator = kubernetes::connect(&settings.cluster).await?;
    let registry: SharedRegistry = Arc::new(Mutex::new(SlotRegistry::new()));

    let (dispatcher, requests_r) = Dispatcher::new(registry.clone(), layout, settings.scale);
    let scale_worker = ScaleWorker::start_worker(ScaleWriter::new(orchestrator.clone()), requests_r);
    let input_worker = worker::Worker::start_worker(projector.clone(), dispatcher, frames_r);

    let reconciler = Reconciler::new(
        orchestrator,
        registry,
        projector.clone(),
        settings.reconnect_delay(),
    );
    let watching = tokio::spawn(async move { reconciler.run().await });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down.");

    sync::shutdown(vec![watching, input_worker.0, scale_worker.0], &projector).await;
    Ok(())
}
