use async_channel::Receiver;
use std::sync::Arc;
use tokio::spawn;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::midi::codec;
use crate::midi::controller::midir::RawFrame;
use crate::midi::model::InputEvent;
use crate::sync::dispatcher::Dispatcher;
use crate::sync::projector::LedProjector;

struct WorkerHandler {
    projector: Arc<LedProjector>,
    dispatcher: Dispatcher,
}

impl WorkerHandler {
    fn handle_frame(&self, frame: &[u8]) {
        match codec::decode(frame) {
            Some(event) => {
                debug!(?frame, ?event, "handling MIDI message");
                self.handle_event(event);
            }
            None => debug!(?frame, "ignoring MIDI message"),
        }
    }

    fn handle_event(&self, event: InputEvent) {
        match event {
            InputEvent::Cursor {
                channel,
                cursor,
                pressed,
            } => self.projector.cursor(channel, cursor, pressed),
            InputEvent::Knob { .. } => self.dispatcher.dispatch(&event),
            // Slot buttons have no action yet.
            InputEvent::Button {
                channel,
                button,
                pressed,
            } => debug!(?channel, ?button, pressed, "slot button"),
        }
    }
}

/// Consumes raw device input. Runs until the device side of the queue is dropped.
pub struct Worker(pub JoinHandle<()>);

impl Worker {
    pub fn start_worker(
        projector: Arc<LedProjector>,
        dispatcher: Dispatcher,
        frames_r: Receiver<RawFrame>,
    ) -> Worker {
        Worker(spawn(async move {
            let handler = WorkerHandler {
                projector,
                dispatcher,
            };
            while let Ok(frame) = frames_r.recv().await {
                handler.handle_frame(&frame);
            }
        }))
    }
}
