use std::sync::Arc;

use crate::midi::model::MidiMessage;

pub mod midir;
pub mod stubs;

pub type SharedMidiSender = Arc<dyn MidiSender + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
#[error("Sending MIDI Message failed. Reason: {human_friendly_description}.")]
pub struct SendFailed {
    pub human_friendly_description: &'static str,
}

pub trait MidiSender {
    fn send(&self, msg: MidiMessage) -> Result<(), SendFailed>;

    /// LED updates are best effort, a lost frame is corrected by the next one.
    fn send_and_forget(&self, msg: MidiMessage) {
        if let Err(e) = self.send(msg) {
            tracing::warn!(error = %e, ?msg, "dropping MIDI message");
        }
    }

    /// Blocks until everything sent so far has reached the device.
    fn flush(&self) {}
}
