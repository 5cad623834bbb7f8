use crate::midi::controller::{MidiSender, SendFailed};
use crate::midi::model::MidiMessage;

/// Used with `--dry-run`, no device needed.
pub struct JustLog;

impl MidiSender for JustLog {
    fn send(&self, msg: MidiMessage) -> Result<(), SendFailed> {
        tracing::info!(bytes = ?msg.as_bytes(), "MIDI out");
        Ok(())
    }
}

/// Keeps everything it was asked to send.
#[cfg(test)]
#[derive(Default)]
pub struct Recording(std::sync::Mutex<Vec<MidiMessage>>);

#[cfg(test)]
impl Recording {
    pub fn sent(&self) -> Vec<MidiMessage> {
        self.0.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.0.lock() {
            m.clear();
        }
    }
}

#[cfg(test)]
impl MidiSender for Recording {
    fn send(&self, msg: MidiMessage) -> Result<(), SendFailed> {
        self.0
            .lock()
            .map(|mut m| m.push(msg))
            .map_err(|_| SendFailed {
                human_friendly_description: "recording lock poisoned",
            })
    }
}
