use std::sync::Arc;

use crate::configuration::ColorPalette;
use crate::kubernetes::model::Workload;
use crate::midi::codec;
use crate::midi::controller::SharedMidiSender;
use crate::midi::model::{Channel, Cursor, DataByte};
use crate::sync::SlotLayout;

/// Persistent state shown on a slot button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Led {
    Off,
    Disabled,
    Enabled,
    Failure,
}

pub fn project(occupant: Option<&Workload>) -> Led {
    match occupant {
        None => Led::Off,
        Some(w) if w.replicas == 0 => Led::Disabled,
        Some(_) => Led::Enabled,
    }
}

/// Turns slot and cursor state into LED messages.
pub struct LedProjector {
    midi_sender: SharedMidiSender,
    palette: Arc<ColorPalette>,
    layout: SlotLayout,
}

impl LedProjector {
    pub fn new(
        midi_sender: SharedMidiSender,
        palette: Arc<ColorPalette>,
        layout: SlotLayout,
    ) -> LedProjector {
        LedProjector {
            midi_sender,
            palette,
            layout,
        }
    }

    pub fn color(&self, led: Led) -> DataByte {
        match led {
            Led::Off => self.palette.off,
            Led::Disabled => self.palette.disabled,
            Led::Enabled => self.palette.enabled,
            Led::Failure => self.palette.failure,
        }
    }

    pub fn show(&self, index: usize, led: Led) {
        match self.layout.address_of(index) {
            Some((channel, button)) => {
                tracing::debug!(index, ?led, "updating slot LED");
                self.midi_sender
                    .send_and_forget(codec::color(channel, &button, self.color(led)));
            }
            None => tracing::debug!(index, "no LED for slot"),
        }
    }

    pub fn cursor(&self, channel: Channel, cursor: Cursor, pressed: bool) {
        let color = if pressed {
            self.palette.cursor_active
        } else {
            self.palette.cursor_idle
        };
        self.midi_sender
            .send_and_forget(codec::color(channel, &cursor, color));
    }

    /// Blank device with all cursors idle.
    pub fn init(&self) {
        self.reset();
        for channel in Channel::ALL {
            for cursor in Cursor::ALL {
                self.cursor(channel, cursor, false);
            }
        }
    }

    pub fn reset(&self) {
        for msg in codec::reset_all() {
            self.midi_sender.send_and_forget(msg);
        }
    }

    /// Switches everything off and waits until the device got it.
    pub fn shutdown(&self) {
        self.reset();
        self.midi_sender.flush();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::kubernetes::stubs::workload;
    use crate::midi::controller::stubs::Recording;
    use crate::midi::model::{Button, MidiMessage};

    pub fn projector(recording: Arc<Recording>) -> LedProjector {
        LedProjector::new(
            recording,
            Arc::new(ColorPalette::default()),
            SlotLayout {
                primary: Channel::Factory,
            },
        )
    }

    /// Last color sent to the button of slot `index`.
    pub fn last_color(sent: &[MidiMessage], index: usize) -> Option<DataByte> {
        let layout = SlotLayout {
            primary: Channel::Factory,
        };
        let (channel, button) = layout.address_of(index)?;
        let target = codec::color(channel, &button, DataByte::ZERO);
        sent.iter()
            .rev()
            .find(|m| m.status == target.status && m.fst_data_byte == target.fst_data_byte)
            .map(|m| m.snd_data_byte)
    }

    #[test]
    fn projection_follows_replicas() {
        assert_eq!(project(None), Led::Off);
        assert_eq!(project(Some(&workload("a", 0, None))), Led::Disabled);
        assert_eq!(project(Some(&workload("a", 3, None))), Led::Enabled);
    }

    #[test]
    fn slot_color_goes_to_slot_button() {
        let recording = Arc::new(Recording::default());
        let projector = projector(recording.clone());

        projector.show(9, project(Some(&workload("a", 1, None))));

        let expected = codec::color(Channel::User, &Button::Button2, ColorPalette::default().enabled);
        assert_eq!(recording.sent(), vec![expected]);
    }

    #[test]
    fn cursor_feedback_is_independent_of_slots() {
        let recording = Arc::new(Recording::default());
        let projector = projector(recording.clone());
        let palette = ColorPalette::default();

        projector.cursor(Channel::Factory, Cursor::Down, true);
        projector.cursor(Channel::Factory, Cursor::Down, false);

        assert_eq!(
            recording.sent(),
            vec![
                codec::color(Channel::Factory, &Cursor::Down, palette.cursor_active),
                codec::color(Channel::Factory, &Cursor::Down, palette.cursor_idle),
            ]
        );
    }

    #[test]
    fn init_resets_then_idles_all_cursors() {
        let recording = Arc::new(Recording::default());
        projector(recording.clone()).init();

        let sent = recording.sent();
        assert_eq!(sent.len(), 2 + 8);
        assert_eq!(sent[..2], codec::reset_all());
        assert!(sent[2..]
            .iter()
            .all(|m| m.snd_data_byte == ColorPalette::default().cursor_idle));
    }

    #[test]
    fn out_of_range_slot_sends_nothing() {
        let recording = Arc::new(Recording::default());
        projector(recording.clone()).show(16, Led::Failure);
        assert!(recording.sent().is_empty());
    }
}
