use std::ops::RangeInclusive;

use crate::midi::model::{
    Button, Channel, Cursor, DataByte, InputEvent, KnobRow, MidiMessage, Status, Switchable,
    CONTROL_CHANGE, PRESSED_VALUE,
};

const UPPER_KNOBS: RangeInclusive<u8> = 21..=28;
const LOWER_KNOBS: RangeInclusive<u8> = 41..=48;

/// Decodes one raw frame coming from the device.
/// Frames which do not describe a known control yield `None`.
pub fn decode(frame: &[u8]) -> Option<InputEvent> {
    let [status, fst, snd] = <[u8; 3]>::try_from(frame).ok()?;
    let status = Status::from_u8(status)?;
    let fst = DataByte::from_u8(fst)?;
    let snd = DataByte::from_u8(snd)?;
    let channel = Channel::from_nibble(status.channel_nibble())?;
    let pressed = snd.as_u8() == PRESSED_VALUE;

    if status.command() == CONTROL_CHANGE {
        match fst.as_u8() {
            d if UPPER_KNOBS.contains(&d) => Some(InputEvent::Knob {
                channel,
                row: KnobRow::Upper,
                column: d - UPPER_KNOBS.start(),
                value: snd,
            }),
            d if LOWER_KNOBS.contains(&d) => Some(InputEvent::Knob {
                channel,
                row: KnobRow::Lower,
                column: d - LOWER_KNOBS.start(),
                value: snd,
            }),
            d => Cursor::from_pair(status.command(), d).map(|cursor| InputEvent::Cursor {
                channel,
                cursor,
                pressed,
            }),
        }
    } else {
        Button::from_pair(status.command(), fst.as_u8()).map(|button| InputEvent::Button {
            channel,
            button,
            pressed,
        })
    }
}

pub fn color<S: Switchable>(channel: Channel, switchable: &S, color: DataByte) -> MidiMessage {
    MidiMessage {
        status: Status::compose(switchable.command(), channel),
        fst_data_byte: switchable.data_byte(),
        snd_data_byte: color,
    }
}

/// Two control change frames that switch off every LED, one per channel.
pub fn reset_all() -> [MidiMessage; 2] {
    Channel::ALL.map(|channel| MidiMessage {
        status: Status::compose(CONTROL_CHANGE, channel),
        fst_data_byte: DataByte::ZERO,
        snd_data_byte: DataByte::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_upper_knob_on_factory_channel() {
        let event = decode(&[0xB8, 23, 64]);
        assert_eq!(
            event,
            Some(InputEvent::Knob {
                channel: Channel::Factory,
                row: KnobRow::Upper,
                column: 2,
                value: DataByte::lit(64),
            })
        );
    }

    #[test]
    fn decodes_lower_knob_on_user_channel() {
        let event = decode(&[0xB0, 48, 0]);
        assert_eq!(
            event,
            Some(InputEvent::Knob {
                channel: Channel::User,
                row: KnobRow::Lower,
                column: 7,
                value: DataByte::ZERO,
            })
        );
    }

    #[test]
    fn cursor_pressed_only_on_full_value() {
        assert_eq!(
            decode(&[0xB0, 114, 127]),
            Some(InputEvent::Cursor {
                channel: Channel::User,
                cursor: Cursor::Up,
                pressed: true,
            })
        );
        assert_eq!(
            decode(&[0xB8, 117, 1]),
            Some(InputEvent::Cursor {
                channel: Channel::Factory,
                cursor: Cursor::Right,
                pressed: false,
            })
        );
    }

    #[test]
    fn decodes_buttons_from_note_frames() {
        assert_eq!(
            decode(&[0x98, 25, 127]),
            Some(InputEvent::Button {
                channel: Channel::Factory,
                button: Button::Button5,
                pressed: true,
            })
        );
        assert_eq!(
            decode(&[0x90, 9, 0]),
            Some(InputEvent::Button {
                channel: Channel::User,
                button: Button::Button1,
                pressed: false,
            })
        );
    }

    #[test]
    fn unknown_frames_are_dropped() {
        // unmapped control
        assert_eq!(decode(&[0xB0, 30, 10]), None);
        // unmapped note
        assert_eq!(decode(&[0x90, 60, 127]), None);
        // note off is not a button frame on this device
        assert_eq!(decode(&[0x80, 9, 0]), None);
        // channel the device never uses
        assert_eq!(decode(&[0xB3, 21, 10]), None);
        // wrong length and malformed bytes
        assert_eq!(decode(&[0xB0, 21]), None);
        assert_eq!(decode(&[0xB0, 21, 10, 0]), None);
        assert_eq!(decode(&[0x30, 21, 10]), None);
        assert_eq!(decode(&[0xB0, 0x95, 10]), None);
    }

    #[test]
    fn decoding_is_deterministic() {
        let frame = [0xB8, 42, 99];
        assert_eq!(decode(&frame), decode(&frame));
    }

    #[test]
    fn encodes_button_color() {
        let msg = color(Channel::Factory, &Button::Button2, DataByte::lit(60));
        assert_eq!(msg.as_bytes(), [0x98, 10, 60]);
    }

    #[test]
    fn encodes_cursor_color() {
        let msg = color(Channel::User, &Cursor::Left, DataByte::lit(13));
        assert_eq!(msg.as_bytes(), [0xB0, 116, 13]);
    }

    #[test]
    fn reset_covers_both_channels() {
        let frames = reset_all().map(|m| m.as_bytes());
        assert_eq!(frames, [[0xB0, 0, 0], [0xB8, 0, 0]]);
    }
}
