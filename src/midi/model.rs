use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt::Formatter;

const U8_MSB_EXTRACTOR: u8 = 0x80;
const COMMAND_EXTRACTOR: u8 = 0xF0;
const CHANNEL_EXTRACTOR: u8 = 0x0F;

pub const CONTROL_CHANGE: u8 = 0xB0;
pub const NOTE_ON: u8 = 0x90;

/// Data byte value the device sends while a control is held down.
pub const PRESSED_VALUE: u8 = 0x7F;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(status: u8) -> Option<Status> {
        (status & U8_MSB_EXTRACTOR == U8_MSB_EXTRACTOR).then_some(Status(status))
    }

    pub fn compose(command: u8, channel: Channel) -> Status {
        Status((command & COMMAND_EXTRACTOR) | channel.nibble())
    }

    pub fn command(&self) -> u8 {
        self.0 & COMMAND_EXTRACTOR
    }

    pub fn channel_nibble(&self) -> u8 {
        self.0 & CHANNEL_EXTRACTOR
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct DataByte(u8);

impl DataByte {
    pub const ZERO: DataByte = DataByte(0);

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(db: u8) -> Option<DataByte> {
        (db & U8_MSB_EXTRACTOR == 0).then_some(DataByte(db))
    }

    /// Only for values known to be below 0x80.
    pub(crate) const fn lit(db: u8) -> DataByte {
        DataByte(db & !U8_MSB_EXTRACTOR)
    }
}

struct DataByteVisitor;

impl<'de> Visitor<'de> for DataByteVisitor {
    type Value = DataByte;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("Expecting data byte to be u8 between 0x00 and 0x7F.")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        let parse_res = u8::try_from(v).ok().and_then(DataByte::from_u8);

        match parse_res {
            None => Err(E::custom(format!(
                "Expecting data byte to be u8 between 0x00 and 0x7F. Got: {}.",
                v
            ))),
            Some(db) => Ok(db),
        }
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::custom(format!(
                "Expecting data byte to be u8 between 0x00 and 0x7F. Got: {}.",
                v
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for DataByte {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u8(DataByteVisitor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiMessage {
    pub status: Status,
    pub fst_data_byte: DataByte,
    pub snd_data_byte: DataByte,
}

impl MidiMessage {
    pub fn as_bytes(&self) -> [u8; 3] {
        [
            self.status.as_u8(),
            self.fst_data_byte.as_u8(),
            self.snd_data_byte.as_u8(),
        ]
    }
}

/// The two halves of the device. The value is the status nibble the device uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    User,
    Factory,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::User, Channel::Factory];

    pub fn nibble(&self) -> u8 {
        match self {
            Channel::User => 0,
            Channel::Factory => 8,
        }
    }

    pub fn from_nibble(nibble: u8) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.nibble() == nibble)
    }

    pub fn other(&self) -> Channel {
        match self {
            Channel::User => Channel::Factory,
            Channel::Factory => Channel::User,
        }
    }
}

/// Anything on the device that has an LED and can be addressed by a (command, data byte) pair.
pub trait Switchable {
    fn command(&self) -> u8;
    fn data_byte(&self) -> DataByte;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Button1,
    Button2,
    Button3,
    Button4,
    Button5,
    Button6,
    Button7,
    Button8,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Button1,
        Button::Button2,
        Button::Button3,
        Button::Button4,
        Button::Button5,
        Button::Button6,
        Button::Button7,
        Button::Button8,
    ];

    pub fn from_pair(command: u8, data: u8) -> Option<Button> {
        Button::ALL
            .into_iter()
            .find(|b| b.command() == command && b.data_byte().as_u8() == data)
    }

    /// Button for a slot index, over both banks.
    pub fn from_index(index: usize) -> Option<Button> {
        Button::ALL.get(index % Button::ALL.len()).copied()
    }
}

impl Switchable for Button {
    fn command(&self) -> u8 {
        NOTE_ON
    }

    fn data_byte(&self) -> DataByte {
        DataByte::lit(match self {
            Button::Button1 => 9,
            Button::Button2 => 10,
            Button::Button3 => 11,
            Button::Button4 => 12,
            Button::Button5 => 25,
            Button::Button6 => 26,
            Button::Button7 => 27,
            Button::Button8 => 28,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cursor {
    Up,
    Down,
    Left,
    Right,
}

impl Cursor {
    pub const ALL: [Cursor; 4] = [Cursor::Up, Cursor::Down, Cursor::Left, Cursor::Right];

    pub fn from_pair(command: u8, data: u8) -> Option<Cursor> {
        Cursor::ALL
            .into_iter()
            .find(|c| c.command() == command && c.data_byte().as_u8() == data)
    }
}

impl Switchable for Cursor {
    fn command(&self) -> u8 {
        CONTROL_CHANGE
    }

    fn data_byte(&self) -> DataByte {
        DataByte::lit(match self {
            Cursor::Up => 114,
            Cursor::Down => 115,
            Cursor::Left => 116,
            Cursor::Right => 117,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnobRow {
    Upper,
    Lower,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Button {
        channel: Channel,
        button: Button,
        pressed: bool,
    },
    Knob {
        channel: Channel,
        row: KnobRow,
        column: u8,
        value: DataByte,
    },
    Cursor {
        channel: Channel,
        cursor: Cursor,
        pressed: bool,
    },
}
