use crossbeam_channel as cch;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::midi::controller::{MidiSender, SendFailed};
use crate::midi::model::MidiMessage;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Raw bytes as received from the device.
pub type RawFrame = Vec<u8>;

enum Outgoing {
    Message(MidiMessage),
    Flush(cch::Sender<()>),
}

pub struct MidirBased {
    sender: cch::Sender<Outgoing>,
    _sending_loop: JoinHandle<()>,
}

impl MidirBased {
    pub fn new(controller: &str) -> anyhow::Result<MidirBased> {
        let mut midi_out = Self::prepare_midi_out_connection(controller)?;
        let (sender, receiver) = cch::unbounded::<Outgoing>();
        let _sending_loop = thread::spawn(move || {
            while let Ok(outgoing) = receiver.recv() {
                match outgoing {
                    Outgoing::Message(midi_msg) => {
                        tracing::debug!(bytes = ?midi_msg.as_bytes(), "sending MIDI message");
                        if let Err(e) = midi_out.send(&midi_msg.as_bytes()) {
                            tracing::warn!(error = %e, "MIDI output rejected message");
                        }
                    }
                    Outgoing::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            midi_out.close();
        });

        Ok(MidirBased {
            sender,
            _sending_loop,
        })
    }

    fn prepare_midi_out_connection(
        controller: &str,
    ) -> anyhow::Result<midir::MidiOutputConnection> {
        let midi_out = midir::MidiOutput::new(&format!("{controller}-client"))?;
        let port = midi_out
            .ports()
            .into_iter()
            .find(|p| port_matches(midi_out.port_name(p).ok(), controller))
            .ok_or_else(|| {
                anyhow::Error::msg(format!("Couldn't find MIDI output port for {controller}."))
            })?;
        midi_out
            .connect(&port, controller)
            .map_err(|e| anyhow::Error::msg(format!("Couldn't set up connection with {controller}: {e}")))
    }
}

impl MidiSender for MidirBased {
    fn send(&self, msg: MidiMessage) -> Result<(), SendFailed> {
        self.sender
            .send(Outgoing::Message(msg))
            .map_err(|_| SendFailed {
                human_friendly_description: "MIDI sending loop has stopped",
            })
    }

    fn flush(&self) {
        let (done_s, done_r) = cch::bounded(1);
        if self.sender.send(Outgoing::Flush(done_s)).is_ok() {
            let _ = done_r.recv_timeout(FLUSH_TIMEOUT);
        }
    }
}

/// Keeps the input port open. Frames are pushed into the channel handed out by [`MidirListener::new`].
pub struct MidirListener {
    _connection: midir::MidiInputConnection<()>,
}

impl MidirListener {
    pub fn new(controller: &str) -> anyhow::Result<(MidirListener, async_channel::Receiver<RawFrame>)> {
        let mut midi_in = midir::MidiInput::new(&format!("{controller}-listener"))?;
        midi_in.ignore(midir::Ignore::All);
        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| port_matches(midi_in.port_name(p).ok(), controller))
            .ok_or_else(|| {
                anyhow::Error::msg(format!("Couldn't find MIDI input port for {controller}."))
            })?;

        let (frames_s, frames_r) = async_channel::unbounded();
        let _connection = midi_in
            .connect(
                &port,
                controller,
                move |_stamp, bytes, _| {
                    // The receiving side only goes away on shutdown.
                    let _ = frames_s.try_send(bytes.to_vec());
                },
                (),
            )
            .map_err(|e| anyhow::Error::msg(format!("Couldn't listen on {controller}: {e}")))?;

        Ok((MidirListener { _connection }, frames_r))
    }
}

fn port_matches(port_name: Option<String>, controller: &str) -> bool {
    port_name.map_or(false, |pn| pn.contains(controller))
}
