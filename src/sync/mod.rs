use tokio::task::JoinHandle;

use crate::midi::model::{Button, Channel};
use crate::registry::SLOT_COUNT;
use crate::sync::projector::LedProjector;

pub mod dispatcher;
pub mod projector;
pub mod reconciler;

const SLOTS_PER_CHANNEL: usize = SLOT_COUNT / 2;

/// Which channel carries slots 0-7. The other channel carries 8-15.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    pub primary: Channel,
}

impl SlotLayout {
    pub fn index_of(&self, channel: Channel, column: u8) -> Option<usize> {
        let column = usize::from(column);
        if column >= SLOTS_PER_CHANNEL {
            return None;
        }
        Some(if channel == self.primary {
            column
        } else {
            column + SLOTS_PER_CHANNEL
        })
    }

    pub fn address_of(&self, index: usize) -> Option<(Channel, Button)> {
        let channel = match index {
            i if i < SLOTS_PER_CHANNEL => self.primary,
            i if i < SLOT_COUNT => self.primary.other(),
            _ => return None,
        };
        Button::from_index(index).map(|button| (channel, button))
    }
}

/// Stops every task which may still light LEDs, then switches the device off.
pub async fn shutdown(tasks: Vec<JoinHandle<()>>, projector: &LedProjector) {
    for task in &tasks {
        task.abort();
    }
    for task in tasks {
        let _ = task.await;
    }
    projector.shutdown();
}
