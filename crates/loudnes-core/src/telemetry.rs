//! Best-effort feedback from the audio thread.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::{channel::ChannelId, envelope::EnvelopeKind};

/// Playback position of one channel's envelopes after a block, in slot
/// order. `None` marks an envelope that is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeSteps {
    pub channel: ChannelId,
    pub steps: [Option<usize>; EnvelopeKind::COUNT],
}

/// Bounded sender that never blocks: when the queue is full the oldest
/// entry is dropped to make room.
#[derive(Debug, Clone)]
pub struct LossySender<T> {
    tx: Sender<T>,
    /// Used only to evict from the head of the queue.
    evict: Receiver<T>,
}

impl<T> LossySender<T> {
    pub fn send(&self, mut value: T) {
        loop {
            match self.tx.try_send(value) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(rejected)) => {
                    value = rejected;
                    let _ = self.evict.try_recv();
                }
            }
        }
    }
}

/// Lossy queue of at least one slot.
pub fn lossy<T>(capacity: usize) -> (LossySender<T>, Receiver<T>) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        LossySender {
            tx,
            evict: rx.clone(),
        },
        rx,
    )
}
