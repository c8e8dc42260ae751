use crossbeam_channel::{Receiver, Sender, TryRecvError};
use thiserror::Error;

use crate::messages::SyncMessage;

#[derive(Debug, Clone, Error)]
#[error("message channel closed on send")]
pub struct SendError;

#[derive(Debug, Clone, Error)]
#[error("message channel closed on receive")]
pub struct RecvError;

/// Outbound half of a reliable, ordered message channel.
///
/// The transport underneath is an external collaborator; it is assumed to
/// provide delivery, ordering and marshalling. Sending never blocks.
pub trait MessageSender: Send + Sync {
    fn send(&self, message: SyncMessage) -> Result<(), SendError>;
}

/// Inbound half; `receive` never blocks, returning `Ok(None)` when no
/// message is pending.
pub trait MessageReceiver: Send {
    fn receive(&mut self) -> Result<Option<SyncMessage>, RecvError>;
}

pub struct MessageChannel;

impl MessageChannel {
    /// In-memory channel implementing both halves, for tests and same-process
    /// loops.
    pub fn unbounded() -> (Box<dyn MessageSender>, Box<dyn MessageReceiver>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Box::new(sender), Box::new(ChannelReceiver { receiver }))
    }
}

impl MessageSender for Sender<SyncMessage> {
    fn send(&self, message: SyncMessage) -> Result<(), SendError> {
        Sender::send(self, message).map_err(|_| SendError)
    }
}

struct ChannelReceiver {
    receiver: Receiver<SyncMessage>,
}

impl MessageReceiver for ChannelReceiver {
    fn receive(&mut self) -> Result<Option<SyncMessage>, RecvError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RecvError),
        }
    }
}
