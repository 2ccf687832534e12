//! Transport seam: the engine hands ordered actions to an [`ActionSink`]

pub mod protocol;
pub mod sequencer;

pub use protocol::Action;

use tokio::sync::mpsc;

use crate::error::DispatchError;

/// Outbound transport. Actions are emitted in call order on one logical
/// connection.
pub trait ActionSink: Send {
    fn send(&mut self, action: Action) -> Result<(), DispatchError>;

    /// Send an action that carries a transport-assigned confirmation id
    fn send_sequenced(&mut self, build: &dyn Fn(u32) -> Action) -> Result<(), DispatchError>;
}

/// Sink forwarding actions into a tokio channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Action>,
    sequence: u32,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Action>) -> Self {
        Self { tx, sequence: 0 }
    }

    /// Sink plus the receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ActionSink for ChannelSink {
    fn send(&mut self, action: Action) -> Result<(), DispatchError> {
        self.tx.send(action).map_err(|_| DispatchError::Closed)
    }

    fn send_sequenced(&mut self, build: &dyn Fn(u32) -> Action) -> Result<(), DispatchError> {
        self.sequence = self.sequence.wrapping_add(1);
        self.send(build(self.sequence))
    }
}

/// Sink that keeps every action in memory and can be told to reject
#[derive(Debug, Default)]
pub struct RecordingSink {
    actions: Vec<Action>,
    sequence: u32,
    rejecting: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Reject every action until turned off again
    pub fn set_rejecting(&mut self, rejecting: bool) {
        self.rejecting = rejecting;
    }
}

impl ActionSink for RecordingSink {
    fn send(&mut self, action: Action) -> Result<(), DispatchError> {
        if self.rejecting {
            return Err(DispatchError::Rejected {
                action: action.name(),
                reason: "sink is rejecting".to_string(),
            });
        }
        self.actions.push(action);
        Ok(())
    }

    fn send_sequenced(&mut self, build: &dyn Fn(u32) -> Action) -> Result<(), DispatchError> {
        self.sequence = self.sequence.wrapping_add(1);
        self.send(build(self.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{BlockPos, EntityId, Face, Hand};

    #[test]
    fn channel_sink_numbers_sequenced_actions() {
        let (mut sink, mut rx) = ChannelSink::channel();
        for _ in 0..2 {
            sink.send_sequenced(&|sequence| Action::UseOnBlock {
                hand: Hand::Main,
                pos: BlockPos::new(0, 0, 0),
                face: Face::Up,
                sequence,
            })
            .unwrap();
        }

        let sequences: Vec<u32> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|action| match action {
                Action::UseOnBlock { sequence, .. } => sequence,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn closed_channel_is_a_dispatch_error() {
        let (mut sink, rx) = ChannelSink::channel();
        drop(rx);
        assert!(matches!(
            sink.send(Action::Attack {
                target: EntityId(1)
            }),
            Err(DispatchError::Closed)
        ));
    }
}
