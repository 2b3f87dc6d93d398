//! Channel management for inter-component communication
//!
//! Provides typed channels for audio blocks, studio commands/events, and
//! network-task completions.

use crate::studio::{NetEvent, StudioCommand, StudioEvent};
use crossbeam_channel::{bounded, Receiver, Sender};

/// All channels used by a studio session.
pub struct StudioChannels {
    /// Fixed-size audio blocks from the capture layer (or test injection)
    pub block_tx: Sender<Vec<f32>>,
    pub block_rx: Receiver<Vec<f32>>,

    /// Commands into the orchestrator
    pub command_tx: Sender<StudioCommand>,
    pub command_rx: Receiver<StudioCommand>,

    /// Events out of the orchestrator
    pub event_tx: Sender<StudioEvent>,
    pub event_rx: Receiver<StudioEvent>,

    /// Completions flowing back from network tasks
    pub net_tx: Sender<NetEvent>,
    pub net_rx: Receiver<NetEvent>,
}

impl StudioChannels {
    /// Create a new set of channels with default buffer sizes
    pub fn new() -> Self {
        Self::with_buffer_size(64)
    }

    /// Create channels with custom buffer size
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let (block_tx, block_rx) = bounded(buffer_size);
        let (command_tx, command_rx) = bounded(buffer_size);
        let (event_tx, event_rx) = bounded(buffer_size * 4);
        let (net_tx, net_rx) = bounded(buffer_size);

        Self {
            block_tx,
            block_rx,
            command_tx,
            command_rx,
            event_tx,
            event_rx,
            net_tx,
            net_rx,
        }
    }
}

impl Default for StudioChannels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_channel() {
        let channels = StudioChannels::new();
        channels.block_tx.send(vec![0.0, 0.1, 0.2]).unwrap();
        let received = channels.block_rx.recv().unwrap();
        assert_eq!(received, vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn test_command_channel() {
        let channels = StudioChannels::new();
        channels
            .command_tx
            .send(StudioCommand::SetHandsFree(true))
            .unwrap();
        match channels.command_rx.recv().unwrap() {
            StudioCommand::SetHandsFree(enabled) => assert!(enabled),
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_custom_buffer_size() {
        let channels = StudioChannels::with_buffer_size(50);
        for i in 0..50 {
            channels.block_tx.send(vec![i as f32]).unwrap();
        }
    }
}
