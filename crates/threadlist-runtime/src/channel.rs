use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::runtime::{EngineCommand, EngineUpdate};

/// Broadcast update stream consumed by UI subscribers.
pub type UpdateStream = broadcast::Receiver<EngineUpdate>;

/// Errors returned when talking to the engine actor.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The actor task has exited and no longer accepts commands.
    #[error("engine is no longer running")]
    EngineStopped,
}

/// Cloneable sender half of the engine's command channel.
///
/// Handed out by [`EngineHandle`](crate::runtime::EngineHandle); any number
/// of clones feed the same actor loop.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: mpsc::Sender<EngineCommand>,
}

impl CommandSender {
    /// Queue one command for the engine actor.
    pub async fn send(&self, command: EngineCommand) -> Result<(), ChannelError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ChannelError::EngineStopped)
    }
}

/// Bounded command channel between consumers and the actor loop.
pub(crate) fn command_channel(buffer: usize) -> (CommandSender, mpsc::Receiver<EngineCommand>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (CommandSender { tx }, rx)
}

/// Broadcast sender carrying engine updates to any number of subscribers.
pub(crate) fn update_channel(buffer: usize) -> broadcast::Sender<EngineUpdate> {
    let (tx, _) = broadcast::channel(buffer.max(1));
    tx
}
