use crate::signals::SignalEvent;
use flume::SendError;
use std::io;
use thiserror::Error;

/// Everything that can go wrong outside the engine itself.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[source] io::Error),

    #[error("failed to forward signal event: {0}")]
    SendSignal(#[from] SendError<SignalEvent>),

    #[error(transparent)]
    Engine(#[from] engine::Error),
}
