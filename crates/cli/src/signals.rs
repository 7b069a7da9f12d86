use crate::error::Error;
use flume::Sender;
use tokio::signal::unix::{SignalKind, signal};

/// Events the main loop reacts to, decoded from process signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGINT or SIGTERM: save state and exit.
    Terminate,
    /// SIGUSR1: a collaborator saw the user; counts as activity.
    Presence,
    /// SIGUSR2: log a status report and force a save.
    Report,
}

/// Indefinitely listens to signals and sends signal events to the provided channel.
pub async fn wait_for_signal(signal_event: &Sender<SignalEvent>) -> Result<(), Error> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(Error::SignalHandler)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(Error::SignalHandler)?;
    let mut sigusr1 = signal(SignalKind::user_defined1()).map_err(Error::SignalHandler)?;
    let mut sigusr2 = signal(SignalKind::user_defined2()).map_err(Error::SignalHandler)?;

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                signal_event.send_async(SignalEvent::Terminate).await?;
            }
            _ = sigterm.recv() => {
                signal_event.send_async(SignalEvent::Terminate).await?;
            }
            _ = sigusr1.recv() => {
                signal_event.send_async(SignalEvent::Presence).await?;
            }
            _ = sigusr2.recv() => {
                signal_event.send_async(SignalEvent::Report).await?;
            }
        }
    }
}
