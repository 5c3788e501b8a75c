use flume::Sender;
use tokio::signal::unix::{SignalKind, signal};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// `SIGHUP`: reload the configuration and discover modules again.
    Reload,
    /// `SIGUSR1`: log the currently accepted modules.
    DumpModules,
    /// `SIGINT` or `SIGTERM`.
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to install signal handler: {0}")]
    Install(#[from] std::io::Error),

    #[error("Signal event receiver is gone")]
    ReceiverDropped,
}

impl From<flume::SendError<SignalEvent>> for Error {
    fn from(_: flume::SendError<SignalEvent>) -> Self {
        Self::ReceiverDropped
    }
}

/// Forward signals to `tx` until a shutdown signal arrives.
pub async fn wait_for_signal(tx: Sender<SignalEvent>) -> Result<(), Error> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut user1 = signal(SignalKind::user_defined1())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        let event = tokio::select! {
            _ = hangup.recv() => SignalEvent::Reload,
            _ = user1.recv() => SignalEvent::DumpModules,
            _ = interrupt.recv() => SignalEvent::Shutdown,
            _ = terminate.recv() => SignalEvent::Shutdown,
        };
        debug!(?event, "signal received");
        tx.send_async(event).await?;
        if event == SignalEvent::Shutdown {
            return Ok(());
        }
    }
}
