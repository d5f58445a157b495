use anyhow::Result;
use tokio::{
    signal::unix::{signal, SignalKind},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::logging::Logs;

/// Reopens the log files on SIGHUP and closes them when stopped.
#[derive(Debug)]
pub struct LogRotator {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl LogRotator {
    pub fn spawn(logs: Logs) -> Result<Self> {
        let mut hangup = signal(SignalKind::hangup())?;
        let token = CancellationToken::new();
        let done = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = done.cancelled() => {
                        log::info!("Received the exit signal, Rotating log file process exiting...");
                        logs.close();
                        return;
                    }
                    _ = hangup.recv() => {
                        log::info!("Received SIGHUP, rotating the log file...");
                        logs.rotate();
                    }
                }
            }
        });

        Ok(Self { token, handle })
    }

    /// Closes the log files; returns once they are closed.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(err) = self.handle.await {
            log::error!("log rotator ended abnormally - {}", err);
        }
    }
}
