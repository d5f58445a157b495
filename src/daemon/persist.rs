use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{probe::ResultStore, ProbeResult};

/// Collects the workers' results and writes them to the data file.
///
/// The file is written every `interval` when something changed, and once
/// more when the task is stopped.
#[derive(Debug)]
pub struct SaveTask {
    tx: mpsc::UnboundedSender<ProbeResult>,
    token: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl SaveTask {
    pub fn spawn(store: Arc<ResultStore>, data_file: &str, interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let handle = tokio::spawn(save_loop(
            store,
            data_file.to_string(),
            interval,
            rx,
            token.clone(),
        ));
        Self { tx, token, handle }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<ProbeResult> {
        self.tx.clone()
    }

    /// Flushes everything received so far and stops the task.
    pub async fn stop(self) -> Result<()> {
        self.token.cancel();
        self.handle.await?
    }
}

async fn save_loop(
    store: Arc<ResultStore>,
    data_file: String,
    interval: Duration,
    mut rx: mpsc::UnboundedReceiver<ProbeResult>,
    token: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut dirty = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            result = rx.recv() => match result {
                Some(r) => {
                    store.set(r);
                    dirty = true;
                }
                None => break,
            },
            _ = ticker.tick() => {
                if dirty {
                    match store.save_to_file(&data_file) {
                        Ok(()) => dirty = false,
                        Err(err) => log::error!("[save] failed to save the results - {:#}", err),
                    }
                }
            }
        }
    }

    while let Ok(r) = rx.try_recv() {
        store.set(r);
    }
    log::info!("[save] Received the done signal, saving the data file {}...", data_file);
    store.save_to_file(&data_file)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{Status, DATA_FILE_DISABLED};

    fn result(name: &str) -> ProbeResult {
        ProbeResult {
            name: name.to_string(),
            status: Status::Up,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.yaml");

        let store = Arc::new(ResultStore::new());
        let task = SaveTask::spawn(store.clone(), file.to_str().unwrap(), Duration::from_secs(3600));
        let tx = task.sender();
        tx.send(result("a")).unwrap();
        tx.send(result("b")).unwrap();
        tx.send(result("a")).unwrap();
        task.stop().await.unwrap();

        assert_eq!(store.len(), 2);
        let loaded = ResultStore::new();
        loaded.load_from_file(file.to_str().unwrap()).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_save_when_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.yaml");

        let store = Arc::new(ResultStore::new());
        let task = SaveTask::spawn(store.clone(), file.to_str().unwrap(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!file.exists());

        task.sender().send(result("a")).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(fs::metadata(&file).is_ok());

        task.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_data_file() {
        let store = Arc::new(ResultStore::new());
        let task = SaveTask::spawn(store.clone(), DATA_FILE_DISABLED, Duration::from_secs(60));
        task.sender().send(result("a")).unwrap();
        assert!(task.stop().await.is_ok());
    }
}
