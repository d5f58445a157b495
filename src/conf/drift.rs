use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Conf, ConfigSource};
use crate::daemon::LifecycleEvent;

/// Polls the configuration source and reports meaningful changes.
///
/// The baseline is the last fetched content known to be valid. The first
/// fetch only sets the baseline. Invalid content never becomes the baseline,
/// so a half-written file followed by the same valid file is not a change.
#[derive(Debug)]
pub struct DriftDetector {
    source: ConfigSource,
    baseline: Mutex<Option<Vec<u8>>>,
}

impl DriftDetector {
    pub fn new(source: ConfigSource) -> Self {
        Self {
            source,
            baseline: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Forgets the baseline; the next fetch becomes the new one.
    pub fn reset(&self) {
        *self.baseline.lock() = None;
    }

    /// Fetches the source once and returns whether it was modified.
    pub async fn check(&self) -> bool {
        match self.source.fetch().await {
            Ok(content) => self.compare(content),
            Err(err) => {
                log::warn!(
                    "Failed to get the configuration file [{}]: {:#}",
                    self.source,
                    err
                );
                false
            }
        }
    }

    fn compare(&self, content: Vec<u8>) -> bool {
        let mut baseline = self.baseline.lock();
        let Some(previous) = baseline.as_ref() else {
            *baseline = Some(content);
            return false;
        };

        if *previous == content {
            return false;
        }

        if let Err(err) = Conf::from_slice(&content) {
            log::warn!("Invalid configuration file [{}]: {:#}", self.source, err);
            return false;
        }

        *baseline = Some(content);
        true
    }

    /// Checks the source every `interval` and sends `Reload` on change,
    /// until cancelled or the receiver is gone.
    pub async fn run(
        &self,
        interval: Duration,
        token: CancellationToken,
        events: mpsc::UnboundedSender<LifecycleEvent>,
    ) {
        log::info!(
            "Checking the configuration [{}] for changes every {:?}",
            self.source,
            interval
        );
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if self.check().await {
                log::info!("The configuration [{}] is modified, restarting...", self.source);
                if events.send(LifecycleEvent::Reload).is_err() {
                    break;
                }
            }
        }
        log::debug!("Configuration watcher for [{}] stopped", self.source);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const A: &str = "version: a\n";
    const B: &str = "version: b\n";
    const INVALID: &str = "http: [\n";

    #[test]
    fn test_compare_sequence() {
        let d = DriftDetector::new(ConfigSource::new("unused.yaml"));
        assert!(!d.compare(A.into()));
        assert!(!d.compare(A.into()));
        assert!(!d.compare(INVALID.into()));
        assert_eq!(d.baseline.lock().as_deref(), Some(A.as_bytes()));
        assert!(d.compare(B.into()));
        assert!(!d.compare(B.into()));

        d.reset();
        assert!(!d.compare(A.into()));
    }

    #[tokio::test]
    async fn test_check_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let d = DriftDetector::new(ConfigSource::new(path.to_str().unwrap()));

        // fetch failure leaves no baseline behind
        assert!(!d.check().await);
        assert!(d.baseline.lock().is_none());

        fs::write(&path, A).unwrap();
        assert!(!d.check().await);
        fs::write(&path, INVALID).unwrap();
        assert!(!d.check().await);
        fs::write(&path, A).unwrap();
        assert!(!d.check().await);
        fs::write(&path, B).unwrap();
        assert!(d.check().await);
        assert!(!d.check().await);
    }

    #[tokio::test]
    async fn test_run_sends_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, A).unwrap();

        let d = std::sync::Arc::new(DriftDetector::new(ConfigSource::new(
            path.to_str().unwrap(),
        )));
        let token = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = {
            let d = d.clone();
            let token = token.clone();
            tokio::spawn(async move { d.run(Duration::from_millis(20), token, tx).await })
        };

        // wait until the baseline is taken
        while d.baseline.lock().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        fs::write(&path, B).unwrap();

        let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(ev, Some(LifecycleEvent::Reload));

        token.cancel();
        handle.await.unwrap();
    }
}
