use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Notifier;
use crate::{global, report, NotifierSetting, ProbeResult, Retry, DEFAULT_CHANNEL_NAME};

pub type SendFunc = Arc<dyn Fn(&str, &str) -> Result<()> + Send + Sync>;

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct DefaultNotifier {
    #[serde(skip)]
    pub kind: String,
    #[serde(skip)]
    pub send_func: Option<SendFunc>,
    pub name: String,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub dry: bool,
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,
    #[serde(default)]
    pub retry: Retry,
}

impl std::fmt::Debug for DefaultNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultNotifier")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("channels", &self.channels)
            .field("dry", &self.dry)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl DefaultNotifier {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            send_func: None,
            name: name.to_string(),
            channels: vec![],
            dry: false,
            timeout: Duration::ZERO,
            retry: Retry::default(),
        }
    }

    async fn send_with_retry(&self, title: &str, msg: &str, tag: &str) {
        let func = || -> Result<()> {
            log::debug!("[{} / {} / {}] - {}", self.kind, self.name, tag, title);
            if let Some(send_func) = &self.send_func {
                send_func(title, msg)
            } else {
                log::error!(
                    "[{} / {} / {}] - {} SendFunc is none",
                    self.kind,
                    self.name,
                    tag,
                    title
                );
                bail!("SendFunc is none")
            }
        };
        let err = global::do_retry(&self.kind, &self.name, tag, &self.retry, func).await;
        report::log_send(&self.kind, &self.name, tag, title, err);
    }
}

#[async_trait]
impl Notifier for DefaultNotifier {
    fn config(&mut self, conf: &NotifierSetting) -> Result<()> {
        let mode = if self.dry { "Dry" } else { "Live" };
        log::info!(
            "Notification [{}] - [{}] is running on {} mode!",
            self.kind,
            self.name,
            mode,
        );

        self.timeout = conf.normalize_timeout(self.timeout);
        self.retry = conf.normalize_retry(&self.retry);

        if self.channels.is_empty() {
            self.channels.push(DEFAULT_CHANNEL_NAME.to_string());
        }

        log::info!(
            "Notification [{}] - [{}] is configured!",
            self.kind,
            self.name,
        );
        Ok(())
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn channels(&self) -> &[String] {
        &self.channels
    }

    async fn notify(&self, result: Arc<ProbeResult>) {
        if self.dry {
            self.dry_notify(result);
            return;
        }
        let title = result.title();
        let msg = report::to_text(&result);
        self.send_with_retry(&title, &msg, "Notification").await;
    }

    fn dry_notify(&self, res: Arc<ProbeResult>) {
        log::info!(
            "[{} / {} / dry_notify] - {}",
            self.kind,
            self.name,
            report::to_text(&res)
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// A notifier recording the titles it was asked to send.
    pub(crate) fn new_dummy_notifier(
        name: &str,
        channels: &[&str],
    ) -> (DefaultNotifier, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(vec![]));
        let mut n = DefaultNotifier::new("dummy", name);
        n.channels = channels.iter().map(|c| c.to_string()).collect();
        let sink = sent.clone();
        n.send_func = Some(Arc::new(move |title: &str, _msg: &str| {
            sink.lock().push(title.to_string());
            Ok(())
        }));
        (n, sent)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::testing::*;
    use super::*;
    use crate::Status;

    fn down_result() -> Arc<ProbeResult> {
        Arc::new(ProbeResult {
            name: "web".to_string(),
            endpoint: "http://web".to_string(),
            status: Status::Down,
            pre_status: Status::Up,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_config_and_notify() {
        let (mut n, sent) = new_dummy_notifier("dummy", &[]);
        n.config(&NotifierSetting::default()).unwrap();
        assert_eq!(n.channels(), &[DEFAULT_CHANNEL_NAME.to_string()]);
        assert_eq!(n.retry.times, crate::DEFAULT_RETRY_TIMES);

        n.notify(down_result()).await;
        assert_eq!(*sent.lock(), vec!["web Failure".to_string()]);
    }

    #[tokio::test]
    async fn test_dry_does_not_send() {
        let (mut n, sent) = new_dummy_notifier("dummy", &["ops"]);
        n.dry = true;
        n.config(&NotifierSetting::default()).unwrap();
        n.notify(down_result()).await;
        assert!(sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_sent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut n = DefaultNotifier::new("dummy", "flaky");
        let c = calls.clone();
        n.send_func = Some(Arc::new(move |_: &str, _: &str| {
            if c.fetch_add(1, Ordering::SeqCst) < 2 {
                bail!("try again")
            }
            Ok(())
        }));
        n.config(&NotifierSetting::default()).unwrap();
        n.notify(down_result()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
