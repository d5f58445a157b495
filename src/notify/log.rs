use std::{
    fs::OpenOptions,
    io::Write,
    sync::Arc,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{global::NotifierSetting, probe::ProbeResult};

use super::{DefaultNotifier, Notifier};

/// Writes notifications into a file, or into the application log when no
/// file is given.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LogNotifier {
    #[serde(flatten)]
    pub default: DefaultNotifier,
    #[serde(default)]
    pub file: String,
}

impl LogNotifier {
    pub fn new(name: &str, file: &str) -> Self {
        Self {
            default: DefaultNotifier::new("log", name),
            file: file.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn kind(&self) -> &str {
        self.default.kind()
    }

    fn name(&self) -> &str {
        self.default.name()
    }

    fn channels(&self) -> &[String] {
        self.default.channels()
    }

    fn config(&mut self, g_conf: &NotifierSetting) -> Result<()> {
        if self.default.kind.is_empty() {
            self.default.kind = "log".to_string();
        }

        self.default.config(g_conf)?;

        let file = self.file.trim();
        if file.is_empty() {
            let name = self.default.name.clone();
            self.default.send_func = Some(Arc::new(move |title: &str, msg: &str| {
                log::info!("[log / {}] Notification: {}\n{}", name, title, msg);
                Ok(())
            }));
            return Ok(());
        }

        let target = OpenOptions::new()
            .append(true)
            .create(true)
            .open(file)
            .with_context(|| format!("Failed to open log file {}", file))?;
        let target = Arc::new(Mutex::new(target));
        self.default.send_func = Some(Arc::new(move |title: &str, msg: &str| {
            let mut f = target.lock();
            writeln!(f, "Notification: {}", title)?;
            for line in msg.lines() {
                writeln!(f, "{}", line)?;
            }
            f.flush()?;
            Ok(())
        }));
        log::info!(
            "[{} / {}] notifications are written to {}",
            self.kind(),
            self.name(),
            file
        );
        Ok(())
    }

    async fn notify(&self, result: Arc<ProbeResult>) {
        self.default.notify(result).await
    }

    fn dry_notify(&self, res: Arc<ProbeResult>) {
        self.default.dry_notify(res)
    }
}
