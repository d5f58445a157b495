use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    NotificationStrategySettings, ProbeSettings, StatusChangeThresholdSettings,
    DEFAULT_CHANNEL_NAME,
};

use super::{NotificationStrategyData, ProbeMetrics, ProbeResult, Prober, SharedResult, Status};

/// The protocol specific part of a prober.
#[async_trait]
pub trait ProbeBehavior: Send + Sync {
    fn kind(&self) -> &'static str;
    fn endpoint(&self) -> String;
    /// Validates the target and prepares whatever the check needs.
    fn config(&mut self, name: &str, timeout: Duration) -> Result<()>;
    /// One raw check: `(success, message)`.
    async fn do_probe(&self) -> Result<(bool, String)>;
}

/// The fields and bookkeeping every prober shares.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DefaultProber<B> {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub interval: Duration,
    #[serde(flatten)]
    pub threshold: StatusChangeThresholdSettings,
    #[serde(default, rename = "alert")]
    pub notification: NotificationStrategySettings,
    #[serde(skip)]
    result: SharedResult,
    #[serde(skip)]
    metrics: Option<ProbeMetrics>,
    #[serde(flatten)]
    pub behavior: B,
}

impl<B: ProbeBehavior> DefaultProber<B> {
    pub fn new(name: &str, behavior: B) -> Self {
        Self {
            name: name.to_string(),
            channels: vec![],
            timeout: Duration::ZERO,
            interval: Duration::ZERO,
            threshold: StatusChangeThresholdSettings::default(),
            notification: NotificationStrategySettings::default(),
            result: SharedResult::default(),
            metrics: None,
            behavior,
        }
    }

    fn history_len(&self) -> usize {
        self.threshold.failure.max(self.threshold.success).max(1) as usize
    }
}

#[async_trait]
impl<B: ProbeBehavior + 'static> Prober for DefaultProber<B> {
    fn kind(&self) -> &str {
        self.behavior.kind()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn channels(&self) -> &[String] {
        &self.channels
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn result(&self) -> &SharedResult {
        &self.result
    }

    fn config(&mut self, setting: &ProbeSettings) -> Result<()> {
        self.timeout = setting.normalize_timeout(self.timeout);
        self.interval = setting.normalize_interval(self.interval);
        self.threshold = setting.normalize_threshold(self.threshold);
        self.notification = setting.normalize_notification_strategy(self.notification);

        if self.channels.is_empty() {
            self.channels.push(DEFAULT_CHANNEL_NAME.to_string());
        }

        let max_len = self.history_len();
        let endpoint = self.behavior.endpoint();
        let notification = self.notification;
        self.result.update(|r| {
            r.name = self.name.clone();
            r.endpoint = endpoint;
            r.stat.status_counter.set_max_len(max_len);
            r.stat.notification_strategy_data = NotificationStrategyData::new(notification);
        });

        self.behavior.config(&self.name, self.timeout)?;

        match ProbeMetrics::new(self.behavior.kind()) {
            Ok(m) => self.metrics = Some(m),
            Err(err) => log::warn!(
                "[{} / {}] metrics are not available - {}",
                self.kind(),
                self.name,
                err
            ),
        }

        self.result.update(|r| {
            if r.message.is_empty() {
                r.message = "Good Configuration!".to_string();
            }
        });

        log::debug!(
            "[{} / {}] configured: timeout={:?} interval={:?} failure={} success={} alert={}",
            self.kind(),
            self.name,
            self.timeout,
            self.interval,
            self.threshold.failure,
            self.threshold.success,
            self.notification.strategy,
        );
        Ok(())
    }

    async fn probe(&self) -> ProbeResult {
        let start_time = Utc::now();
        let started = Instant::now();

        let (ok, message) = match tokio::time::timeout(self.timeout, self.behavior.do_probe()).await
        {
            Ok(Ok(res)) => res,
            Ok(Err(err)) => (false, format!("Error: {}", err)),
            Err(_) => (
                false,
                format!("Error: no response within {:?}", self.timeout),
            ),
        };
        let round_trip_time = started.elapsed();

        if !ok {
            log::debug!("[{} / {}] check failed - {}", self.kind(), self.name, message);
        }

        let title = if ok {
            Status::Up.title()
        } else {
            Status::Down.title()
        };
        let res = self.result.update(|r| {
            r.start_time = start_time;
            r.round_trip_time = round_trip_time;
            r.message = format!("{} ({})", title, message);
            r.stat.status_counter.append_status(ok, message);
            r.apply_threshold(self.threshold.failure, self.threshold.success);
            r.do_stat(self.interval);
            r.stat
                .notification_strategy_data
                .process_status(r.status != Status::Down);
            r.clone()
        });

        if let Some(m) = &self.metrics {
            m.export(&res);
        }
        res
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use anyhow::bail;

    use super::*;

    /// Plays back a fixed script of outcomes, then keeps succeeding.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct DummyBehavior {
        pub script: Vec<bool>,
        pub delay: Duration,
        pub bad_config: bool,
        pub calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProbeBehavior for DummyBehavior {
        fn kind(&self) -> &'static str {
            "dummy"
        }

        fn endpoint(&self) -> String {
            "dummy://endpoint".to_string()
        }

        fn config(&mut self, _name: &str, _timeout: Duration) -> Result<()> {
            if self.bad_config {
                bail!("malformed address")
            }
            Ok(())
        }

        async fn do_probe(&self) -> Result<(bool, String)> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let ok = self.script.get(i).copied().unwrap_or(true);
            Ok((ok, format!("call {}", i)))
        }
    }

    pub(crate) fn new_dummy_prober(name: &str, behavior: DummyBehavior) -> DefaultProber<DummyBehavior> {
        let mut p = DefaultProber::new(name, behavior);
        p.timeout = Duration::from_secs(1);
        p.interval = Duration::from_secs(5);
        p
    }
}
