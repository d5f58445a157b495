use std::{fmt::Display, str::FromStr, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{
    normalize, DEFAULT_MAX_NOTIFICATION_TIMES, DEFAULT_NOTIFICATION_FACTOR, DEFAULT_PROBE_INTERVAL,
    DEFAULT_STATUS_CHANGE_THRESHOLD, DEFAULT_TIMEOUT,
};

/// Global probe defaults, merged into every prober at configure time.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProbeSettings {
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub interval: Duration,
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,
    #[serde(flatten)]
    pub threshold: StatusChangeThresholdSettings,
    #[serde(default, rename = "alert")]
    pub notification: NotificationStrategySettings,
}

/// Consecutive identical raw results required before the reported status changes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatusChangeThresholdSettings {
    #[serde(default)]
    pub failure: u32,
    #[serde(default)]
    pub success: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationStrategySettings {
    #[serde(default)]
    #[schemars(with = "String")]
    pub strategy: IntervalStrategy,
    #[serde(default)]
    pub factor: u32,
    #[serde(default, rename = "max")]
    pub max_times: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntervalStrategy {
    Unknown,
    Regular,
    Increment,
    Exponential,
}

impl Default for IntervalStrategy {
    fn default() -> Self {
        Self::Unknown
    }
}

impl IntervalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalStrategy::Unknown => "unknown",
            IntervalStrategy::Regular => "regular",
            IntervalStrategy::Increment => "increment",
            IntervalStrategy::Exponential => "exponent",
        }
    }
}

impl Display for IntervalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalStrategy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "regular" => IntervalStrategy::Regular,
            "increment" => IntervalStrategy::Increment,
            "exponent" => IntervalStrategy::Exponential,
            _ => IntervalStrategy::Unknown,
        })
    }
}

impl From<String> for IntervalStrategy {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(IntervalStrategy::Unknown)
    }
}

impl From<IntervalStrategy> for String {
    fn from(s: IntervalStrategy) -> Self {
        s.as_str().to_string()
    }
}

impl ProbeSettings {
    pub fn normalize_timeout(&self, t: Duration) -> Duration {
        normalize(self.timeout, t, Duration::ZERO, DEFAULT_TIMEOUT)
    }

    pub fn normalize_interval(&self, t: Duration) -> Duration {
        normalize(self.interval, t, Duration::ZERO, DEFAULT_PROBE_INTERVAL)
    }

    pub fn normalize_threshold(
        &self,
        t: StatusChangeThresholdSettings,
    ) -> StatusChangeThresholdSettings {
        StatusChangeThresholdSettings {
            failure: normalize(
                self.threshold.failure,
                t.failure,
                0,
                DEFAULT_STATUS_CHANGE_THRESHOLD,
            ),
            success: normalize(
                self.threshold.success,
                t.success,
                0,
                DEFAULT_STATUS_CHANGE_THRESHOLD,
            ),
        }
    }

    pub fn normalize_notification_strategy(
        &self,
        t: NotificationStrategySettings,
    ) -> NotificationStrategySettings {
        NotificationStrategySettings {
            strategy: normalize(
                self.notification.strategy,
                t.strategy,
                IntervalStrategy::Unknown,
                IntervalStrategy::Regular,
            ),
            factor: normalize(
                self.notification.factor,
                t.factor,
                0,
                DEFAULT_NOTIFICATION_FACTOR,
            ),
            max_times: normalize(
                self.notification.max_times,
                t.max_times,
                0,
                DEFAULT_MAX_NOTIFICATION_TIMES,
            ),
        }
    }
}
