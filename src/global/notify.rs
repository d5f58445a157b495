use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{normalize, Retry, DEFAULT_RETRY_INTERVAL, DEFAULT_RETRY_TIMES, DEFAULT_TIMEOUT};

#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotifierSetting {
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,
    #[serde(default)]
    #[schemars(description = "The retry settings")]
    pub retry: Retry,
}

impl NotifierSetting {
    pub fn normalize_timeout(&self, t: Duration) -> Duration {
        normalize(self.timeout, t, Duration::ZERO, DEFAULT_TIMEOUT)
    }

    pub fn normalize_retry(&self, retry: &Retry) -> Retry {
        Retry {
            interval: normalize(
                self.retry.interval,
                retry.interval,
                Duration::ZERO,
                DEFAULT_RETRY_INTERVAL,
            ),
            times: normalize(self.retry.times, retry.times, 0, DEFAULT_RETRY_TIMES),
        }
    }
}
