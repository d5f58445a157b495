use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod notify;
pub use notify::*;
mod probe;
pub use probe::*;

pub const DEFAULT_PROG: &str = "EaseProbe";
pub const DEFAULT_METRICS_NAMESPACE: &str = "easeprobe";

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STATUS_CHANGE_THRESHOLD: u32 = 1;
pub const DEFAULT_NOTIFICATION_FACTOR: u32 = 1;
pub const DEFAULT_MAX_NOTIFICATION_TIMES: u32 = 1;

pub const DEFAULT_RETRY_TIMES: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

pub const DEFAULT_CONFIG_FILE_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(60);

pub const DEFAULT_HTTP_SERVER_IP: &str = "0.0.0.0";
pub const DEFAULT_HTTP_SERVER_PORT: &str = "8181";

pub const DEFAULT_DATA_FILE: &str = "data/data.yaml";
/// Data file path that turns result persistence off.
pub const DATA_FILE_DISABLED: &str = "-";

pub const DEFAULT_CHANNEL_NAME: &str = "__EaseProbe_Channel__";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Retry {
    #[serde(default)]
    pub times: u32,
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub interval: Duration,
}

/// Picks the local value when it is set, then the global one, then the default.
///
/// A value counts as "set" when it is greater than `unset`.
pub fn normalize<T: PartialOrd>(global: T, local: T, unset: T, default: T) -> T {
    if local > unset {
        return local;
    }
    if global > unset {
        return global;
    }
    default
}

pub fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Runs `f` until it succeeds or the retry budget is exhausted.
pub async fn do_retry<F>(kind: &str, name: &str, tag: &str, retry: &Retry, mut f: F) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    let times = retry.times.max(1);
    let mut last_err = None;
    for i in 1..=times {
        match f() {
            Ok(()) => return Ok(()),
            Err(err) => {
                log::warn!(
                    "[{} / {} / {}] Retried to send {}/{} - {}",
                    kind,
                    name,
                    tag,
                    i,
                    times,
                    err
                );
                last_err = Some(err);
                if i < times {
                    tokio::time::sleep(retry.interval).await;
                }
            }
        }
    }
    Err(match last_err {
        Some(err) => anyhow!("[{} / {} / {}] failed after {} retries - {}", kind, name, tag, times, err),
        None => anyhow!("[{} / {} / {}] nothing was sent", kind, name, tag),
    })
}

/// Program name, version, git revision, build time and compiler version.
pub fn version_info() -> String {
    let build_time = env!("EASEPROBE_BUILD_TIME")
        .parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "{} v{} {} {} {}",
        DEFAULT_PROG,
        env!("CARGO_PKG_VERSION"),
        env!("EASEPROBE_GIT_REVISION"),
        build_time,
        env!("EASEPROBE_RUSTC_VERSION"),
    )
}
