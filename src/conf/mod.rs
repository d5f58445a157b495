use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::LevelFilter;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::{
    global::{NotifierSetting, ProbeSettings},
    logging, notify, probe, Prober, DEFAULT_DATA_FILE, DEFAULT_HTTP_SERVER_IP,
    DEFAULT_HTTP_SERVER_PORT, DEFAULT_PROG, DEFAULT_TIME_FORMAT,
};

mod source;
pub use source::*;
mod drift;
pub use drift::*;
mod service;
pub use service::*;
mod metrics;
pub use metrics::*;

pub fn json_schema() -> Result<String> {
    let schema = schema_for!(Conf);
    Ok(serde_json::to_string_pretty(&schema)?)
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LogSettings {
    #[serde(default)]
    pub file: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file: Default::default(),
            level: default_log_level(),
        }
    }
}

impl LogSettings {
    pub fn level_filter(&self) -> LevelFilter {
        logging::parse_level(&self.level)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SlaSettings {
    /// result data file, `-` disables persistence
    #[serde(default = "default_data_file")]
    pub data_file: String,
}

fn default_data_file() -> String {
    DEFAULT_DATA_FILE.to_string()
}

impl Default for SlaSettings {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

// HTTP Server settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HttpServerSettings {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub refresh: Duration,
    #[serde(default)]
    pub log: LogSettings,
}

fn default_ip() -> String {
    DEFAULT_HTTP_SERVER_IP.to_string()
}

fn default_port() -> String {
    DEFAULT_HTTP_SERVER_PORT.to_string()
}

impl Default for HttpServerSettings {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            refresh: Default::default(),
            log: Default::default(),
        }
    }
}

// Global Settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_time_format")]
    pub timeformat: String,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub notify: NotifierSetting,
    #[serde(default)]
    pub sla: SlaSettings,
    #[serde(default)]
    pub http: HttpServerSettings,
}

fn default_name() -> String {
    DEFAULT_PROG.to_string()
}

fn default_time_format() -> String {
    DEFAULT_TIME_FORMAT.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: default_name(),
            timeformat: default_time_format(),
            log: Default::default(),
            probe: Default::default(),
            notify: Default::default(),
            sla: Default::default(),
            http: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Conf {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub http: Vec<probe::HttpProber>,
    #[serde(default)]
    pub tcp: Vec<probe::TcpProber>,
    #[serde(default)]
    pub notify: notify::Config,
    #[serde(default)]
    pub settings: Settings,
}

impl Conf {
    /// Parses a raw document after expanding environment variables.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(raw);
        let expanded = expand_env(&text);
        let c: Conf = serde_yaml::from_str(&expanded)?;
        Ok(c)
    }

    pub async fn load(source: &ConfigSource) -> Result<Self> {
        let raw = source.fetch().await?;
        let c = Self::from_slice(&raw)
            .with_context(|| format!("invalid configuration {}", source))?;
        log::info!("Load the configuration {} successfully!", source);
        if log::log_enabled!(log::Level::Debug) {
            match serde_yaml::to_string(&c) {
                Ok(s) => log::debug!("\n{}", s),
                Err(err) => log::debug!("{}\n{:?}", err, c),
            }
        }
        Ok(c)
    }

    /// Every declared prober, one list per protocol section, in document order.
    pub fn all_probers(&self) -> Vec<Box<dyn Prober>> {
        let mut probers: Vec<Box<dyn Prober>> = vec![];
        for p in &self.http {
            probers.push(Box::new(p.clone()));
        }
        for p in &self.tcp {
            probers.push(Box::new(p.clone()));
        }
        probers
    }
}

/// Convenience for handlers that want the installed configuration.
pub type SharedConf = Arc<Conf>;
