use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use super::{DefaultProber, ProbeBehavior};

pub type TcpProber = DefaultProber<TcpProbeBehavior>;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TcpProbeBehavior {
    /// `host:port` to connect to
    pub host: String,
}

impl TcpProbeBehavior {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
        }
    }
}

fn check_address(host: &str) -> Result<()> {
    let Some((h, port)) = host.trim().rsplit_once(':') else {
        bail!("{} has no port", host)
    };
    if h.is_empty() {
        bail!("{} has no host", host)
    }
    if port.parse::<u16>().map_or(true, |p| p == 0) {
        bail!("{} has an invalid port", host)
    }
    Ok(())
}

#[async_trait]
impl ProbeBehavior for TcpProbeBehavior {
    fn kind(&self) -> &'static str {
        "tcp"
    }

    fn endpoint(&self) -> String {
        self.host.clone()
    }

    fn config(&mut self, name: &str, _timeout: Duration) -> Result<()> {
        if let Err(err) = check_address(&self.host) {
            log::error!("[{} / {}] host is not valid - {}", self.kind(), name, err);
            return Err(err);
        }
        self.host = self.host.trim().to_string();
        Ok(())
    }

    async fn do_probe(&self) -> Result<(bool, String)> {
        match TcpStream::connect(&self.host).await {
            Ok(_) => Ok((true, "TCP Connection Established Successfully!".to_string())),
            Err(err) => Ok((false, format!("Error: {}", err))),
        }
    }
}
