use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

mod base;
pub use base::*;
#[cfg(test)]
pub(crate) use base::testing;
mod config;
pub use config::*;
mod log;
pub use self::log::*;

use crate::{NotifierSetting, ProbeResult};

/// Delivers alerts for the probers sharing one of its channels.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn kind(&self) -> &str;
    fn name(&self) -> &str;
    fn channels(&self) -> &[String];
    fn config(&mut self, setting: &NotifierSetting) -> Result<()>;
    async fn notify(&self, res: Arc<ProbeResult>);
    /// Logs what would have been sent.
    fn dry_notify(&self, res: Arc<ProbeResult>);
}
