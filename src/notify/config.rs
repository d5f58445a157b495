use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{LogNotifier, Notifier};

/// The `notify` section: one list per notifier kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub log: Vec<LogNotifier>,
}

impl Config {
    pub fn all_notifiers(&self) -> Vec<Box<dyn Notifier>> {
        let mut notifiers: Vec<Box<dyn Notifier>> = vec![];
        for n in &self.log {
            notifiers.push(Box::new(n.clone()));
        }
        notifiers
    }
}
