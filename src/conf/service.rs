use std::sync::Arc;

use parking_lot::RwLock;

use super::Conf;

/// Holds the installed configuration.
///
/// Readers get an `Arc` snapshot; a reload swaps the whole document, so a
/// reader never sees a half-updated configuration.
#[derive(Debug, Default)]
pub struct ConfigService {
    current: RwLock<Arc<Conf>>,
}

impl ConfigService {
    pub fn new(conf: Conf) -> Self {
        Self {
            current: RwLock::new(Arc::new(conf)),
        }
    }

    pub fn current(&self) -> Arc<Conf> {
        self.current.read().clone()
    }

    /// Replaces the installed configuration and returns the previous one.
    pub fn install(&self, conf: Conf) -> Arc<Conf> {
        std::mem::replace(&mut *self.current.write(), Arc::new(conf))
    }
}
