use serde::{Deserialize, Serialize};

use crate::{IntervalStrategy, NotificationStrategySettings};

/// Tracks an outage to decide which Down reports deserve a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStrategyData {
    #[serde(flatten)]
    pub settings: NotificationStrategySettings,
    /// notifications already sent for the current outage
    pub notified: u32,
    /// consecutive Down reports in the current outage
    pub failed: u32,
    /// the Down report number that triggers the next notification
    pub next: u32,
    pub interval: u32,
    #[serde(skip)]
    notify_now: bool,
}

impl Default for NotificationStrategyData {
    fn default() -> Self {
        Self::new(NotificationStrategySettings::default())
    }
}

impl NotificationStrategyData {
    pub fn new(settings: NotificationStrategySettings) -> Self {
        Self {
            settings,
            notified: 0,
            failed: 0,
            next: 1,
            interval: 0,
            notify_now: false,
        }
    }

    pub fn reset(&mut self) {
        self.notified = 0;
        self.failed = 0;
        self.next = 1;
        self.interval = 0;
        self.notify_now = false;
    }

    /// Feeds one reported status into the strategy; `up == false` means Down.
    pub fn process_status(&mut self, up: bool) {
        if up {
            self.reset();
            return;
        }

        self.failed += 1;
        self.notify_now = false;

        if self.failed != self.next {
            return;
        }
        if self.settings.max_times > 0 && self.notified >= self.settings.max_times {
            return;
        }

        let factor = self.settings.factor.max(1);
        self.interval = match self.settings.strategy {
            IntervalStrategy::Increment => self.interval + factor,
            IntervalStrategy::Exponential if self.interval > 0 => self.interval.saturating_mul(2),
            _ => factor,
        };
        self.next = self.failed.saturating_add(self.interval);
        self.notified += 1;
        self.notify_now = true;
    }

    pub fn need_to_send_notification(&self) -> bool {
        self.notify_now
    }
}
