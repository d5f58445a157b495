use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;

use crate::{Notifier, ProbeResult, Prober};

use super::Channel;

/// Every channel of one running generation, keyed by channel name.
#[derive(Debug, Default)]
pub struct ChannelManager {
    channels: DashMap<String, Arc<Channel>>,
    dry: bool,
}

impl ChannelManager {
    pub fn new(dry: bool) -> Self {
        Self {
            channels: DashMap::new(),
            dry,
        }
    }

    pub fn is_dry_notify(&self) -> bool {
        self.dry
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|c| Arc::clone(&c))
    }

    /// Returns the named channel, creating it when it does not exist yet.
    pub fn set_channel(&self, name: &str) -> Arc<Channel> {
        let dry = self.dry;
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Channel::new(name, dry)))
            .clone()
    }

    pub fn set_probers(&self, probers: &[Arc<dyn Prober>]) {
        for p in probers {
            for channel_name in p.channels() {
                self.set_channel(channel_name).add_prober(p.kind(), p.name());
            }
        }
    }

    pub fn set_notifiers(&self, notifiers: Vec<Arc<dyn Notifier>>) {
        for n in notifiers {
            for channel_name in n.channels() {
                self.set_channel(channel_name).add_notifier(Arc::clone(&n));
            }
        }
    }

    /// The notifiers reachable from the given channels, by notifier name.
    pub fn get_notifiers(&self, channel_names: &[String]) -> HashMap<String, Arc<dyn Notifier>> {
        let mut notifiers = HashMap::new();
        for channel_name in channel_names {
            if let Some(channel) = self.get_channel(channel_name) {
                for n in channel.notifiers() {
                    notifiers.insert(n.name().to_string(), n);
                }
            }
        }
        notifiers
    }

    /// Queues a result on each of the given channels.
    pub async fn send(&self, channel_names: &[String], result: &ProbeResult) {
        for channel_name in channel_names {
            match self.get_channel(channel_name) {
                Some(channel) => channel.send(result.clone()).await,
                None => log::warn!(
                    "[channel / {}]: no such channel for {}",
                    channel_name,
                    result.name
                ),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Stops every channel and waits for their pending notifications.
    pub async fn all_done(&self) {
        let channels: Vec<Arc<Channel>> = self.channels.iter().map(|c| Arc::clone(&c)).collect();
        for c in channels {
            c.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::new_dummy_notifier;
    use crate::probe::testing::{new_dummy_prober, DummyBehavior};

    fn prober(name: &str, channels: &[&str]) -> Arc<dyn Prober> {
        let mut p = new_dummy_prober(name, DummyBehavior::default());
        p.channels = channels.iter().map(|c| c.to_string()).collect();
        Arc::new(p)
    }

    fn notifier(name: &str, channels: &[&str]) -> Arc<dyn Notifier> {
        Arc::new(new_dummy_notifier(name, channels).0)
    }

    #[tokio::test]
    async fn test_manager() {
        let m = ChannelManager::new(false);
        m.set_notifiers(vec![notifier("dummy", &["test"])]);

        assert!(m.get_notifiers(&["nil-channel".to_string()]).is_empty());
        let n = m.get_notifiers(&["test".to_string()]);
        assert_eq!(n.len(), 1);
        assert_eq!(n["dummy"].name(), "dummy");

        m.set_probers(&[
            prober("dummy-XY", &["X", "Y"]),
            prober("dummy-X", &["X"]),
            prober("dummy-Y", &["Y"]),
            prober("dummy-ALL", &["X", "Y", "test"]),
        ]);

        let x = m.get_channel("X").unwrap();
        assert_eq!(x.prober_names(), vec!["dummy-ALL", "dummy-X", "dummy-XY"]);
        let y = m.get_channel("Y").unwrap();
        assert!(y.has_prober("dummy-Y"));
        assert!(!y.has_prober("dummy-X"));
        assert!(m.get_channel("test").unwrap().has_prober("dummy-ALL"));

        m.set_notifiers(vec![
            notifier("dummy-XY", &["X", "Y"]),
            notifier("dummy-X", &["X"]),
        ]);
        assert!(x.get_notifier("dummy-X").is_some());
        assert!(x.get_notifier("dummy-XY").is_some());
        assert!(y.get_notifier("dummy-X").is_none());
        assert!(y.get_notifier("dummy-XY").is_some());

        let all = m.get_notifiers(&["X".to_string(), "Y".to_string()]);
        assert_eq!(all.len(), 2);
        assert_eq!(m.len(), 3);

        m.all_done().await;
    }

    #[tokio::test]
    async fn test_send_to_channels() {
        let m = ChannelManager::new(false);
        let (a, sent_a) = new_dummy_notifier("a", &["A"]);
        let (b, sent_b) = new_dummy_notifier("b", &["B"]);
        m.set_notifiers(vec![Arc::new(a), Arc::new(b)]);

        let mut r = ProbeResult {
            name: "web".to_string(),
            pre_status: crate::Status::Down,
            status: crate::Status::Up,
            ..Default::default()
        };
        r.recovery_time = std::time::Duration::from_secs(3);
        m.send(&["A".to_string(), "missing".to_string()], &r).await;
        m.all_done().await;

        assert_eq!(*sent_a.lock(), vec!["web Recovery - ( 3s Downtime )".to_string()]);
        assert!(sent_b.lock().is_empty());
    }
}
