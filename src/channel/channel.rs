use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{Notifier, ProbeResult, Status};

const KIND: &str = "channel";
const QUEUE_SIZE: usize = 100;

type Notifiers = Arc<RwLock<HashMap<String, Arc<dyn Notifier>>>>;

/// Routes the results of its probers to its notifiers.
///
/// Every channel owns one dispatch task. Results are queued; the task decides
/// whether a result is worth an alert and fans it out to the notifiers.
pub struct Channel {
    name: String,
    dry: bool,
    probers: RwLock<BTreeSet<String>>,
    notifiers: Notifiers,
    tx: mpsc::Sender<ProbeResult>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("dry", &self.dry)
            .field("probers", &*self.probers.read())
            .field("notifiers", &self.notifiers.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Channel {
    /// Creates the channel and starts its dispatch task.
    pub fn new(name: &str, dry: bool) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_SIZE);
        let ch = Self {
            name: name.to_string(),
            dry,
            probers: RwLock::new(BTreeSet::new()),
            notifiers: Arc::new(RwLock::new(HashMap::new())),
            tx,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        };
        ch.watch_event(rx);
        ch
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_prober(&self, name: &str) -> bool {
        self.probers.read().contains(name)
    }

    pub fn prober_names(&self) -> Vec<String> {
        self.probers.read().iter().cloned().collect()
    }

    pub fn add_prober(&self, kind: &str, name: &str) {
        if !self.probers.write().insert(name.to_string()) {
            log::warn!(
                "[{} / {}]: Prober [{} - {}] name is duplicated, ignored!",
                KIND,
                self.name,
                kind,
                name
            );
        }
    }

    pub fn get_notifier(&self, name: &str) -> Option<Arc<dyn Notifier>> {
        self.notifiers.read().get(name).cloned()
    }

    pub fn notifiers(&self) -> Vec<Arc<dyn Notifier>> {
        self.notifiers.read().values().cloned().collect()
    }

    pub fn add_notifier(&self, notifier: Arc<dyn Notifier>) {
        let mut notifiers = self.notifiers.write();
        if notifiers.contains_key(notifier.name()) {
            log::warn!(
                "[{} / {}]: Notifier [{} - {}] name is duplicated, ignored!",
                KIND,
                self.name,
                notifier.kind(),
                notifier.name()
            );
            return;
        }
        notifiers.insert(notifier.name().to_string(), notifier);
    }

    pub async fn send(&self, result: ProbeResult) {
        if let Err(e) = self.tx.send(result).await {
            log::error!(
                "[{} / {}]: Failed to send probe result: {}",
                KIND,
                self.name,
                e
            );
        }
    }

    /// Stops the dispatch task after the queued results are handled and
    /// waits for the notifications in flight.
    pub async fn stop(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }

    fn watch_event(&self, mut rx: mpsc::Receiver<ProbeResult>) {
        let token = self.token.clone();
        let tracker = self.tracker.clone();
        let name = self.name.clone();
        let notifiers = Arc::clone(&self.notifiers);
        let dry = self.dry;

        self.tracker.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        log::info!("[{} / {}]: Received the done signal, channel exiting...", KIND, name);
                        break;
                    }
                    result = rx.recv() => match result {
                        Some(result) => handle_result(&name, result, &notifiers, dry, &tracker),
                        None => break,
                    }
                }
            }
            rx.close();
            while let Ok(result) = rx.try_recv() {
                handle_result(&name, result, &notifiers, dry, &tracker);
            }
        });
    }
}

/// Whether a result calls for an alert.
pub fn need_to_notify(result: &ProbeResult) -> bool {
    if result.pre_status == Status::Init && result.status == Status::Up {
        return false;
    }
    if result.pre_status == result.status
        && (result.status == Status::Up || result.status == Status::Init)
    {
        return false;
    }
    if result.status == Status::Down
        && !result.stat.notification_strategy_data.need_to_send_notification()
    {
        return false;
    }
    true
}

fn handle_result(
    channel_name: &str,
    result: ProbeResult,
    notifiers: &Notifiers,
    dry: bool,
    tracker: &TaskTracker,
) {
    if !need_to_notify(&result) {
        log::debug!(
            "[{} / {}]: {} ({}) - [{}] ==> [{}], no notification.",
            KIND,
            channel_name,
            result.name,
            result.endpoint,
            result.pre_status,
            result.status
        );
        return;
    }

    if result.pre_status != result.status {
        log::info!(
            "[{} / {}]: {} ({}) - Status changed [{}] ==> [{}], sending notification...",
            KIND,
            channel_name,
            result.name,
            result.endpoint,
            result.pre_status,
            result.status
        );
    } else {
        log::debug!(
            "[{} / {}]: {} ({}) - Meet the notification condition, sending notification...",
            KIND,
            channel_name,
            result.name,
            result.endpoint
        );
    }

    let result = Arc::new(result);
    for notifier in notifiers.read().values() {
        let r = Arc::clone(&result);
        if dry {
            notifier.dry_notify(r);
        } else {
            let n = Arc::clone(notifier);
            tracker.spawn(async move { n.notify(r).await });
        }
    }
}
