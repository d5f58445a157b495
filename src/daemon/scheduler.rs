use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::mpsc, time::Instant};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{channel::ChannelManager, ProbeResult, Prober, Status};

/// Fleets up to this size start one second apart.
const STAGGER_WINDOW: Duration = Duration::from_secs(60);
const STAGGER_UNIT: Duration = Duration::from_secs(1);

/// Delay between the first checks of two consecutive workers.
pub fn stagger_gap(count: usize, default_interval: Duration) -> Duration {
    let Ok(n) = u32::try_from(count) else {
        return Duration::ZERO;
    };
    if n == 0 || STAGGER_UNIT * n <= STAGGER_WINDOW {
        return STAGGER_UNIT;
    }
    default_interval / n
}

/// Where the workers deliver every fresh result.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub channels: Arc<ChannelManager>,
    pub save: mpsc::UnboundedSender<ProbeResult>,
}

impl Dispatch {
    async fn deliver(&self, channels: &[String], result: ProbeResult) {
        self.channels.send(channels, &result).await;
        if self.save.send(result).is_err() {
            log::debug!("the save task is gone, result is not persisted");
        }
    }
}

struct Worker {
    name: String,
    token: CancellationToken,
}

/// One worker task per prober.
///
/// Workers are cancelled individually and joined together through a
/// `TaskTracker`. The `started`/`joined` counters let the shutdown path
/// verify that nothing is left running.
pub struct Scheduler {
    workers: Vec<Worker>,
    gap: Duration,
    tracker: TaskTracker,
    started: Arc<AtomicUsize>,
    joined: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.workers.len())
            .field("gap", &self.gap)
            .field("started", &self.started())
            .field("joined", &self.joined())
            .finish()
    }
}

impl Scheduler {
    /// Starts a worker for every prober; the `i`th one waits `i * gap` first.
    pub fn start(
        probers: &[Arc<dyn Prober>],
        default_interval: Duration,
        dispatch: Dispatch,
    ) -> Self {
        let probers: Vec<&Arc<dyn Prober>> = probers
            .iter()
            .filter(|p| {
                let bad = p.result().status() == Status::Bad;
                if bad {
                    log::warn!("[{} / {}] is Bad, not scheduled", p.kind(), p.name());
                }
                !bad
            })
            .collect();
        let gap = stagger_gap(probers.len(), default_interval);
        let tracker = TaskTracker::new();
        let started = Arc::new(AtomicUsize::new(0));
        let joined = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(probers.len());
        for (i, p) in probers.iter().enumerate() {
            let token = CancellationToken::new();
            let delay = gap.saturating_mul(u32::try_from(i).unwrap_or(u32::MAX));

            let prober = Arc::clone(*p);
            let worker_token = token.clone();
            let dispatch = dispatch.clone();
            let joined = Arc::clone(&joined);
            started.fetch_add(1, Ordering::SeqCst);
            tracker.spawn(async move {
                let _joined = scopeguard::guard((), |_| {
                    joined.fetch_add(1, Ordering::SeqCst);
                });
                run_worker(prober, delay, worker_token, dispatch).await;
            });

            workers.push(Worker {
                name: p.name().to_string(),
                token,
            });
        }

        log::info!(
            "{} probers started, {:?} apart",
            started.load(Ordering::SeqCst),
            gap
        );
        Self {
            workers,
            gap,
            tracker,
            started,
            joined,
        }
    }

    /// Delay between two consecutive workers' first checks.
    pub fn gap(&self) -> Duration {
        self.gap
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn joined(&self) -> usize {
        self.joined.load(Ordering::SeqCst)
    }

    /// Cancels every started worker; returns how many.
    pub fn signal(&self) -> usize {
        for w in &self.workers {
            log::debug!("[{}] cancelling the worker", w.name);
            w.token.cancel();
        }
        self.workers.len()
    }

    /// Waits until every worker has returned; returns the joined count.
    pub async fn join(&self) -> usize {
        self.tracker.close();
        self.tracker.wait().await;
        self.joined()
    }
}

async fn run_worker(
    prober: Arc<dyn Prober>,
    delay: Duration,
    token: CancellationToken,
    dispatch: Dispatch,
) {
    log::debug!(
        "[{} / {}] first check in {:?}",
        prober.kind(),
        prober.name(),
        delay
    );
    tokio::select! {
        _ = token.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }

    let interval = prober.interval();
    let timer = tokio::time::sleep(interval);
    tokio::pin!(timer);

    loop {
        let result = prober.probe().await;
        log::debug!(
            "[{} / {}] {} - {}",
            prober.kind(),
            prober.name(),
            result.status,
            result.message
        );
        dispatch.deliver(prober.channels(), result).await;

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::info!("[{} / {}] Received the done signal, exiting...", prober.kind(), prober.name());
                break;
            }
            _ = &mut timer => {
                timer.as_mut().reset(Instant::now() + interval);
            }
        }
    }
}
