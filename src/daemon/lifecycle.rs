use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use super::{
    Dispatch, LogRotator, RestartOutcome, Restarter, SaveTask, Scheduler,
};
use crate::{
    channel::ChannelManager,
    cmd::{config_notifiers, config_probers},
    conf::{Conf, ConfigService, DriftDetector},
    logging::Logs,
    probe::ResultStore,
    web::WebServer,
    Prober, DEFAULT_CONFIG_FILE_CHECK_INTERVAL, DEFAULT_PROBE_INTERVAL, DEFAULT_SAVE_INTERVAL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// SIGTERM or SIGINT
    Shutdown,
    /// the configuration source was modified
    Reload,
}

/// One completed step of the graceful exit, in the order they ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStep {
    WebStopped,
    WorkersSignalled(usize),
    WorkersJoined(usize),
    StateSaved,
    ChannelsStopped,
    LogsClosed,
}

/// One running generation: web server, workers, save task, channels and the
/// log rotator, all built from one configuration snapshot.
pub struct Runtime {
    web: WebServer,
    scheduler: Scheduler,
    save: SaveTask,
    channels: Arc<ChannelManager>,
    rotator: LogRotator,
    probers: Vec<Arc<dyn Prober>>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("web", &self.web.local_addr())
            .field("scheduler", &self.scheduler)
            .field("probers", &self.probers.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub async fn start(conf: &Conf, logs: &Logs, dry: bool) -> Result<Self> {
        let settings = &conf.settings;
        logs.apply(&settings.log, &settings.http.log)?;
        if dry {
            log::info!("Dry Notification Mode...");
        }

        let store = Arc::new(ResultStore::new());
        if let Err(err) = store.load_from_file(&settings.sla.data_file) {
            log::warn!("Cannot load the saved results: {:#}", err);
        }

        let (probers, valid) = config_probers(conf.all_probers(), &settings.probe, &store);
        if valid.is_empty() {
            bail!("No probes configured, exiting...")
        }
        let notifiers = config_notifiers(conf.notify.all_notifiers(), &settings.notify);

        let web = WebServer::start(
            &settings.http,
            probers.clone(),
            &settings.timeformat,
            logs.access.clone(),
        )
        .await?;

        let channels = Arc::new(ChannelManager::new(dry));
        channels.set_probers(&valid);
        channels.set_notifiers(notifiers);

        let save = SaveTask::spawn(store, &settings.sla.data_file, DEFAULT_SAVE_INTERVAL);
        let scheduler = Scheduler::start(
            &valid,
            DEFAULT_PROBE_INTERVAL,
            Dispatch {
                channels: Arc::clone(&channels),
                save: save.sender(),
            },
        );

        let rotator = match LogRotator::spawn(logs.clone()) {
            Ok(r) => r,
            Err(err) => {
                web.shutdown().await;
                scheduler.signal();
                scheduler.join().await;
                return Err(err);
            }
        };

        Ok(Self {
            web,
            scheduler,
            save,
            channels,
            rotator,
            probers,
        })
    }

    pub fn web_addr(&self) -> std::net::SocketAddr {
        self.web.local_addr()
    }

    pub fn probers(&self) -> &[Arc<dyn Prober>] {
        &self.probers
    }

    pub fn workers_started(&self) -> usize {
        self.scheduler.started()
    }

    pub fn stagger_gap(&self) -> std::time::Duration {
        self.scheduler.gap()
    }

    /// Runs the graceful exit; each step finishes before the next starts and
    /// the log files are closed last.
    pub async fn exit(self) -> Vec<ExitStep> {
        let mut steps = Vec::with_capacity(6);

        self.web.shutdown().await;
        steps.push(ExitStep::WebStopped);

        steps.push(ExitStep::WorkersSignalled(self.scheduler.signal()));
        steps.push(ExitStep::WorkersJoined(self.scheduler.join().await));

        if let Err(err) = self.save.stop().await {
            log::error!("Failed to save the results: {:#}", err);
        }
        steps.push(ExitStep::StateSaved);

        self.channels.all_done().await;
        steps.push(ExitStep::ChannelsStopped);

        self.rotator.stop().await;
        steps.push(ExitStep::LogsClosed);

        steps
    }
}

/// Turns SIGTERM and SIGINT into `Shutdown` events.
pub fn spawn_signal_listener(events: mpsc::UnboundedSender<LifecycleEvent>) -> Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = term.recv() => log::info!("!!! RECEIVED THE SIGTERM EXIT SIGNAL, EXITING... !!!"),
                _ = int.recv() => log::info!("!!! RECEIVED THE SIGINT EXIT SIGNAL, EXITING... !!!"),
            }
            if events.send(LifecycleEvent::Shutdown).is_err() {
                return;
            }
        }
    });
    Ok(())
}

/// Drives generations of `Runtime` until a shutdown or a successful
/// hand-over to a new process.
pub struct Lifecycle {
    config: Arc<ConfigService>,
    drift: Arc<DriftDetector>,
    restarter: Box<dyn Restarter>,
    logs: Logs,
    dry: bool,
}

impl Lifecycle {
    pub fn new(
        config: Arc<ConfigService>,
        drift: Arc<DriftDetector>,
        restarter: Box<dyn Restarter>,
        logs: Logs,
        dry: bool,
    ) -> Self {
        Self {
            config,
            drift,
            restarter,
            logs,
            dry,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_signal_listener(tx.clone())?;
        self.run_with_events(tx, rx).await
    }

    /// Same as `run`, with the event channel supplied by the caller.
    pub async fn run_with_events(
        &self,
        tx: mpsc::UnboundedSender<LifecycleEvent>,
        mut rx: mpsc::UnboundedReceiver<LifecycleEvent>,
    ) -> Result<()> {
        loop {
            let conf = self.config.current();
            let runtime = Runtime::start(&conf, &self.logs, self.dry).await?;

            // sets the baseline, or catches an edit made while restarting
            if self.drift.check().await {
                let _ = tx.send(LifecycleEvent::Reload);
            }
            let watch = CancellationToken::new();
            let watcher = {
                let drift = Arc::clone(&self.drift);
                let token = watch.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    drift
                        .run(DEFAULT_CONFIG_FILE_CHECK_INTERVAL, token, tx)
                        .await
                })
            };

            let event = rx.recv().await.unwrap_or(LifecycleEvent::Shutdown);
            watch.cancel();
            let _ = watcher.await;

            let steps = runtime.exit().await;
            log::debug!("exit steps: {:?}", steps);

            match event {
                LifecycleEvent::Shutdown => {
                    log::info!("Graceful Exit Successfully!");
                    return Ok(());
                }
                LifecycleEvent::Reload => {
                    if self.reload().await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns true when another process took over.
    async fn reload(&self) -> bool {
        match self.restarter.restart().await {
            Ok(RestartOutcome::Spawned(pid)) => {
                log::info!("!!! RESTART THE EASEPROBE SUCCESSFULLY - PID=[{}] !!!", pid);
                true
            }
            Ok(RestartOutcome::InPlace) => {
                match Conf::load(self.drift.source()).await {
                    Ok(c) => {
                        self.config.install(c);
                        self.drift.reset();
                        log::info!("!!! RELOADED THE CONFIGURATION IN PLACE !!!");
                    }
                    Err(err) => log::error!(
                        "!!! FAILED TO RELOAD THE CONFIGURATION: {:#}, keep the current one !!!",
                        err
                    ),
                }
                false
            }
            Err(err) => {
                log::error!(
                    "!!! FAILED TO RESTART THE EASEPROBE ({}): {:#} !!!",
                    self.restarter.name(),
                    err
                );
                false
            }
        }
    }
}
