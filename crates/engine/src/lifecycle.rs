use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use common::{Error, Result, ScreenResult};

use crate::screener::Screener;

/// Commands sent to the scheduler via the command channel.
#[derive(Debug)]
pub enum ScreenCommand {
    /// Run a screen now. The fresh result is sent back when a reply channel
    /// is given.
    Refresh {
        reply: Option<oneshot::Sender<ScreenResult>>,
    },
}

/// Cloneable handle passed to the dashboard API.
#[derive(Clone)]
pub struct ScreenerHandle {
    command_tx: mpsc::Sender<ScreenCommand>,
    latest: Arc<RwLock<Option<ScreenResult>>>,
}

impl ScreenerHandle {
    /// Run a screen now and wait for its result.
    pub async fn refresh(&self) -> Result<ScreenResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(ScreenCommand::Refresh {
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| Error::Other("screen scheduler is not running".into()))?;
        reply_rx
            .await
            .map_err(|_| Error::Other("screen scheduler dropped the refresh".into()))
    }

    /// Queue a screen without waiting for it. `latest()` reflects it once
    /// the run completes.
    pub async fn trigger(&self) -> Result<()> {
        self.command_tx
            .send(ScreenCommand::Refresh { reply: None })
            .await
            .map_err(|_| Error::Other("screen scheduler is not running".into()))
    }

    /// The most recent completed screen, if any run has finished yet.
    pub async fn latest(&self) -> Option<ScreenResult> {
        self.latest.read().await.clone()
    }
}

/// Owns the screener and re-runs it on a fixed interval and on demand.
/// Each completed run replaces the published snapshot.
pub struct Scheduler {
    screener: Screener,
    universe: Arc<Vec<String>>,
    refresh_interval: Duration,
    run_on_startup: bool,
    latest: Arc<RwLock<Option<ScreenResult>>>,
    command_rx: mpsc::Receiver<ScreenCommand>,
}

impl Scheduler {
    pub fn new(
        screener: Screener,
        universe: Vec<String>,
        refresh_interval: Duration,
    ) -> (Self, ScreenerHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let latest = Arc::new(RwLock::new(None));

        let handle = ScreenerHandle {
            command_tx,
            latest: latest.clone(),
        };

        let scheduler = Scheduler {
            screener,
            universe: Arc::new(universe),
            refresh_interval,
            run_on_startup: true,
            latest,
            command_rx,
        };

        (scheduler, handle)
    }

    pub fn run_on_startup(mut self, enabled: bool) -> Self {
        self.run_on_startup = enabled;
        self
    }

    /// Run the scheduler loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            tickers = self.universe.len(),
            interval_secs = self.refresh_interval.as_secs(),
            "Screen scheduler running"
        );

        let first_tick = if self.run_on_startup {
            tokio::time::Instant::now()
        } else {
            tokio::time::Instant::now() + self.refresh_interval
        };
        let mut timer = tokio::time::interval_at(first_tick, self.refresh_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.refresh_once().await;
                }

                cmd = self.command_rx.recv(), if commands_open => {
                    match cmd {
                        Some(ScreenCommand::Refresh { reply }) => {
                            info!("Manual screen refresh requested");
                            let result = self.refresh_once().await;
                            if let Some(reply) = reply {
                                let _ = reply.send(result);
                            }
                            // A manual run restarts the periodic countdown.
                            timer.reset();
                        }
                        None => {
                            warn!("Screen command channel closed, continuing on the timer only");
                            commands_open = false;
                        }
                    }
                }
            }
        }
    }

    async fn refresh_once(&self) -> ScreenResult {
        let result = self.screener.run_screen(&self.universe).await;
        *self.latest.write().await = Some(result.clone());
        result
    }
}
