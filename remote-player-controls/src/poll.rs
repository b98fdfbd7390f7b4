use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::{Error, Result, notification::NotificationBroadcast, refresh::Refresher};

/// Poll interval as a function of consecutive failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    ceiling: u32,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, ceiling: u32) -> Self {
        Self {
            base,
            ceiling,
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn interval(&self) -> Duration {
        let factor = match self.failures {
            0..=10 => 1,
            11..=20 => 5,
            21..=30 => 10,
            _ => 30,
        };

        self.base * factor
    }

    /// Returns true once the ceiling is reached.
    pub fn record_failure(&mut self) -> bool {
        self.failures = self.failures.saturating_add(1);
        self.exhausted()
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn exhausted(&self) -> bool {
        self.failures >= self.ceiling
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Push is available, nothing to do.
    Idle,
    Scheduled,
    Refreshing,
    /// Ceiling reached. Only a manual liveness check leaves this state.
    Stopped,
}

/// Refreshes on an interval while the push channel is down.
#[derive(Debug)]
pub struct Poller {
    refresher: Arc<Refresher>,
    notifications: Arc<NotificationBroadcast>,
    backoff: Arc<Mutex<Backoff>>,
    available: watch::Receiver<bool>,
    state: watch::Sender<PollState>,
    rearm: Arc<Notify>,
}

#[derive(Debug, Clone)]
pub struct PollHandle {
    refresher: Arc<Refresher>,
    backoff: Arc<Mutex<Backoff>>,
    state: watch::Receiver<PollState>,
    rearm: Arc<Notify>,
}

impl Poller {
    pub fn new(
        refresher: Arc<Refresher>,
        notifications: Arc<NotificationBroadcast>,
        available: watch::Receiver<bool>,
        interval: Duration,
        max_failures: u32,
    ) -> (Self, PollHandle) {
        let backoff = Arc::new(Mutex::new(Backoff::new(interval, max_failures)));
        let (state, state_rx) = watch::channel(PollState::Idle);
        let rearm = Arc::new(Notify::new());

        let handle = PollHandle {
            refresher: refresher.clone(),
            backoff: backoff.clone(),
            state: state_rx,
            rearm: rearm.clone(),
        };

        (
            Self {
                refresher,
                notifications,
                backoff,
                available,
                state,
                rearm,
            },
            handle,
        )
    }

    fn set_state(&self, state: PollState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            if changed {
                debug!(?state, "poll state");
            }
            *current = state;
            changed
        });
    }

    /// Runs until aborted. Once the availability sender is gone the push
    /// channel counts as unavailable for good.
    #[instrument(skip_all)]
    pub async fn run(mut self) {
        let mut push_closed = false;

        loop {
            if self.backoff.lock().await.exhausted() {
                self.set_state(PollState::Stopped);
                self.rearm.notified().await;
                continue;
            }

            if !push_closed && *self.available.borrow_and_update() {
                self.set_state(PollState::Idle);
                if self.available.changed().await.is_err() {
                    push_closed = true;
                }
                continue;
            }

            let interval = self.backoff.lock().await.interval();
            self.set_state(PollState::Scheduled);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = self.available.changed(), if !push_closed => {
                    if changed.is_err() {
                        push_closed = true;
                    }
                    continue;
                }
                _ = self.rearm.notified() => continue,
            }

            self.poll().await;
        }
    }

    async fn poll(&self) {
        self.set_state(PollState::Refreshing);

        let result = match self.refresher.liveness().await {
            Ok(()) => self.refresher.refresh().await,
            Err(error) => Err(error),
        };

        let mut backoff = self.backoff.lock().await;

        match result {
            Ok(()) => {
                if backoff.failures() > 0 {
                    info!("engine reachable again after {} failures", backoff.failures());
                }
                backoff.record_success();
            }
            Err(err) => {
                let exhausted = backoff.record_failure();
                warn!(
                    failures = backoff.failures(),
                    next = ?backoff.interval(),
                    "poll failed: {err}"
                );

                if exhausted {
                    error!("engine unreachable, polling stopped");
                    self.notifications
                        .send_error("The media engine is unreachable".to_string());
                }
            }
        }
    }
}

impl PollHandle {
    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    pub async fn failures(&self) -> u32 {
        self.backoff.lock().await.failures()
    }

    /// Pings the engine. On success the failure count is cleared and a
    /// stopped poller starts again.
    pub async fn check_liveness(&self) -> Result<()> {
        if let Err(error) = self.refresher.liveness().await {
            warn!("liveness check failed: {error}");
            return Err(Error::Unreachable);
        }
        self.backoff.lock().await.record_success();
        self.rearm.notify_one();
        Ok(())
    }
}
