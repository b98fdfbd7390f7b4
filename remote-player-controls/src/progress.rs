use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use remote_player_models::{Backend, Time};
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use tracing::debug;

use crate::{
    broadcast::Broadcast,
    store::{PlaybackUpdate, StateStore},
};

/// Position reported by the last refresh, moved forward with wall time.
#[derive(Debug, Clone, Copy)]
struct Timer {
    started: Instant,
    position: Time,
    total: Time,
    speed: i32,
}

impl Timer {
    fn new(position: Time, total: Time, speed: i32) -> Self {
        Self {
            started: Instant::now(),
            position,
            total,
            speed,
        }
    }

    fn elapsed(&self) -> Time {
        let wall = self.started.elapsed().as_millis() as i64;
        let played = self.position.mseconds() as i64 + wall * self.speed as i64;
        let played = Time::from_mseconds(played.max(0) as u64);

        if self.total > Time::default() {
            played.min(self.total)
        } else {
            played
        }
    }

    fn finished(&self, position: Time) -> bool {
        self.total > Time::default() && position >= self.total
    }
}

/// Moves the remote position forward between refreshes.
///
/// Every start and stop bumps the generation. A tick only writes while its
/// generation is current, so a tick that waited on the store lock cannot
/// overwrite a newer refresh.
#[derive(Debug)]
pub struct ProgressTimer {
    store: Arc<StateStore>,
    broadcast: Arc<Broadcast>,
    tick: Duration,
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressTimer {
    pub fn new(store: Arc<StateStore>, broadcast: Arc<Broadcast>) -> Self {
        Self::with_tick(store, broadcast, Duration::from_secs(1))
    }

    pub fn with_tick(store: Arc<StateStore>, broadcast: Arc<Broadcast>, tick: Duration) -> Self {
        Self {
            store,
            broadcast,
            tick,
            generation: Default::default(),
            task: Default::default(),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = task.take() {
            task.abort();
        }
    }

    pub async fn start(&self, position: Time, total: Time, speed: i32) {
        let mut task = self.task.lock().await;
        let current = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        if speed == 0 {
            return;
        }

        debug!(%position, %total, speed, "progress timer started");

        let timer = Timer::new(position, total, speed);
        let store = self.store.clone();
        let broadcast = self.broadcast.clone();
        let generation = self.generation.clone();
        let tick = self.tick;

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);

            loop {
                interval.tick().await;

                let position = timer.elapsed();
                let written = store
                    .set_playback_if(
                        || generation.load(Ordering::SeqCst) == current,
                        [
                            PlaybackUpdate::Position(position),
                            PlaybackUpdate::Percentage(position.percentage_of(timer.total)),
                        ],
                    )
                    .await;
                if !written {
                    break;
                }
                broadcast.state_changed(Backend::Remote);

                if timer.finished(position) {
                    break;
                }
            }
        }));
    }

    /// Runs while the store says the player is moving, stops otherwise.
    pub async fn reseed(&self) {
        let playback = self.store.playback().await;

        if playback.playing && !playback.paused && playback.speed != 0 {
            self.start(playback.position, playback.total_time, playback.speed)
                .await;
        } else {
            self.stop().await;
        }
    }

    /// Continues from the stored position at normal speed.
    pub async fn resume(&self) {
        let playback = self.store.playback().await;
        let speed = if playback.speed == 0 { 1 } else { playback.speed };
        self.start(playback.position, playback.total_time, speed)
            .await;
    }
}
