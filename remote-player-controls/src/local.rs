use std::{sync::Arc, time::Duration};

use remote_player_models::{Backend, PlayPhase, PlayingItem, Time};
use tokio::sync::{
    RwLock,
    mpsc::{UnboundedReceiver, UnboundedSender},
};
use tracing::{debug, instrument, warn};

use crate::{
    Error, Result,
    broadcast::{Broadcast, ContentChange},
    controls::Command,
    notification::NotificationBroadcast,
    store::{ApplicationUpdate, PlaybackUpdate, StateStore},
    tracklist::Tracklist,
};

/// Lifecycle callbacks of a local engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEvent {
    Started { duration: Option<Duration> },
    Paused,
    Resumed,
    Stopped,
    Position {
        position: Duration,
        duration: Option<Duration>,
    },
    Finished,
    Failed(String),
}

pub type LocalEventSender = UnboundedSender<LocalEvent>;
pub type LocalEventReceiver = UnboundedReceiver<LocalEvent>;

/// Transport level controls of an in-process player. Implementations
/// report what actually happened through [`LocalEvent`]s.
pub trait LocalEngine {
    /// Replaces whatever is loaded and starts playing `item`.
    fn load(&mut self, item: &PlayingItem) -> Result<()>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position: Duration) -> Result<()>;
    /// 0-100
    fn set_volume(&mut self, volume: u8);
    fn position(&self) -> Duration;
}

const RESTART_THRESHOLD: Duration = Duration::from_secs(1);

pub struct LocalPlayer<E: LocalEngine> {
    engine: E,
    store: Arc<StateStore>,
    broadcast: Arc<Broadcast>,
    notifications: Arc<NotificationBroadcast>,
    tracklist: Arc<RwLock<Tracklist>>,
}

impl<E: LocalEngine> LocalPlayer<E> {
    pub fn new(
        engine: E,
        store: Arc<StateStore>,
        broadcast: Arc<Broadcast>,
        notifications: Arc<NotificationBroadcast>,
        tracklist: Arc<RwLock<Tracklist>>,
    ) -> Self {
        Self {
            engine,
            store,
            broadcast,
            notifications,
            tracklist,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn state_changed(&self) {
        self.broadcast.state_changed(Backend::Local);
    }

    #[instrument(skip(self))]
    pub async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Play => self.play().await?,
            Command::Pause => self.engine.pause(),
            Command::PlayPause => {
                let playback = self.store.playback().await;
                if playback.playing && !playback.paused {
                    self.engine.pause();
                } else {
                    self.play().await?;
                }
            }
            Command::Stop => self.engine.stop(),
            Command::Next => self.next().await?,
            Command::Previous => self.previous().await?,
            Command::GoTo { index } => {
                if !self.load(index as usize).await? {
                    return Err(Error::InvalidParams {
                        command: "GoTo".to_string(),
                        message: format!("no item at position {index}"),
                    });
                }
            }
            Command::Seek { percentage } => {
                let total = self.store.playback().await.total_time;
                let target = Time::from_mseconds(
                    (total.mseconds() as f64 * percentage / 100.0).round() as u64,
                );
                self.engine.seek(target.into())?;
                self.store
                    .set_playback_many([
                        PlaybackUpdate::Position(target),
                        PlaybackUpdate::Percentage(percentage),
                    ])
                    .await;
                self.state_changed();
            }
            Command::SetVolume { volume } => {
                self.engine.set_volume(volume);
                let mut updates = vec![
                    ApplicationUpdate::Volume(volume),
                    ApplicationUpdate::Muted(false),
                ];
                if volume > 0 {
                    updates.push(ApplicationUpdate::LastVolume(volume));
                }
                self.store.set_application_many(updates).await;
                self.state_changed();
            }
            Command::SetMute { muted } => self.set_mute(muted).await,
            Command::ToggleMute => {
                let muted = self.store.application().await.muted;
                self.set_mute(!muted).await;
            }
            Command::SetShuffle { shuffled } => {
                self.store
                    .set_application(ApplicationUpdate::Shuffled(shuffled))
                    .await;
                self.state_changed();
            }
            Command::ToggleShuffle => {
                let shuffled = self.store.application().await.shuffled;
                self.store
                    .set_application(ApplicationUpdate::Shuffled(!shuffled))
                    .await;
                self.state_changed();
            }
            Command::SetRepeat { mode } => {
                self.store
                    .set_application(ApplicationUpdate::Repeat(mode))
                    .await;
                self.state_changed();
            }
            Command::CycleRepeat => {
                let repeat = self.store.application().await.repeat;
                self.store
                    .set_application(ApplicationUpdate::Repeat(repeat.cycle()))
                    .await;
                self.state_changed();
            }
            Command::TogglePartyMode => {
                return Err(Error::Unsupported {
                    command: command.name().to_string(),
                    backend: Backend::Local,
                });
            }
        }

        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        if self.store.is_playing().await {
            self.engine.play();
            return Ok(());
        }

        let position = self
            .tracklist
            .read()
            .await
            .current_position()
            .unwrap_or_default();

        if !self.load(position).await? {
            debug!("nothing queued");
        }

        Ok(())
    }

    async fn set_mute(&mut self, muted: bool) {
        let application = self.store.application().await;

        if muted {
            self.engine.set_volume(0);
            self.store
                .set_application(ApplicationUpdate::Muted(true))
                .await;
        } else {
            let volume = if application.last_volume > 0 {
                application.last_volume
            } else {
                application.volume
            };
            self.engine.set_volume(volume);
            self.store
                .set_application_many([
                    ApplicationUpdate::Muted(false),
                    ApplicationUpdate::Volume(volume),
                ])
                .await;
        }

        self.state_changed();
    }

    async fn next(&mut self) -> Result<()> {
        let application = self.store.application().await;
        let next = self
            .tracklist
            .read()
            .await
            .next_position(application.repeat, application.shuffled);

        match next {
            Some(position) => {
                self.load(position).await?;
            }
            None => debug!("end of local queue"),
        }

        Ok(())
    }

    /// Restarts the current item unless it just started.
    async fn previous(&mut self) -> Result<()> {
        if self.store.is_playing().await && self.engine.position() > RESTART_THRESHOLD {
            self.engine.seek(Duration::ZERO)?;
            self.store
                .set_playback_many([
                    PlaybackUpdate::Position(Time::default()),
                    PlaybackUpdate::Percentage(0.0),
                ])
                .await;
            self.state_changed();
            return Ok(());
        }

        let repeat = self.store.application().await.repeat;
        let previous = self.tracklist.read().await.previous_position(repeat);

        if let Some(position) = previous {
            self.load(position).await?;
        }

        Ok(())
    }

    /// Loads the item at `position`. False when there is none.
    async fn load(&mut self, position: usize) -> Result<bool> {
        let item = {
            let mut tracklist = self.tracklist.write().await;
            match tracklist.skip_to(position) {
                Some(item) => item.clone(),
                None => return Ok(false),
            }
        };

        debug!(position, title = %item.title, "loading local item");
        self.engine.load(&item)?;

        self.store
            .set_playback_many([
                PlaybackUpdate::TotalTime(item.duration),
                PlaybackUpdate::Item(item),
                PlaybackUpdate::PlaylistIndex(position as u32),
                PlaybackUpdate::Position(Time::default()),
                PlaybackUpdate::Percentage(0.0),
            ])
            .await;
        self.state_changed();

        Ok(true)
    }

    pub async fn queue(&mut self, items: Vec<PlayingItem>) {
        self.tracklist.write().await.extend(items);
        self.broadcast.content_changed(ContentChange::LocalQueue);
    }

    pub async fn clear_queue(&mut self) {
        self.engine.stop();
        self.tracklist.write().await.clear();
        self.broadcast.content_changed(ContentChange::LocalQueue);
    }

    pub async fn handle_event(&mut self, event: LocalEvent) -> Result<()> {
        match event {
            LocalEvent::Started { duration } => {
                let mut updates = vec![
                    PlaybackUpdate::Playing(true),
                    PlaybackUpdate::Paused(false),
                    PlaybackUpdate::Phase(PlayPhase::Playing),
                    PlaybackUpdate::Speed(1),
                    PlaybackUpdate::CanSeek(true),
                    PlaybackUpdate::CanShuffle(true),
                    PlaybackUpdate::CanRepeat(true),
                ];
                if let Some(duration) = duration {
                    updates.push(PlaybackUpdate::TotalTime(duration.into()));
                }
                self.store.set_playback_many(updates).await;
            }
            LocalEvent::Paused => {
                self.store
                    .set_playback_many([
                        PlaybackUpdate::Paused(true),
                        PlaybackUpdate::Phase(PlayPhase::Paused),
                        PlaybackUpdate::Speed(0),
                    ])
                    .await;
            }
            LocalEvent::Resumed => {
                self.store
                    .set_playback_many([
                        PlaybackUpdate::Paused(false),
                        PlaybackUpdate::Phase(PlayPhase::Playing),
                        PlaybackUpdate::Speed(1),
                    ])
                    .await;
            }
            LocalEvent::Stopped => self.stopped().await,
            LocalEvent::Position { position, duration } => {
                let position = Time::from(position);
                let total = match duration {
                    Some(duration) => Time::from(duration),
                    None => self.store.playback().await.total_time,
                };
                self.store
                    .set_playback_many([
                        PlaybackUpdate::Position(position),
                        PlaybackUpdate::TotalTime(total),
                        PlaybackUpdate::Percentage(position.percentage_of(total)),
                    ])
                    .await;
            }
            LocalEvent::Finished => {
                let application = self.store.application().await;
                let next = self
                    .tracklist
                    .read()
                    .await
                    .finished_position(application.repeat, application.shuffled);

                match next {
                    Some(position) => {
                        self.load(position).await?;
                    }
                    None => {
                        self.engine.stop();
                        self.tracklist.write().await.reset();
                        self.stopped().await;
                    }
                }
            }
            LocalEvent::Failed(message) => {
                warn!("local playback failed: {message}");
                self.notifications.send_error(message);
                self.stopped().await;
            }
        }

        self.state_changed();
        Ok(())
    }

    async fn stopped(&self) {
        self.store
            .set_playback_many([
                PlaybackUpdate::Playing(false),
                PlaybackUpdate::Paused(false),
                PlaybackUpdate::Phase(PlayPhase::Idle),
                PlaybackUpdate::Speed(0),
                PlaybackUpdate::Position(Time::default()),
                PlaybackUpdate::Percentage(0.0),
            ])
            .await;
    }
}

impl<E: LocalEngine + std::fmt::Debug> std::fmt::Debug for LocalPlayer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPlayer")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
