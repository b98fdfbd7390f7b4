use std::sync::atomic::{AtomicBool, Ordering};

use remote_player_models::{
    ApplicationState, Backend, EngineVersion, MediaKind, PlayPhase, PlaybackState, PlayingItem,
    RepeatMode, Snapshot, Time,
};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationUpdate {
    ActiveBackend(Backend),
    Volume(u8),
    Muted(bool),
    LastVolume(u8),
    Shuffled(bool),
    Repeat(RepeatMode),
    MediaKind(MediaKind),
    Version(EngineVersion),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUpdate {
    /// Stopping also drops the current item.
    Playing(bool),
    Paused(bool),
    Phase(PlayPhase),
    /// Raises the item changed flag when the item differs from the current one.
    Item(PlayingItem),
    Position(Time),
    TotalTime(Time),
    Percentage(f64),
    PlaylistIndex(u32),
    Speed(i32),
    CanSeek(bool),
    CanShuffle(bool),
    CanRepeat(bool),
    PartyMode(bool),
    PlayerId(Option<i32>),
}

/// Application and playback state of one backend.
///
/// Setters never broadcast, so callers can apply several updates and
/// announce them once.
#[derive(Debug)]
pub struct StateStore {
    backend: Backend,
    current: AtomicBool,
    application: RwLock<ApplicationState>,
    playback: RwLock<PlaybackState>,
}

impl StateStore {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            current: AtomicBool::new(backend == Backend::default()),
            application: RwLock::new(ApplicationState::default()),
            playback: RwLock::new(PlaybackState::default()),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Whether this backend is the one presented to the user.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Relaxed)
    }

    pub(crate) fn set_current(&self, current: bool) {
        self.current.store(current, Ordering::Relaxed);
    }

    pub async fn application(&self) -> ApplicationState {
        self.application.read().await.clone()
    }

    pub async fn playback(&self) -> PlaybackState {
        self.playback.read().await.clone()
    }

    pub async fn is_playing(&self) -> bool {
        self.playback.read().await.playing
    }

    pub async fn is_item_changed(&self) -> bool {
        self.playback.read().await.item_changed
    }

    /// Reads the item changed flag and lowers it.
    pub async fn take_item_changed(&self) -> bool {
        let mut playback = self.playback.write().await;
        std::mem::take(&mut playback.item_changed)
    }

    pub async fn set_application(&self, update: ApplicationUpdate) {
        let mut application = self.application.write().await;
        apply_application(&mut application, update);
    }

    pub async fn set_application_many(&self, updates: impl IntoIterator<Item = ApplicationUpdate>) {
        let mut application = self.application.write().await;
        for update in updates {
            apply_application(&mut application, update);
        }
    }

    pub async fn set_playback(&self, update: PlaybackUpdate) {
        let mut playback = self.playback.write().await;
        apply_playback(&mut playback, update);
    }

    pub async fn set_playback_many(&self, updates: impl IntoIterator<Item = PlaybackUpdate>) {
        let mut playback = self.playback.write().await;
        for update in updates {
            apply_playback(&mut playback, update);
        }
    }

    /// Applies `updates` only if `valid` still holds once the write lock is
    /// taken. Returns whether anything was written.
    pub(crate) async fn set_playback_if(
        &self,
        valid: impl FnOnce() -> bool,
        updates: impl IntoIterator<Item = PlaybackUpdate>,
    ) -> bool {
        let mut playback = self.playback.write().await;
        if !valid() {
            return false;
        }
        for update in updates {
            apply_playback(&mut playback, update);
        }
        true
    }

    #[cfg(test)]
    pub(crate) async fn lock_playback(&self) -> tokio::sync::RwLockWriteGuard<'_, PlaybackState> {
        self.playback.write().await
    }

    /// Replaces everything a refresh reports. Fields only this client knows
    /// about (active backend, last volume) are kept.
    pub async fn apply_snapshot(&self, snapshot: Snapshot) {
        let mut application = self.application.write().await;
        let mut playback = self.playback.write().await;

        application.volume = snapshot.volume;
        application.muted = snapshot.muted;
        if snapshot.volume > 0 {
            application.last_volume = snapshot.volume;
        }
        application.version = snapshot.version;

        let next = match snapshot.player {
            Some(player) => {
                application.shuffled = player.shuffled;
                application.repeat = player.repeat;
                application.media_kind = player.media_kind;

                let paused = player.speed == 0;

                PlaybackState {
                    playing: true,
                    paused,
                    phase: if paused {
                        PlayPhase::Paused
                    } else {
                        PlayPhase::Playing
                    },
                    item_changed: !playback.item.same_item(&player.item),
                    item: player.item,
                    position: player.position,
                    total_time: player.total_time,
                    percentage: player.percentage,
                    playlist_index: player.playlist_index,
                    speed: player.speed,
                    can_seek: player.can_seek,
                    can_shuffle: player.can_shuffle,
                    can_repeat: player.can_repeat,
                    party_mode: player.party_mode,
                    player_id: Some(player.player_id),
                }
            }
            None => {
                let defaults = ApplicationState::default();
                application.shuffled = defaults.shuffled;
                application.repeat = defaults.repeat;
                application.media_kind = defaults.media_kind;

                PlaybackState {
                    item_changed: !playback.item.same_item(&PlayingItem::empty()),
                    ..Default::default()
                }
            }
        };

        if next.item_changed {
            debug!(backend = %self.backend, title = %next.item.title, "item changed");
        }

        *playback = next;
    }
}

fn apply_application(application: &mut ApplicationState, update: ApplicationUpdate) {
    match update {
        ApplicationUpdate::ActiveBackend(backend) => application.active_backend = backend,
        ApplicationUpdate::Volume(volume) => application.volume = volume.min(100),
        ApplicationUpdate::Muted(muted) => application.muted = muted,
        ApplicationUpdate::LastVolume(volume) => application.last_volume = volume.min(100),
        ApplicationUpdate::Shuffled(shuffled) => application.shuffled = shuffled,
        ApplicationUpdate::Repeat(repeat) => application.repeat = repeat,
        ApplicationUpdate::MediaKind(kind) => application.media_kind = kind,
        ApplicationUpdate::Version(version) => application.version = version,
    }
}

fn apply_playback(playback: &mut PlaybackState, update: PlaybackUpdate) {
    match update {
        PlaybackUpdate::Playing(playing) => {
            playback.playing = playing;
            if !playing && !playback.item.is_empty() {
                playback.item = PlayingItem::empty();
                playback.item_changed = true;
            }
        }
        PlaybackUpdate::Paused(paused) => playback.paused = paused,
        PlaybackUpdate::Phase(phase) => playback.phase = phase,
        PlaybackUpdate::Item(item) => {
            if !playback.item.same_item(&item) {
                playback.item_changed = true;
            }
            playback.item = item;
        }
        PlaybackUpdate::Position(position) => playback.position = position,
        PlaybackUpdate::TotalTime(total) => playback.total_time = total,
        PlaybackUpdate::Percentage(percentage) => {
            playback.percentage = percentage.clamp(0.0, 100.0)
        }
        PlaybackUpdate::PlaylistIndex(index) => playback.playlist_index = index,
        PlaybackUpdate::Speed(speed) => playback.speed = speed,
        PlaybackUpdate::CanSeek(can_seek) => playback.can_seek = can_seek,
        PlaybackUpdate::CanShuffle(can_shuffle) => playback.can_shuffle = can_shuffle,
        PlaybackUpdate::CanRepeat(can_repeat) => playback.can_repeat = can_repeat,
        PlaybackUpdate::PartyMode(party_mode) => playback.party_mode = party_mode,
        PlaybackUpdate::PlayerId(player_id) => playback.player_id = player_id,
    }
}
