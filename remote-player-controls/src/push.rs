use std::sync::Arc;

use remote_player_client::{
    events::{Event, Library, Shutdown},
    push::{PushEvent, PushReceiver},
};
use remote_player_models::{Backend, PlayPhase};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::{
    broadcast::{Broadcast, ContentChange},
    input::InputEscalation,
    notification::NotificationBroadcast,
    progress::ProgressTimer,
    refresh::Refresher,
    store::{ApplicationUpdate, PlaybackUpdate, StateStore},
};

/// Applies pushed engine events to the remote store.
#[derive(Debug)]
pub struct PushChannel {
    store: Arc<StateStore>,
    broadcast: Arc<Broadcast>,
    notifications: Arc<NotificationBroadcast>,
    refresher: Arc<Refresher>,
    progress: Arc<ProgressTimer>,
    input: Arc<InputEscalation>,
    available: watch::Sender<bool>,
}

impl PushChannel {
    pub fn new(
        store: Arc<StateStore>,
        broadcast: Arc<Broadcast>,
        notifications: Arc<NotificationBroadcast>,
        refresher: Arc<Refresher>,
        progress: Arc<ProgressTimer>,
        input: Arc<InputEscalation>,
        available: watch::Sender<bool>,
    ) -> Self {
        Self {
            store,
            broadcast,
            notifications,
            refresher,
            progress,
            input,
            available,
        }
    }

    pub fn is_available(&self) -> bool {
        *self.available.borrow()
    }

    #[instrument(skip_all)]
    pub async fn run(self, mut events: PushReceiver) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }

        self.set_available(false);
    }

    pub async fn handle(&self, event: PushEvent) {
        match event {
            PushEvent::Opened => {
                info!("push channel available");
                self.set_available(true);
                self.refresher.schedule().await;
            }
            PushEvent::Error(error) => {
                debug!("push channel error: {error}");
                self.set_available(false);
            }
            PushEvent::Closed => {
                info!("push channel closed");
                self.set_available(false);
            }
            PushEvent::Event(event) => self.apply(event).await,
        }
    }

    fn set_available(&self, available: bool) {
        self.available.send_if_modified(|current| {
            let changed = *current != available;
            *current = available;
            changed
        });
    }

    pub async fn apply(&self, event: Event) {
        debug!(?event, "applying push event");

        match event {
            Event::PlaybackStarted { player_id } => {
                let mut updates = vec![
                    PlaybackUpdate::Playing(true),
                    PlaybackUpdate::Paused(false),
                    PlaybackUpdate::Phase(PlayPhase::Playing),
                ];
                if let Some(player_id) = player_id {
                    updates.push(PlaybackUpdate::PlayerId(Some(player_id)));
                }

                self.store.set_playback_many(updates).await;
                self.broadcast.state_changed(Backend::Remote);
                self.refresher.schedule().await;
            }
            Event::PlaybackStopped { ended } => {
                debug!(ended, "playback stopped");
                self.store
                    .set_playback_many([
                        PlaybackUpdate::Playing(false),
                        PlaybackUpdate::Paused(false),
                        PlaybackUpdate::Phase(PlayPhase::Idle),
                        PlaybackUpdate::Speed(0),
                    ])
                    .await;
                self.progress.stop().await;
                self.broadcast.state_changed(Backend::Remote);
                self.refresher.schedule().await;
            }
            Event::PlaybackPaused => {
                self.store
                    .set_playback_many([
                        PlaybackUpdate::Paused(true),
                        PlaybackUpdate::Phase(PlayPhase::Paused),
                        PlaybackUpdate::Speed(0),
                    ])
                    .await;
                self.progress.stop().await;
                self.broadcast.state_changed(Backend::Remote);
            }
            Event::PlaybackResumed => {
                let speed = self.store.playback().await.speed;
                self.store
                    .set_playback_many([
                        PlaybackUpdate::Paused(false),
                        PlaybackUpdate::Phase(PlayPhase::Playing),
                        PlaybackUpdate::Speed(if speed == 0 { 1 } else { speed }),
                    ])
                    .await;
                if self.store.is_playing().await {
                    self.progress.resume().await;
                }
                self.broadcast.state_changed(Backend::Remote);
            }
            Event::PropertyChanged => self.refresher.schedule().await,
            Event::Seek => {
                // The refresh restarts the timer from the new position.
                self.progress.stop().await;
                self.refresher.schedule().await;
            }
            Event::PlaylistChanged {
                playlist_id,
                change,
            } => {
                debug!(playlist_id, ?change, "playlist changed");
                self.broadcast
                    .content_changed(ContentChange::Playlist { id: playlist_id });
                self.refresher.schedule().await;
            }
            Event::VolumeChanged { volume, muted } => {
                let mut updates = vec![
                    ApplicationUpdate::Volume(volume),
                    ApplicationUpdate::Muted(muted),
                ];
                if volume > 0 {
                    updates.push(ApplicationUpdate::LastVolume(volume));
                }

                self.store.set_application_many(updates).await;
                self.broadcast.state_changed(Backend::Remote);
            }
            Event::ScanStarted { library } => {
                self.notifications
                    .send_info(format!("{} library scan started", library_name(library)));
                self.broadcast
                    .content_changed(ContentChange::Library { library });
            }
            Event::ScanFinished { library } => {
                self.notifications
                    .send_success(format!("{} library scan finished", library_name(library)));
                self.broadcast
                    .content_changed(ContentChange::Library { library });
            }
            Event::InputRequested { title, kind, .. } => {
                debug!(kind = kind.as_str(), "input dialog opened");
                self.input.requested(&title).await;
            }
            Event::InputFinished => self.input.finished().await,
            Event::ShuttingDown { reason } => {
                let message = match reason {
                    Shutdown::Quit => "The media engine is shutting down",
                    Shutdown::Restart => "The media engine is restarting",
                    Shutdown::Sleep => "The media engine is going to sleep",
                };
                self.notifications.send_warning(message.to_string());
            }
        }
    }
}

fn library_name(library: Library) -> &'static str {
    match library {
        Library::Audio => "Music",
        Library::Video => "Video",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        broadcast::Change,
        notification::Notification,
        testing::{ScriptedRpc, remote},
    };
    use remote_player_client::events::PlaylistChange;
    use remote_player_models::Time;

    fn channel(rpc: Arc<ScriptedRpc>) -> (PushChannel, crate::testing::Remote, watch::Receiver<bool>) {
        let remote = remote(rpc);
        let (available, receiver) = watch::channel(false);
        let channel = PushChannel::new(
            remote.store.clone(),
            remote.broadcast.clone(),
            remote.notifications.clone(),
            remote.refresher.clone(),
            remote.progress.clone(),
            Arc::new(InputEscalation::new(
                remote.notifications.clone(),
                Duration::from_secs(60),
            )),
            available,
        );
        (channel, remote, receiver)
    }

    #[tokio::test(start_paused = true)]
    async fn play_event_leads_to_refreshed_state() {
        let rpc = Arc::new(ScriptedRpc::playing(42));
        let (channel, remote, available) = channel(rpc.clone());

        channel.handle(PushEvent::Opened).await;
        assert!(*available.borrow());
        tokio::time::sleep(Duration::from_secs(1)).await;

        rpc.set_playing(Some(43));
        channel
            .handle(PushEvent::Event(
                Event::decode(r#"{"jsonrpc":"2.0","method":"Player.OnPlay"}"#).unwrap(),
            ))
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let playback = remote.store.playback().await;
        assert!(playback.playing);
        assert_eq!(playback.item.id, Some(43));
        assert!(playback.item_changed);
    }

    #[tokio::test(start_paused = true)]
    async fn play_after_connect_shows_new_item() {
        let rpc = Arc::new(ScriptedRpc::idle());
        let (channel, remote, _available) = channel(rpc.clone());

        channel.handle(PushEvent::Opened).await;
        rpc.set_playing(Some(42));
        channel
            .apply(Event::PlaybackStarted { player_id: Some(0) })
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let playback = remote.store.playback().await;
        assert!(playback.playing);
        assert_eq!(playback.item.id, Some(42));
        assert!(playback.item_changed);
        assert_eq!(rpc.batches(), 1);
    }

    #[tokio::test]
    async fn disconnect_marks_push_unavailable() {
        let (channel, _remote, available) = channel(Arc::new(ScriptedRpc::idle()));

        channel.handle(PushEvent::Opened).await;
        assert!(channel.is_available());
        channel.handle(PushEvent::Error("reset".to_string())).await;
        assert!(!*available.borrow());

        channel.handle(PushEvent::Opened).await;
        channel.handle(PushEvent::Closed).await;
        assert!(!channel.is_available());
    }

    #[tokio::test]
    async fn volume_event_is_idempotent() {
        let (channel, remote, _) = channel(Arc::new(ScriptedRpc::idle()));
        let event = Event::VolumeChanged {
            volume: 62,
            muted: true,
        };

        channel.apply(event.clone()).await;
        let once = remote.store.application().await;
        channel.apply(event).await;

        assert_eq!(remote.store.application().await, once);
        assert_eq!(once.volume, 62);
        assert_eq!(once.last_volume, 62);
        assert!(once.muted);
    }

    #[tokio::test]
    async fn pause_and_resume_are_idempotent() {
        let (channel, remote, _) = channel(Arc::new(ScriptedRpc::idle()));

        channel.apply(Event::PlaybackPaused).await;
        let once = remote.store.playback().await;
        channel.apply(Event::PlaybackPaused).await;
        assert_eq!(remote.store.playback().await, once);
        assert_eq!(once.phase, PlayPhase::Paused);

        channel.apply(Event::PlaybackResumed).await;
        let once = remote.store.playback().await;
        channel.apply(Event::PlaybackResumed).await;
        assert_eq!(remote.store.playback().await, once);
        assert_eq!(once.phase, PlayPhase::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resets_item_and_progress() {
        let rpc = Arc::new(ScriptedRpc::playing(42));
        let (channel, remote, _) = channel(rpc.clone());
        remote.refresher.refresh().await.unwrap();
        assert!(remote.progress.is_running().await);

        rpc.set_playing(None);
        channel
            .apply(Event::PlaybackStopped { ended: true })
            .await;

        let playback = remote.store.playback().await;
        assert!(!playback.playing);
        assert!(playback.item.is_empty());
        assert!(!remote.progress.is_running().await);
    }

    #[tokio::test]
    async fn playlist_event_announces_content() {
        let (channel, remote, _) = channel(Arc::new(ScriptedRpc::idle()));
        let mut changes = remote.broadcast.subscribe();

        channel
            .apply(Event::PlaylistChanged {
                playlist_id: 1,
                change: PlaylistChange::Add,
            })
            .await;

        assert_eq!(
            changes.recv().await,
            Some(Change::Content(ContentChange::Playlist { id: 1 }))
        );
        assert!(remote.refresher.is_scheduled().await);
    }

    #[tokio::test]
    async fn scans_are_reported() {
        let (channel, remote, _) = channel(Arc::new(ScriptedRpc::idle()));
        let mut notifications = remote.notifications.subscribe();
        let mut changes = remote.broadcast.subscribe();

        channel
            .apply(Event::ScanStarted {
                library: Library::Audio,
            })
            .await;
        channel
            .apply(Event::ScanFinished {
                library: Library::Audio,
            })
            .await;

        assert_eq!(
            notifications.recv().await.unwrap(),
            Notification::Info("Music library scan started".to_string())
        );
        assert_eq!(
            notifications.recv().await.unwrap(),
            Notification::Success("Music library scan finished".to_string())
        );
        for _ in 0..2 {
            assert_eq!(
                changes.recv().await,
                Some(Change::Content(ContentChange::Library {
                    library: Library::Audio
                }))
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn seek_restarts_progress_from_refreshed_position() {
        let rpc = Arc::new(ScriptedRpc::playing(42));
        let (channel, remote, _) = channel(rpc.clone());
        remote.refresher.refresh().await.unwrap();
        assert!(remote.progress.is_running().await);

        rpc.set_position(80);
        channel.apply(Event::Seek).await;
        assert!(!remote.progress.is_running().await);
        assert!(remote.refresher.is_scheduled().await);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            remote.store.playback().await.position,
            Time::from_seconds(80)
        );
        assert!(remote.progress.is_running().await);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let position = remote.store.playback().await.position;
        assert!(position >= Time::from_seconds(81));
        assert!(position < Time::from_seconds(82));
    }

    #[tokio::test(start_paused = true)]
    async fn property_change_schedules_one_refresh() {
        let rpc = Arc::new(ScriptedRpc::playing(42));
        let (channel, remote, _) = channel(rpc.clone());

        channel.apply(Event::PropertyChanged).await;
        assert!(remote.refresher.is_scheduled().await);
        channel.apply(Event::PropertyChanged).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(rpc.batches(), 1);
        assert!(remote.store.is_playing().await);
    }
}
