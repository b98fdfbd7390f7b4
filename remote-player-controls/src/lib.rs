use std::sync::Arc;

use remote_player_client::{client::RpcTransport, push::PushReceiver};
use remote_player_models::Backend;
use tokio::{
    select,
    sync::{
        RwLock,
        mpsc::{self, UnboundedReceiver},
        watch,
    },
    task::JoinHandle,
};
use tracing::{info, instrument, warn};

use crate::{
    broadcast::Broadcast,
    config::Configuration,
    controls::{ControlMessage, Controls},
    dispatch::Dispatcher,
    input::InputEscalation,
    local::{LocalEngine, LocalEventReceiver, LocalPlayer},
    notification::NotificationBroadcast,
    poll::{PollHandle, Poller},
    progress::ProgressTimer,
    push::PushChannel,
    refresh::Refresher,
    store::StateStore,
    tracklist::Tracklist,
};

pub use error::Error;

pub mod broadcast;
pub mod config;
pub mod controls;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod local;
pub mod notification;
pub mod poll;
pub mod progress;
pub mod push;
pub mod refresh;
pub mod sink;
pub mod store;
pub mod tracklist;

#[cfg(test)]
mod testing;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Both backends, their channels and the loop that executes commands.
pub struct Player<E: LocalEngine> {
    broadcast: Arc<Broadcast>,
    notifications: Arc<NotificationBroadcast>,
    remote: Arc<StateStore>,
    local: Arc<StateStore>,
    refresher: Arc<Refresher>,
    progress: Arc<ProgressTimer>,
    input: Arc<InputEscalation>,
    tracklist: Arc<RwLock<Tracklist>>,
    available_tx: watch::Sender<bool>,
    available: watch::Receiver<bool>,
    poller: Option<Poller>,
    poll_handle: PollHandle,
    dispatcher: Dispatcher<E>,
    controls: Controls,
    controls_rx: UnboundedReceiver<ControlMessage>,
    local_events: LocalEventReceiver,
}

impl<E: LocalEngine> Player<E> {
    pub fn new(
        configuration: &Configuration,
        rpc: Arc<dyn RpcTransport>,
        engine: E,
        local_events: LocalEventReceiver,
    ) -> Self {
        let broadcast = Arc::new(Broadcast::new());
        let notifications = Arc::new(NotificationBroadcast::new());
        let remote = Arc::new(StateStore::new(Backend::Remote));
        let local = Arc::new(StateStore::new(Backend::Local));
        let tracklist = Arc::new(RwLock::new(Tracklist::new()));

        let progress = Arc::new(ProgressTimer::new(remote.clone(), broadcast.clone()));
        let refresher = Arc::new(Refresher::new(
            rpc,
            remote.clone(),
            broadcast.clone(),
            progress.clone(),
            configuration.refresh_debounce,
        ));
        let input = Arc::new(InputEscalation::new(
            notifications.clone(),
            configuration.input_timeout,
        ));

        let (available_tx, available) = watch::channel(false);
        let (poller, poll_handle) = Poller::new(
            refresher.clone(),
            notifications.clone(),
            available.clone(),
            configuration.poll_interval,
            configuration.max_failures,
        );

        let local_player = LocalPlayer::new(
            engine,
            local.clone(),
            broadcast.clone(),
            notifications.clone(),
            tracklist.clone(),
        );
        let dispatcher = Dispatcher::new(
            refresher.clone(),
            remote.clone(),
            local.clone(),
            local_player,
            broadcast.clone(),
            notifications.clone(),
            available.clone(),
        );

        let (tx, controls_rx) = mpsc::unbounded_channel();
        let controls = Controls::new(tx, broadcast.current_receiver());

        Self {
            broadcast,
            notifications,
            remote,
            local,
            refresher,
            progress,
            input,
            tracklist,
            available_tx,
            available,
            poller: Some(poller),
            poll_handle,
            dispatcher,
            controls,
            controls_rx,
            local_events,
        }
    }

    pub fn controls(&self) -> Controls {
        self.controls.clone()
    }

    pub fn broadcast(&self) -> Arc<Broadcast> {
        self.broadcast.clone()
    }

    pub fn notifications(&self) -> Arc<NotificationBroadcast> {
        self.notifications.clone()
    }

    pub fn state(&self, backend: Backend) -> Arc<StateStore> {
        match backend {
            Backend::Remote => self.remote.clone(),
            Backend::Local => self.local.clone(),
        }
    }

    /// The store of the backend currently presented.
    pub fn current_state(&self) -> Arc<StateStore> {
        self.state(self.broadcast.current())
    }

    pub fn poll_handle(&self) -> PollHandle {
        self.poll_handle.clone()
    }

    pub fn push_available(&self) -> watch::Receiver<bool> {
        self.available.clone()
    }

    pub fn refresher(&self) -> Arc<Refresher> {
        self.refresher.clone()
    }

    pub async fn tracklist(&self) -> Tracklist {
        self.tracklist.read().await.clone()
    }

    /// Starts push and polling, then executes commands until quit. Runs on
    /// the calling task since the local engine may not be `Send`.
    #[instrument(skip_all)]
    pub async fn player_loop(&mut self, push: Option<PushReceiver>) -> Result<()> {
        let mut tasks: Vec<JoinHandle<()>> = vec![];

        if let Some(events) = push {
            let channel = PushChannel::new(
                self.remote.clone(),
                self.broadcast.clone(),
                self.notifications.clone(),
                self.refresher.clone(),
                self.progress.clone(),
                self.input.clone(),
                self.available_tx.clone(),
            );
            tasks.push(tokio::spawn(channel.run(events)));
        } else {
            info!("push disabled, polling only");
        }

        if let Some(poller) = self.poller.take() {
            tasks.push(tokio::spawn(poller.run()));
        }

        if let Err(error) = self.refresher.refresh().await {
            warn!("initial refresh failed: {error}");
        }

        loop {
            select! {
                message = self.controls_rx.recv() => {
                    let keep_running = match message {
                        Some(message) => self.dispatcher.handle(message).await,
                        None => false,
                    };
                    if !keep_running {
                        break;
                    }
                }

                Some(event) = self.local_events.recv() => {
                    self.dispatcher.handle_local_event(event).await;
                }
            }
        }

        info!("player loop stopped");
        self.progress.stop().await;
        self.input.finished().await;
        for task in tasks {
            task.abort();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        broadcast::{Change, ContentChange},
        testing::{RecordingEngine, ScriptedRpc},
    };
    use remote_player_client::{events::Event, push::PushEvent};
    use remote_player_models::PlayingItem;
    use serde_json::Value;

    fn player(rpc: Arc<ScriptedRpc>) -> Player<RecordingEngine> {
        let (events_tx, events) = mpsc::unbounded_channel();
        Player::new(
            &Configuration::default(),
            rpc,
            RecordingEngine::new(events_tx),
            events,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn push_play_converges_to_refreshed_state() {
        let rpc = Arc::new(ScriptedRpc::idle());
        let mut player = player(rpc.clone());
        let remote = player.state(Backend::Remote);
        let controls = player.controls();
        let (push_tx, push_rx) = mpsc::unbounded_channel();

        let driver = async {
            push_tx.send(PushEvent::Opened).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;

            rpc.set_playing(Some(42));
            push_tx
                .send(PushEvent::Event(Event::PlaybackStarted { player_id: None }))
                .unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;

            controls.quit().unwrap();
        };

        let (result, ()) = tokio::join!(player.player_loop(Some(push_rx)), driver);
        result.unwrap();

        let playback = remote.playback().await;
        assert!(playback.playing);
        assert_eq!(playback.item.id, Some(42));
        assert!(playback.item_changed);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_reach_both_backends() {
        let rpc = Arc::new(ScriptedRpc::playing(3));
        let mut player = player(rpc.clone());
        let controls = player.controls();
        let local = player.state(Backend::Local);
        let mut changes = player.broadcast().subscribe_backend(Backend::Local);

        let driver = async {
            controls.submit("Pause", Value::Null, Backend::Remote).unwrap();
            controls
                .queue(vec![PlayingItem {
                    id: Some(1),
                    file: Some("/music/one.flac".to_string()),
                    ..Default::default()
                }])
                .unwrap();
            controls.select_backend(Backend::Local).unwrap();
            controls.submit("Play", Value::Null, Backend::Local).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            controls.quit().unwrap();
        };

        let (result, ()) = tokio::join!(player.player_loop(None), driver);
        result.unwrap();

        assert!(rpc.methods().contains(&"Player.PlayPause".to_string()));
        assert!(local.is_current());
        assert!(local.is_playing().await);
        assert_eq!(local.playback().await.item.id, Some(1));
        assert!(changes.recv().await.is_some());
        assert_eq!(player.controls().current_backend(), Backend::Local);
        assert_eq!(player.tracklist().await.total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_the_queue_empties_the_tracklist() {
        let mut player = player(Arc::new(ScriptedRpc::idle()));
        let controls = player.controls();
        let mut changes = player.broadcast().subscribe();

        let driver = async {
            controls
                .queue(vec![PlayingItem {
                    file: Some("/music/one.flac".to_string()),
                    ..Default::default()
                }])
                .unwrap();
            controls.clear_queue().unwrap();
            controls.quit().unwrap();
        };

        let (result, ()) = tokio::join!(player.player_loop(None), driver);
        result.unwrap();

        assert!(player.tracklist().await.is_empty());
        let mut queue_changes = 0;
        while let Ok(Some(change)) =
            tokio::time::timeout(Duration::from_millis(10), changes.recv()).await
        {
            if change == Change::Content(ContentChange::LocalQueue) {
                queue_changes += 1;
            }
        }
        assert_eq!(queue_changes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_takes_over_without_push() {
        let rpc = Arc::new(ScriptedRpc::idle());
        let mut player = player(rpc.clone());
        let controls = player.controls();
        let mut changes = player.broadcast().subscribe();

        let driver = async {
            rpc.set_playing(Some(7));
            tokio::time::sleep(Duration::from_millis(10_500)).await;
            controls.quit().unwrap();
        };

        let (result, ()) = tokio::join!(player.player_loop(None), driver);
        result.unwrap();

        assert_eq!(rpc.batches(), 2);
        assert_eq!(player.state(Backend::Remote).playback().await.item.id, Some(7));
        assert!(matches!(
            changes.recv().await,
            Some(Change::State {
                backend: Backend::Remote
            })
        ));
    }
}
