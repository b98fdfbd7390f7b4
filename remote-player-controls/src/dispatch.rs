use std::sync::Arc;

use remote_player_client::{
    client::Request,
    methods::{self, GoTo},
};
use remote_player_models::Backend;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::{
    broadcast::Broadcast,
    controls::{Command, ControlMessage},
    local::{LocalEngine, LocalEvent, LocalPlayer},
    notification::NotificationBroadcast,
    refresh::Refresher,
    store::{ApplicationUpdate, StateStore},
};

/// Routes commands to the backend they were submitted for.
pub struct Dispatcher<E: LocalEngine> {
    refresher: Arc<Refresher>,
    remote: Arc<StateStore>,
    local_store: Arc<StateStore>,
    local: LocalPlayer<E>,
    broadcast: Arc<Broadcast>,
    notifications: Arc<NotificationBroadcast>,
    available: watch::Receiver<bool>,
}

impl<E: LocalEngine> Dispatcher<E> {
    pub fn new(
        refresher: Arc<Refresher>,
        remote: Arc<StateStore>,
        local_store: Arc<StateStore>,
        local: LocalPlayer<E>,
        broadcast: Arc<Broadcast>,
        notifications: Arc<NotificationBroadcast>,
        available: watch::Receiver<bool>,
    ) -> Self {
        Self {
            refresher,
            remote,
            local_store,
            local,
            broadcast,
            notifications,
            available,
        }
    }

    /// Returns false once the loop should end.
    pub async fn handle(&mut self, message: ControlMessage) -> bool {
        match message {
            ControlMessage::Command { command, backend } => match backend {
                Backend::Remote => self.remote_command(command).await,
                Backend::Local => {
                    if let Err(error) = self.local.execute(command).await {
                        warn!("local command failed: {error}");
                        self.notifications.send_error(error.to_string());
                    }
                }
            },
            ControlMessage::SelectBackend(backend) => self.select_backend(backend).await,
            ControlMessage::Queue(items) => self.local.queue(items).await,
            ControlMessage::ClearQueue => self.local.clear_queue().await,
            ControlMessage::Quit => return false,
        }

        true
    }

    pub async fn handle_local_event(&mut self, event: LocalEvent) {
        if let Err(error) = self.local.handle_event(event).await {
            warn!("local event failed: {error}");
            self.notifications.send_error(error.to_string());
        }
    }

    /// Sends the command. Without push nobody reports the effect, so the
    /// state is pulled right after.
    #[instrument(skip(self))]
    pub async fn remote_command(&self, command: Command) {
        let request = self.remote_request(&command).await;

        if let Err(error) = self.refresher.rpc().call(request).await {
            warn!("{} failed: {error}", command.name());
        }

        if *self.available.borrow() {
            debug!("push available, leaving the update to the engine");
            return;
        }

        if let Err(error) = self.refresher.refresh().await {
            warn!("refresh after {} failed: {error}", command.name());
        }
    }

    pub async fn remote_request(&self, command: &Command) -> Request {
        let application = self.remote.application().await;
        let playback = self.remote.playback().await;
        let player_id = playback
            .player_id
            .unwrap_or_else(|| methods::default_player_id(application.media_kind));

        match command {
            Command::Play => methods::play_pause(player_id, true),
            Command::Pause => methods::play_pause(player_id, false),
            Command::PlayPause => {
                methods::play_pause(player_id, !(playback.playing && !playback.paused))
            }
            Command::Stop => methods::stop(player_id),
            Command::Next => methods::go_to(player_id, GoTo::Next),
            Command::Previous => methods::go_to(player_id, GoTo::Previous),
            Command::GoTo { index } => methods::go_to(player_id, GoTo::Index(*index)),
            Command::Seek { percentage } => methods::seek(player_id, *percentage),
            Command::SetVolume { volume } => methods::set_volume(*volume),
            Command::SetMute { muted } => methods::set_mute(*muted),
            Command::ToggleMute => methods::set_mute(!application.muted),
            Command::SetShuffle { shuffled } => methods::set_shuffle(player_id, *shuffled),
            Command::ToggleShuffle => methods::set_shuffle(player_id, !application.shuffled),
            Command::SetRepeat { mode } => methods::set_repeat(player_id, *mode),
            Command::CycleRepeat => methods::set_repeat(player_id, application.repeat.cycle()),
            Command::TogglePartyMode => methods::toggle_party_mode(player_id),
        }
    }

    /// Presents `backend` as current. Neither store is refreshed or reset.
    pub async fn select_backend(&self, backend: Backend) {
        for store in [&self.remote, &self.local_store] {
            store.set_current(store.backend() == backend);
            store
                .set_application(ApplicationUpdate::ActiveBackend(backend))
                .await;
        }

        if self.broadcast.select(backend) {
            debug!(%backend, "backend selected");
        }
        self.broadcast.state_changed(backend);
    }
}
