use std::{sync::Arc, time::Duration};

use remote_player_client::{client::RpcTransport, methods};
use remote_player_models::Backend;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, instrument, warn};

use crate::{Result, broadcast::Broadcast, progress::ProgressTimer, store::StateStore};

/// Pulls the full remote state in one batch and replaces the remote store
/// with it.
#[derive(Debug)]
pub struct Refresher {
    rpc: Arc<dyn RpcTransport>,
    store: Arc<StateStore>,
    broadcast: Arc<Broadcast>,
    progress: Arc<ProgressTimer>,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Refresher {
    pub fn new(
        rpc: Arc<dyn RpcTransport>,
        store: Arc<StateStore>,
        broadcast: Arc<Broadcast>,
        progress: Arc<ProgressTimer>,
        debounce: Duration,
    ) -> Self {
        Self {
            rpc,
            store,
            broadcast,
            progress,
            debounce,
            pending: Default::default(),
        }
    }

    pub fn rpc(&self) -> &Arc<dyn RpcTransport> {
        &self.rpc
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let responses = self.rpc.batch(methods::full_state()).await?;
        let snapshot = methods::decode_full_state(responses)?;
        let moving = snapshot
            .player
            .as_ref()
            .filter(|player| player.speed != 0)
            .map(|player| (player.position, player.total_time, player.speed));

        self.progress.stop().await;
        self.store.apply_snapshot(snapshot).await;
        if let Some((position, total, speed)) = moving {
            self.progress.start(position, total, speed).await;
        }
        self.broadcast.state_changed(Backend::Remote);

        Ok(())
    }

    /// Cheap round trip used to find out whether the engine answers at all.
    pub async fn liveness(&self) -> Result<()> {
        self.rpc.call(methods::ping()).await?;
        Ok(())
    }

    /// Refreshes after the debounce delay. A newer call replaces a pending one.
    pub async fn schedule(self: &Arc<Self>) {
        let mut pending = self.pending.lock().await;
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let refresher = self.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(refresher.debounce).await;
            debug!("running scheduled refresh");
            if let Err(error) = refresher.refresh().await {
                warn!("scheduled refresh failed: {error}");
                refresher.progress.reseed().await;
            }
        }));
    }

    pub async fn is_scheduled(&self) -> bool {
        self.pending
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
