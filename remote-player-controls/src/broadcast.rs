use remote_player_client::events::Library;
use remote_player_models::Backend;
use tokio::sync::{
    broadcast::{self, Receiver, Sender, error::RecvError},
    watch,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentChange {
    Playlist { id: i32 },
    Library { library: Library },
    LocalQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The store of `backend` was mutated.
    State { backend: Backend },
    Content(ContentChange),
}

impl Change {
    pub fn backend(&self) -> Option<Backend> {
        match self {
            Change::State { backend } => Some(*backend),
            Change::Content(ContentChange::LocalQueue) => Some(Backend::Local),
            Change::Content(_) => Some(Backend::Remote),
        }
    }
}

/// Fans state and content changes out to every subscriber. Also decides
/// which backend is presented as current.
#[derive(Debug)]
pub struct Broadcast {
    tx: Sender<Change>,
    rx: Receiver<Change>,
    current: watch::Sender<Backend>,
}

impl Broadcast {
    pub fn new() -> Self {
        let (tx, rx) = broadcast::channel(64);
        let (current, _) = watch::channel(Backend::default());
        Self { tx, rx, current }
    }

    pub fn send(&self, change: Change) {
        debug!(?change);
        // The held receiver keeps the channel open.
        _ = self.tx.send(change);
    }

    pub fn state_changed(&self, backend: Backend) {
        self.send(Change::State { backend });
    }

    pub fn content_changed(&self, content: ContentChange) {
        self.send(Change::Content(content));
    }

    /// Every change of every backend.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.rx.resubscribe(),
            scope: None,
        }
    }

    /// Only changes of one backend.
    pub fn subscribe_backend(&self, backend: Backend) -> Subscription {
        Subscription {
            rx: self.rx.resubscribe(),
            scope: Some(backend),
        }
    }

    pub fn current(&self) -> Backend {
        *self.current.borrow()
    }

    pub fn current_receiver(&self) -> watch::Receiver<Backend> {
        self.current.subscribe()
    }

    /// Marks `backend` as the presented one. Returns whether it changed.
    pub(crate) fn select(&self, backend: Backend) -> bool {
        self.current.send_if_modified(|current| {
            if *current == backend {
                false
            } else {
                *current = backend;
                true
            }
        })
    }
}

impl Default for Broadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<Change>,
    scope: Option<Backend>,
}

impl Subscription {
    /// Waits for the next change in scope. `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) => {
                    if self.scope.is_none() || change.backend() == self.scope {
                        return Some(change);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("subscriber lagged behind by {skipped} changes");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_subscription_skips_other_backends() {
        let broadcast = Broadcast::new();
        let mut local = broadcast.subscribe_backend(Backend::Local);
        let mut all = broadcast.subscribe();

        broadcast.state_changed(Backend::Remote);
        broadcast.content_changed(ContentChange::Playlist { id: 0 });
        broadcast.state_changed(Backend::Local);

        assert_eq!(
            local.recv().await,
            Some(Change::State {
                backend: Backend::Local
            })
        );
        assert_eq!(
            all.recv().await,
            Some(Change::State {
                backend: Backend::Remote
            })
        );
        assert_eq!(
            all.recv().await,
            Some(Change::Content(ContentChange::Playlist { id: 0 }))
        );
    }

    #[test]
    fn select_reports_changes_only() {
        let broadcast = Broadcast::new();
        assert_eq!(broadcast.current(), Backend::Remote);
        assert!(!broadcast.select(Backend::Remote));
        assert!(broadcast.select(Backend::Local));
        assert_eq!(broadcast.current(), Backend::Local);
    }
}
