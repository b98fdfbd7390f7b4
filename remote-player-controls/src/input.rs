use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};

use crate::notification::NotificationBroadcast;

/// Tracks a modal input dialog open on the engine. If nobody answers it
/// within the timeout, one warning is sent.
#[derive(Debug)]
pub struct InputEscalation {
    notifications: Arc<NotificationBroadcast>,
    timeout: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl InputEscalation {
    pub fn new(notifications: Arc<NotificationBroadcast>, timeout: Duration) -> Self {
        Self {
            notifications,
            timeout,
            pending: Default::default(),
        }
    }

    pub async fn requested(&self, title: &str) {
        let mut pending = self.pending.lock().await;
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        debug!(title, "input requested");
        let title = if title.is_empty() {
            "The media engine".to_string()
        } else {
            format!("\"{title}\"")
        };
        self.notifications
            .send_info(format!("{title} is waiting for input"));

        let notifications = self.notifications.clone();
        let timeout = self.timeout;

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("input request unanswered after {timeout:?}");
            notifications.send_warning(format!(
                "{title} is still waiting for input on the engine"
            ));
        }));
    }

    pub async fn finished(&self) {
        if let Some(pending) = self.pending.lock().await.take() {
            debug!("input finished");
            pending.abort();
        }
    }

    pub async fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Notification;

    fn escalation() -> (InputEscalation, tokio::sync::broadcast::Receiver<Notification>) {
        let notifications = Arc::new(NotificationBroadcast::new());
        let receiver = notifications.subscribe();
        (
            InputEscalation::new(notifications, Duration::from_secs(60)),
            receiver,
        )
    }

    fn warnings(receiver: &mut tokio::sync::broadcast::Receiver<Notification>) -> usize {
        let mut count = 0;
        while let Ok(notification) = receiver.try_recv() {
            if matches!(notification, Notification::Warning(_)) {
                count += 1;
            }
        }
        count
    }

    #[tokio::test(start_paused = true)]
    async fn escalates_once_after_timeout() {
        let (escalation, mut receiver) = escalation();

        escalation.requested("Search").await;
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(warnings(&mut receiver), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(warnings(&mut receiver), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(warnings(&mut receiver), 0);
        assert!(!escalation.is_pending().await);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_cancels_escalation() {
        let (escalation, mut receiver) = escalation();

        escalation.requested("Search").await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        escalation.finished().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(warnings(&mut receiver), 0);
        assert!(!escalation.is_pending().await);
    }
}
