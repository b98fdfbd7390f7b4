use tokio::sync::broadcast::{self, Receiver, Sender};

/// User visible messages, shown as toasts by whatever front end listens.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Error(String),
    Warning(String),
    Success(String),
    Info(String),
}

#[derive(Debug)]
pub struct NotificationBroadcast {
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
}

impl NotificationBroadcast {
    pub fn new() -> Self {
        let (tx, rx) = broadcast::channel(20);
        Self { tx, rx }
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        self.rx.resubscribe()
    }

    pub fn send_error(&self, message: String) {
        self.send_message(Notification::Error(message));
    }

    pub fn send_warning(&self, message: String) {
        self.send_message(Notification::Warning(message));
    }

    pub fn send_success(&self, message: String) {
        self.send_message(Notification::Success(message));
    }

    pub fn send_info(&self, message: String) {
        self.send_message(Notification::Info(message));
    }

    pub fn send_message(&self, message: Notification) {
        // The held receiver keeps the channel open.
        _ = self.tx.send(message);
    }
}

impl Default for NotificationBroadcast {
    fn default() -> Self {
        Self::new()
    }
}
