use std::time::Duration;

use futures::StreamExt;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, info, warn};

use crate::{Error, events::Event};

/// Lifecycle of the push connection plus every decoded event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Opened,
    Event(Event),
    Error(String),
    Closed,
}

pub type PushReceiver = UnboundedReceiver<PushEvent>;

#[derive(Debug, Clone)]
pub struct PushClient {
    url: String,
    reconnect: Duration,
}

impl PushClient {
    pub fn new(host: &str, port: u16, reconnect: Duration) -> Self {
        Self {
            url: format!("ws://{host}:{port}/jsonrpc"),
            reconnect,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Keeps a connection open until the receiver is dropped, reconnecting
    /// after every close or failed attempt.
    pub fn spawn(self) -> (PushReceiver, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move { self.run(tx).await });
        (rx, handle)
    }

    async fn run(self, tx: UnboundedSender<PushEvent>) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => {
                    info!("push connection open at {}", self.url);
                    if tx.send(PushEvent::Opened).is_err() {
                        return;
                    }

                    let (_, mut read) = stream.split();

                    while let Some(message) = read.next().await {
                        match frame(message) {
                            Frame::Event(event) => {
                                if tx.send(PushEvent::Event(event)).is_err() {
                                    return;
                                }
                            }
                            Frame::Skip => {}
                            Frame::Close => break,
                            Frame::Failed(error) => {
                                if tx.send(PushEvent::Error(error)).is_err() {
                                    return;
                                }
                                break;
                            }
                        }
                    }

                    if tx.send(PushEvent::Closed).is_err() {
                        return;
                    }
                }
                Err(error) => {
                    debug!("push connection to {} failed: {error}", self.url);
                    if tx.send(PushEvent::Error(error.to_string())).is_err() {
                        return;
                    }
                }
            }

            if tx.is_closed() {
                return;
            }

            tokio::time::sleep(self.reconnect).await;
        }
    }
}

/// Outcome of one websocket frame.
#[derive(Debug, PartialEq)]
enum Frame {
    Event(Event),
    /// Not an event this client understands. The connection stays open.
    Skip,
    Close,
    Failed(String),
}

fn frame(message: Result<Message, WsError>) -> Frame {
    match message {
        Ok(Message::Text(text)) => match Event::decode(&text) {
            Ok(event) => {
                debug!(?event);
                Frame::Event(event)
            }
            Err(error @ Error::UnknownEvent { .. }) => {
                debug!("ignoring push message: {error}");
                Frame::Skip
            }
            Err(error) => {
                warn!("ignoring push message: {error}");
                Frame::Skip
            }
        },
        Ok(Message::Close(_)) => Frame::Close,
        Ok(_) => Frame::Skip,
        Err(error) => Frame::Failed(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_from_host_and_port() {
        let client = PushClient::new("192.168.1.10", 9090, Duration::from_secs(5));
        assert_eq!(client.url(), "ws://192.168.1.10:9090/jsonrpc");
    }

    #[test]
    fn bad_frames_keep_the_connection() {
        let text = |body: &str| Ok(Message::Text(body.to_string()));

        assert_eq!(frame(text("not json")), Frame::Skip);
        assert_eq!(
            frame(text(r#"{"jsonrpc":"2.0","method":"GUI.OnScreensaverActivated"}"#)),
            Frame::Skip
        );
        assert_eq!(
            frame(text(r#"{"method":"Application.OnVolumeChanged","params":{"data":{}}}"#)),
            Frame::Skip
        );
        assert_eq!(frame(Ok(Message::Ping(vec![1]))), Frame::Skip);
        assert_eq!(
            frame(text(r#"{"jsonrpc":"2.0","method":"Player.OnPause"}"#)),
            Frame::Event(Event::PlaybackPaused)
        );
    }

    #[test]
    fn close_and_errors_end_the_connection() {
        assert_eq!(frame(Ok(Message::Close(None))), Frame::Close);
        assert!(matches!(
            frame(Err(WsError::ConnectionClosed)),
            Frame::Failed(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_engine_reports_errors() {
        let client = PushClient::new("127.0.0.1", 1, Duration::from_millis(10));
        let (mut rx, handle) = client.spawn();

        let first = rx.recv().await;
        assert!(matches!(first, Some(PushEvent::Error(_))));

        drop(rx);
        handle.abort();
    }
}
