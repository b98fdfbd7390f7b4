use std::{path::Path, sync::Arc};

use remote_player_controls::{
    broadcast::{Broadcast, Change},
    controls::{Controls, parse_backend},
    notification::{Notification, NotificationBroadcast},
    poll::PollHandle,
    store::StateStore,
};
use remote_player_models::{Backend, PlayingItem};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{StreamExt as _, wrappers::BroadcastStream};
use tracing::warn;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Command {
        name: String,
        params: Value,
        backend: Option<String>,
    },
    Backend(String),
    Ping,
    State,
    Queue(Vec<String>),
    ClearQueue,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> Result<Line, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Line::Empty);
    }
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match head {
        "quit" | "exit" => Ok(Line::Quit),
        "ping" => Ok(Line::Ping),
        "state" => Ok(Line::State),
        "clear" => Ok(Line::ClearQueue),
        "backend" if !rest.is_empty() => Ok(Line::Backend(rest.to_string())),
        "backend" => Err("usage: backend <remote|local>".to_string()),
        "queue" => {
            let locations: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
            if locations.is_empty() {
                Err("usage: queue <path-or-url>...".to_string())
            } else {
                Ok(Line::Queue(locations))
            }
        }
        name => {
            let (params, last) = rest.rsplit_once(char::is_whitespace).unwrap_or(("", rest));
            let (params, backend) = match last.strip_prefix('@') {
                Some(backend) => (params.trim(), Some(backend.to_string())),
                None => (rest, None),
            };

            let params = if params.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(params).map_err(|error| format!("invalid json: {error}"))?
            };

            Ok(Line::Command {
                name: name.to_string(),
                params,
                backend,
            })
        }
    }
}

fn queue_item(location: &str) -> PlayingItem {
    let title = Path::new(location)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| location.to_string());

    PlayingItem {
        title,
        file: Some(location.to_string()),
        ..Default::default()
    }
}

pub async fn read_commands(
    controls: Controls,
    poll: PollHandle,
    remote: Arc<StateStore>,
    local: Arc<StateStore>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                warn!("stdin closed: {error}");
                break;
            }
        };

        let result = match parse_line(&line) {
            Ok(Line::Empty) => Ok(()),
            Ok(Line::Quit) => break,
            Ok(Line::Ping) => match poll.check_liveness().await {
                Ok(()) => {
                    println!("engine reachable");
                    Ok(())
                }
                Err(error) => Err(error),
            },
            Ok(Line::State) => {
                let store = match controls.current_backend() {
                    Backend::Remote => &remote,
                    Backend::Local => &local,
                };
                print_state(store).await;
                Ok(())
            }
            Ok(Line::Backend(name)) => {
                parse_backend(&name).and_then(|backend| controls.select_backend(backend))
            }
            Ok(Line::Queue(locations)) => {
                controls.queue(locations.iter().map(|location| queue_item(location)).collect())
            }
            Ok(Line::ClearQueue) => controls.clear_queue(),
            Ok(Line::Command {
                name,
                params,
                backend: Some(backend),
            }) => controls.submit_to(&name, params, &backend),
            Ok(Line::Command {
                name,
                params,
                backend: None,
            }) => controls.submit(&name, params, controls.current_backend()),
            Err(message) => {
                println!("{message}");
                Ok(())
            }
        };

        if let Err(error) = result {
            println!("{error}");
        }
    }

    _ = controls.quit();
}

pub async fn print_changes(
    broadcast: Arc<Broadcast>,
    remote: Arc<StateStore>,
    local: Arc<StateStore>,
) {
    let mut changes = broadcast.subscribe();

    while let Some(change) = changes.recv().await {
        match change {
            Change::State { backend } => {
                let store = match backend {
                    Backend::Remote => &remote,
                    Backend::Local => &local,
                };
                if store.take_item_changed().await {
                    let playback = store.playback().await;
                    println!("[{backend}] now playing: {}", playback.item.title);
                }
            }
            Change::Content(content) => println!("content changed: {content:?}"),
        }
    }
}

pub async fn print_notifications(notifications: Arc<NotificationBroadcast>) {
    let mut stream = BroadcastStream::new(notifications.subscribe()).filter_map(Result::ok);

    while let Some(notification) = stream.next().await {
        match notification {
            Notification::Error(message) => println!("error: {message}"),
            Notification::Warning(message) => println!("warning: {message}"),
            Notification::Success(message) | Notification::Info(message) => println!("{message}"),
        }
    }
}

pub async fn print_state(store: &StateStore) {
    let application = store.application().await;
    let playback = store.playback().await;

    println!(
        "[{}] volume {}{} shuffle {} repeat {}",
        store.backend(),
        application.volume,
        if application.muted { " (muted)" } else { "" },
        application.shuffled,
        application.repeat.as_str(),
    );

    if playback.playing {
        println!(
            "{} {} {} / {} ({:.1}%)",
            if playback.paused { "paused" } else { "playing" },
            playback.item.title,
            playback.position,
            playback.total_time,
            playback.percentage,
        );
    } else {
        println!("idle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_with_params_and_backend() {
        assert_eq!(
            parse_line("SetVolume {\"volume\": 30} @local"),
            Ok(Line::Command {
                name: "SetVolume".to_string(),
                params: json!({ "volume": 30 }),
                backend: Some("local".to_string()),
            })
        );
        assert_eq!(
            parse_line("  Next  "),
            Ok(Line::Command {
                name: "Next".to_string(),
                params: Value::Null,
                backend: None,
            })
        );
        assert_eq!(
            parse_line("Pause @remote"),
            Ok(Line::Command {
                name: "Pause".to_string(),
                params: Value::Null,
                backend: Some("remote".to_string()),
            })
        );
    }

    #[test]
    fn console_keywords() {
        assert_eq!(parse_line(""), Ok(Line::Empty));
        assert_eq!(parse_line("quit"), Ok(Line::Quit));
        assert_eq!(parse_line("clear"), Ok(Line::ClearQueue));
        assert_eq!(parse_line("backend local"), Ok(Line::Backend("local".to_string())));
        assert!(parse_line("backend").is_err());
        assert_eq!(
            parse_line("queue /a.flac http://host/b.mp3"),
            Ok(Line::Queue(vec![
                "/a.flac".to_string(),
                "http://host/b.mp3".to_string()
            ]))
        );
        assert!(parse_line("Seek {percentage").is_err());
    }

    #[test]
    fn queued_items_are_named_after_the_file() {
        let item = queue_item("/music/album/track.flac");
        assert_eq!(item.title, "track.flac");
        assert_eq!(item.file.as_deref(), Some("/music/album/track.flac"));
    }
}
