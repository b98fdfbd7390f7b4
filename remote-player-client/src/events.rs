use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Library {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistChange {
    Add,
    Remove,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Quit,
    Restart,
    Sleep,
}

/// Every notification the engine pushes that the player reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PlaybackStarted { player_id: Option<i32> },
    PlaybackStopped { ended: bool },
    PlaybackPaused,
    PlaybackResumed,
    PropertyChanged,
    Seek,
    PlaylistChanged {
        playlist_id: i32,
        change: PlaylistChange,
    },
    VolumeChanged { volume: u8, muted: bool },
    ScanStarted { library: Library },
    ScanFinished { library: Library },
    InputRequested {
        title: String,
        kind: String,
        value: String,
    },
    InputFinished,
    ShuttingDown { reason: Shutdown },
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    method: Option<String>,
    #[serde(default)]
    params: RawParams,
}

#[derive(Debug, Default, Deserialize)]
struct RawParams {
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
struct PlayData {
    player: Option<PlayerData>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerData {
    playerid: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct StopData {
    #[serde(default)]
    end: bool,
}

#[derive(Debug, Deserialize)]
struct VolumeData {
    volume: f64,
    muted: bool,
}

#[derive(Debug, Deserialize)]
struct PlaylistData {
    playlistid: i32,
}

#[derive(Debug, Default, Deserialize)]
struct InputData {
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: String,
}

fn data<T: serde::de::DeserializeOwned>(method: &str, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|error| Error::MalformedEvent {
        message: format!("{method}: {error}"),
    })
}

/// Tolerates events that arrive without a data object.
fn optional_data<T: serde::de::DeserializeOwned + Default>(method: &str, value: Value) -> Result<T> {
    if value.is_null() {
        Ok(T::default())
    } else {
        data(method, value)
    }
}

impl Event {
    pub fn decode(message: &str) -> Result<Event> {
        let raw: RawNotification =
            serde_json::from_str(message).map_err(|error| Error::MalformedEvent {
                message: error.to_string(),
            })?;

        let Some(method) = raw.method else {
            return Err(Error::MalformedEvent {
                message: "message without method".to_string(),
            });
        };

        let value = raw.params.data;

        let event = match method.as_str() {
            "Player.OnPlay" | "Player.OnAVStart" => {
                let play: PlayData = optional_data(&method, value)?;
                Event::PlaybackStarted {
                    player_id: play.player.and_then(|p| p.playerid),
                }
            }
            "Player.OnStop" => {
                let stop: StopData = optional_data(&method, value)?;
                Event::PlaybackStopped { ended: stop.end }
            }
            "Player.OnPause" => Event::PlaybackPaused,
            "Player.OnResume" => Event::PlaybackResumed,
            "Player.OnPropertyChanged" | "Player.OnSpeedChanged" => Event::PropertyChanged,
            "Player.OnSeek" => Event::Seek,
            "Playlist.OnAdd" | "Playlist.OnRemove" | "Playlist.OnClear" => {
                let playlist: PlaylistData = data(&method, value)?;
                let change = match method.as_str() {
                    "Playlist.OnAdd" => PlaylistChange::Add,
                    "Playlist.OnRemove" => PlaylistChange::Remove,
                    _ => PlaylistChange::Clear,
                };
                Event::PlaylistChanged {
                    playlist_id: playlist.playlistid,
                    change,
                }
            }
            "Application.OnVolumeChanged" => {
                let volume: VolumeData = data(&method, value)?;
                Event::VolumeChanged {
                    volume: volume.volume.round().clamp(0.0, 100.0) as u8,
                    muted: volume.muted,
                }
            }
            "AudioLibrary.OnScanStarted" => Event::ScanStarted {
                library: Library::Audio,
            },
            "VideoLibrary.OnScanStarted" => Event::ScanStarted {
                library: Library::Video,
            },
            "AudioLibrary.OnScanFinished" => Event::ScanFinished {
                library: Library::Audio,
            },
            "VideoLibrary.OnScanFinished" => Event::ScanFinished {
                library: Library::Video,
            },
            "Input.OnInputRequested" => {
                let input: InputData = optional_data(&method, value)?;
                Event::InputRequested {
                    title: input.title,
                    kind: input.kind,
                    value: input.value,
                }
            }
            "Input.OnInputFinished" => Event::InputFinished,
            "System.OnQuit" => Event::ShuttingDown {
                reason: Shutdown::Quit,
            },
            "System.OnRestart" => Event::ShuttingDown {
                reason: Shutdown::Restart,
            },
            "System.OnSleep" => Event::ShuttingDown {
                reason: Shutdown::Sleep,
            },
            _ => return Err(Error::UnknownEvent { method }),
        };

        Ok(event)
    }
}
