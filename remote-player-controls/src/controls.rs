use remote_player_models::{Backend, PlayingItem, RepeatMode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::{mpsc::UnboundedSender, watch};

use crate::{Error, Result};

/// Every command either backend accepts. Toggles read the current state
/// of the target backend when they are executed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    GoTo { index: u32 },
    Seek { percentage: f64 },
    SetVolume { volume: u8 },
    SetMute { muted: bool },
    ToggleMute,
    SetShuffle { shuffled: bool },
    ToggleShuffle,
    SetRepeat { mode: RepeatMode },
    CycleRepeat,
    TogglePartyMode,
}

#[derive(Debug, Deserialize)]
struct GoToParams {
    index: u32,
}

#[derive(Debug, Deserialize)]
struct SeekParams {
    percentage: f64,
}

#[derive(Debug, Deserialize)]
struct VolumeParams {
    volume: u32,
}

#[derive(Debug, Deserialize)]
struct MuteParams {
    muted: bool,
}

#[derive(Debug, Deserialize)]
struct ShuffleParams {
    shuffled: bool,
}

#[derive(Debug, Deserialize)]
struct RepeatParams {
    mode: RepeatMode,
}

const NAMES: &[&str] = &[
    "Play",
    "Pause",
    "PlayPause",
    "Stop",
    "Next",
    "Previous",
    "GoTo",
    "Seek",
    "SetVolume",
    "SetMute",
    "ToggleMute",
    "SetShuffle",
    "ToggleShuffle",
    "SetRepeat",
    "CycleRepeat",
    "TogglePartyMode",
];

fn params<T: DeserializeOwned>(command: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|error| Error::InvalidParams {
        command: command.to_string(),
        message: error.to_string(),
    })
}

fn no_params(command: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Object(map) if map.is_empty() => Ok(()),
        _ => Err(Error::InvalidParams {
            command: command.to_string(),
            message: "takes no parameters".to_string(),
        }),
    }
}

impl Command {
    pub fn names() -> &'static [&'static str] {
        NAMES
    }

    /// Builds a command from its name and JSON parameters. Names are
    /// matched case insensitively.
    pub fn parse(name: &str, value: Value) -> Result<Command> {
        let Some(name) = NAMES
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(name))
        else {
            return Err(Error::UnknownCommand {
                name: name.to_string(),
            });
        };

        let command = match *name {
            "GoTo" => {
                let GoToParams { index } = params(name, value)?;
                Command::GoTo { index }
            }
            "Seek" => {
                let SeekParams { percentage } = params(name, value)?;
                if !(0.0..=100.0).contains(&percentage) {
                    return Err(Error::InvalidParams {
                        command: name.to_string(),
                        message: format!("percentage {percentage} is outside 0-100"),
                    });
                }
                Command::Seek { percentage }
            }
            "SetVolume" => {
                let VolumeParams { volume } = params(name, value)?;
                if volume > 100 {
                    return Err(Error::InvalidParams {
                        command: name.to_string(),
                        message: format!("volume {volume} is outside 0-100"),
                    });
                }
                Command::SetVolume {
                    volume: volume as u8,
                }
            }
            "SetMute" => {
                let MuteParams { muted } = params(name, value)?;
                Command::SetMute { muted }
            }
            "SetShuffle" => {
                let ShuffleParams { shuffled } = params(name, value)?;
                Command::SetShuffle { shuffled }
            }
            "SetRepeat" => {
                let RepeatParams { mode } = params(name, value)?;
                Command::SetRepeat { mode }
            }
            simple => {
                no_params(simple, &value)?;
                match simple {
                    "Play" => Command::Play,
                    "Pause" => Command::Pause,
                    "PlayPause" => Command::PlayPause,
                    "Stop" => Command::Stop,
                    "Next" => Command::Next,
                    "Previous" => Command::Previous,
                    "ToggleMute" => Command::ToggleMute,
                    "ToggleShuffle" => Command::ToggleShuffle,
                    "CycleRepeat" => Command::CycleRepeat,
                    _ => Command::TogglePartyMode,
                }
            }
        };

        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Play => "Play",
            Command::Pause => "Pause",
            Command::PlayPause => "PlayPause",
            Command::Stop => "Stop",
            Command::Next => "Next",
            Command::Previous => "Previous",
            Command::GoTo { .. } => "GoTo",
            Command::Seek { .. } => "Seek",
            Command::SetVolume { .. } => "SetVolume",
            Command::SetMute { .. } => "SetMute",
            Command::ToggleMute => "ToggleMute",
            Command::SetShuffle { .. } => "SetShuffle",
            Command::ToggleShuffle => "ToggleShuffle",
            Command::SetRepeat { .. } => "SetRepeat",
            Command::CycleRepeat => "CycleRepeat",
            Command::TogglePartyMode => "TogglePartyMode",
        }
    }

    pub fn supported_by(&self, backend: Backend) -> bool {
        match self {
            Command::TogglePartyMode => backend == Backend::Remote,
            _ => true,
        }
    }
}

pub fn parse_backend(name: &str) -> Result<Backend> {
    name.parse().map_err(|name| Error::UnknownBackend { name })
}

#[derive(Debug)]
pub enum ControlMessage {
    Command { command: Command, backend: Backend },
    SelectBackend(Backend),
    Queue(Vec<PlayingItem>),
    ClearQueue,
    Quit,
}

/// Cloneable handle that submits commands to the player loop.
#[derive(Debug, Clone)]
pub struct Controls {
    tx: UnboundedSender<ControlMessage>,
    current: watch::Receiver<Backend>,
}

impl Controls {
    pub fn new(tx: UnboundedSender<ControlMessage>, current: watch::Receiver<Backend>) -> Self {
        Self { tx, current }
    }

    /// Validates `name` and `params` and queues the command for `backend`.
    pub fn submit(&self, name: &str, params: Value, backend: Backend) -> Result<()> {
        let command = Command::parse(name, params)?;
        self.send(command, backend)
    }

    /// Like [`Controls::submit`] with the backend given by name.
    pub fn submit_to(&self, name: &str, params: Value, backend: &str) -> Result<()> {
        let backend = parse_backend(backend)?;
        self.submit(name, params, backend)
    }

    pub fn send(&self, command: Command, backend: Backend) -> Result<()> {
        if !command.supported_by(backend) {
            return Err(Error::Unsupported {
                command: command.name().to_string(),
                backend,
            });
        }

        self.tx.send(ControlMessage::Command { command, backend })?;
        Ok(())
    }

    pub fn current_backend(&self) -> Backend {
        *self.current.borrow()
    }

    pub fn select_backend(&self, backend: Backend) -> Result<()> {
        self.tx.send(ControlMessage::SelectBackend(backend))?;
        Ok(())
    }

    pub fn queue(&self, items: Vec<PlayingItem>) -> Result<()> {
        self.tx.send(ControlMessage::Queue(items))?;
        Ok(())
    }

    pub fn clear_queue(&self) -> Result<()> {
        self.tx.send(ControlMessage::ClearQueue)?;
        Ok(())
    }

    pub fn quit(&self) -> Result<()> {
        self.tx.send(ControlMessage::Quit)?;
        Ok(())
    }
}
