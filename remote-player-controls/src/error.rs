use remote_player_models::Backend;
use snafu::prelude::*;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("{message}"))]
    Client {
        message: String,
    },
    #[snafu(display("unknown command: {name}"))]
    UnknownCommand {
        name: String,
    },
    #[snafu(display("invalid parameters for {command}: {message}"))]
    InvalidParams {
        command: String,
        message: String,
    },
    #[snafu(display("unknown backend: {name}"))]
    UnknownBackend {
        name: String,
    },
    #[snafu(display("{command} is not supported by the {backend} backend"))]
    Unsupported {
        command: String,
        backend: Backend,
    },
    #[snafu(display("{message}"))]
    Engine {
        message: String,
    },
    #[snafu(display("failed to seek"))]
    Seek,
    StreamError {
        message: String,
    },
    #[snafu(display("command queue is closed"))]
    SendError,
    #[snafu(display("media engine is unreachable"))]
    Unreachable,
}

impl From<remote_player_client::Error> for Error {
    fn from(value: remote_player_client::Error) -> Self {
        Error::Client {
            message: value.to_string(),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::SendError
    }
}

impl From<rodio::source::SeekError> for Error {
    fn from(_: rodio::source::SeekError) -> Self {
        Error::Seek
    }
}

impl From<rodio::StreamError> for Error {
    fn from(value: rodio::StreamError) -> Self {
        Self::StreamError {
            message: value.to_string(),
        }
    }
}

impl From<rodio::decoder::DecoderError> for Error {
    fn from(value: rodio::decoder::DecoderError) -> Self {
        Self::StreamError {
            message: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::StreamError {
            message: value.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::StreamError {
            message: value.to_string(),
        }
    }
}
