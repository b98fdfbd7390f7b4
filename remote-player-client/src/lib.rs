use snafu::prelude::*;

pub mod client;
pub mod events;
pub mod methods;
pub mod push;
pub mod rpc_models;

#[derive(Snafu, Debug, Clone, PartialEq)]
pub enum Error {
    #[snafu(display("{message}"))]
    Http { message: String },
    #[snafu(display("engine answered with http status {status}"))]
    Status { status: u16 },
    #[snafu(display("failed to deserialize json: {message}"))]
    DeserializeJSON { message: String },
    #[snafu(display("rpc error {code}: {message}"))]
    Rpc { code: i64, message: String },
    #[snafu(display("batch response does not match request: {message}"))]
    Batch { message: String },
    #[snafu(display("unable to open push connection to {url}: {message}"))]
    PushConnect { url: String, message: String },
    #[snafu(display("unknown event {method}"))]
    UnknownEvent { method: String },
    #[snafu(display("malformed event: {message}"))]
    MalformedEvent { message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Http {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::DeserializeJSON {
            message: error.to_string(),
        }
    }
}
