use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use remote_player_client::{
    client::RpcTransport,
    methods,
};
use remote_player_controls::{Player, config::Configuration, sink::Sink};
use remote_player_models::Backend;
use serde_json::Value;
use snafu::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::console;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(long, env = "REMOTE_PLAYER_HOST", default_value = "127.0.0.1")]
    /// Host of the media engine.
    host: String,

    #[clap(long, env = "REMOTE_PLAYER_HTTP_PORT", default_value_t = 8080)]
    /// Port of the JSON-RPC http endpoint.
    http_port: u16,

    #[clap(long, env = "REMOTE_PLAYER_PUSH_PORT", default_value_t = 9090)]
    /// Port of the websocket notification endpoint.
    push_port: u16,

    #[clap(short, long, env = "REMOTE_PLAYER_USERNAME")]
    username: Option<String>,

    #[clap(short, long, env = "REMOTE_PLAYER_PASSWORD")]
    password: Option<String>,

    #[clap(long, env = "REMOTE_PLAYER_POLL_INTERVAL_MS", default_value_t = 10_000)]
    /// Base poll interval while push is unavailable.
    poll_interval_ms: u64,

    #[clap(long, env = "REMOTE_PLAYER_MAX_FAILURES", default_value_t = 100)]
    /// Consecutive poll failures before polling stops.
    max_failures: u32,

    #[clap(long, env = "REMOTE_PLAYER_REFRESH_DEBOUNCE_MS", default_value_t = 300)]
    refresh_debounce_ms: u64,

    #[clap(long, env = "REMOTE_PLAYER_INPUT_TIMEOUT_SECS", default_value_t = 60)]
    /// Seconds before a pending input request is escalated.
    input_timeout_secs: u64,

    #[clap(long, env = "REMOTE_PLAYER_PUSH_RECONNECT_MS", default_value_t = 5_000)]
    push_reconnect_ms: u64,

    #[clap(long, env = "REMOTE_PLAYER_RPC_TIMEOUT_MS", default_value_t = 5_000)]
    rpc_timeout_ms: u64,

    #[clap(long, env = "REMOTE_PLAYER_DISABLE_PUSH", default_value_t = false)]
    /// Never connect the websocket, poll only.
    disable_push: bool,

    #[clap(long, default_value_t = 50)]
    /// Initial volume of the local backend.
    local_volume: u8,

    #[clap(short, long)]
    /// Log level
    verbosity: Option<tracing::Level>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the player and read commands from stdin
    Open,
    /// Send one command to the media engine and print the resulting state
    Send {
        name: String,
        /// Parameters as a json object
        params: Option<String>,
    },
    /// Check that the media engine answers
    Ping,
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{error}"))]
    ClientError { error: String },
    #[snafu(display("{error}"))]
    PlayerError { error: String },
    #[snafu(display("Invalid parameters: {error}"))]
    ParamsError { error: String },
}

impl From<remote_player_client::Error> for Error {
    fn from(error: remote_player_client::Error) -> Self {
        Error::ClientError {
            error: error.to_string(),
        }
    }
}

impl From<remote_player_controls::Error> for Error {
    fn from(error: remote_player_controls::Error) -> Self {
        Error::PlayerError {
            error: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::ParamsError {
            error: error.to_string(),
        }
    }
}

impl Cli {
    fn configuration(&self) -> Configuration {
        Configuration {
            host: self.host.clone(),
            http_port: self.http_port,
            push_port: self.push_port,
            username: self.username.clone(),
            password: self.password.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_failures: self.max_failures,
            refresh_debounce: Duration::from_millis(self.refresh_debounce_ms),
            input_timeout: Duration::from_secs(self.input_timeout_secs),
            push_reconnect: Duration::from_millis(self.push_reconnect_ms),
            rpc_timeout: Duration::from_millis(self.rpc_timeout_ms),
            disable_push: self.disable_push,
            local_volume: self.local_volume,
        }
    }
}

pub async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let filter = match cli.verbosity {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let configuration = cli.configuration();

    match cli.command {
        Commands::Open => {
            let mut player = player(&configuration)?;
            let push = configuration.push_client().map(|push| {
                let (events, _handle) = push.spawn();
                events
            });

            tokio::spawn(console::print_changes(
                player.broadcast(),
                player.state(Backend::Remote),
                player.state(Backend::Local),
            ));
            tokio::spawn(console::print_notifications(player.notifications()));
            tokio::spawn(console::read_commands(
                player.controls(),
                player.poll_handle(),
                player.state(Backend::Remote),
                player.state(Backend::Local),
            ));

            player.player_loop(push).await?;
            Ok(())
        }
        Commands::Send { name, params } => {
            let params = match params {
                Some(params) => serde_json::from_str(&params)?,
                None => Value::Null,
            };

            let configuration = Configuration {
                disable_push: true,
                ..configuration
            };
            let mut player = player(&configuration)?;
            let controls = player.controls();
            controls.submit(&name, params, Backend::Remote)?;
            controls.quit()?;

            player.player_loop(None).await?;
            console::print_state(&player.state(Backend::Remote)).await;
            Ok(())
        }
        Commands::Ping => {
            let client = configuration.rpc_client()?;
            let answer = client.call(methods::ping()).await?;
            println!("{} answered {answer}", client.endpoint());
            Ok(())
        }
    }
}

fn player(configuration: &Configuration) -> Result<Player<Sink>, Error> {
    let rpc: Arc<dyn RpcTransport> = Arc::new(configuration.rpc_client()?);
    let (events_tx, events) = mpsc::unbounded_channel();
    let sink = Sink::new(events_tx, configuration.local_volume);

    Ok(Player::new(configuration, rpc, sink, events))
}
