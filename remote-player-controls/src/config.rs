use std::time::Duration;

use remote_player_client::{client::Client, push::PushClient};

use crate::Result;

/// Settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub host: String,
    pub http_port: u16,
    pub push_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Base poll interval while push is down.
    pub poll_interval: Duration,
    /// Consecutive poll failures after which polling stops.
    pub max_failures: u32,
    pub refresh_debounce: Duration,
    pub input_timeout: Duration,
    pub push_reconnect: Duration,
    pub rpc_timeout: Duration,
    pub disable_push: bool,
    /// Initial volume of the local backend.
    pub local_volume: u8,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            http_port: 8080,
            push_port: 9090,
            username: None,
            password: None,
            poll_interval: Duration::from_millis(10_000),
            max_failures: 100,
            refresh_debounce: Duration::from_millis(300),
            input_timeout: Duration::from_secs(60),
            push_reconnect: Duration::from_millis(5_000),
            rpc_timeout: Duration::from_millis(5_000),
            disable_push: false,
            local_volume: 50,
        }
    }
}

impl Configuration {
    pub fn rpc_client(&self) -> Result<Client> {
        Ok(Client::new(
            &self.host,
            self.http_port,
            self.username.clone(),
            self.password.clone(),
            self.rpc_timeout,
        )?)
    }

    /// `None` when push is disabled.
    pub fn push_client(&self) -> Option<PushClient> {
        if self.disable_push {
            None
        } else {
            Some(PushClient::new(
                &self.host,
                self.push_port,
                self.push_reconnect,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clients_follow_configuration() {
        let configuration = Configuration {
            host: "10.0.0.2".to_string(),
            http_port: 8081,
            push_port: 9091,
            ..Default::default()
        };

        assert_eq!(
            configuration.rpc_client().unwrap().endpoint(),
            "http://10.0.0.2:8081/jsonrpc"
        );
        assert_eq!(
            configuration.push_client().unwrap().url(),
            "ws://10.0.0.2:9091/jsonrpc"
        );

        let disabled = Configuration {
            disable_push: true,
            ..configuration
        };
        assert!(disabled.push_client().is_none());
    }
}
