//! Client configuration: where to connect and how the session behaves.

use std::time::Duration;

use thiserror::Error;

use crate::domain::ReconnectPolicy;

/// Invalid command-line configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("username is required, use --user")]
    EmptyUsername,

    #[error("host must not be empty")]
    EmptyHost,

    #[error("invalid port: {0}")]
    InvalidPort(u16),

    #[error("invalid room name '{0}': use letters, digits, '-' or '_'")]
    InvalidRoom(String),
}

/// Where to connect and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Room to join; `None` uses the general chat endpoint
    pub room: Option<String>,
}

impl ClientConfig {
    /// Check the configuration, trimming the username.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.username = self.username.trim().to_string();
        if self.username.is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if let Some(room) = &self.room {
            let valid = !room.is_empty()
                && room
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(ConfigError::InvalidRoom(room.clone()));
            }
        }
        Ok(self)
    }

    /// WebSocket URL of the chat or room endpoint.
    pub fn endpoint(&self) -> String {
        match &self.room {
            Some(room) => format!("ws://{}:{}/ws/room/{}", self.host, self.port, room),
            None => format!("ws://{}:{}/ws/chat", self.host, self.port),
        }
    }
}

/// Timings and queue sizes of a [`crate::session::ClientSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub write_wait: Duration,
    /// Read deadline; any frame from the server resets it
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub incoming_capacity: usize,
    pub outgoing_capacity: usize,
    pub error_capacity: usize,
    pub status_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            incoming_capacity: 100,
            outgoing_capacity: 100,
            error_capacity: 10,
            status_capacity: 10,
        }
    }
}

impl SessionConfig {
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Change the read deadline, keeping pings at 9/10 of it.
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        self.pong_wait = pong_wait;
        self.ping_period = pong_wait * 9 / 10;
        self
    }

    pub fn with_outgoing_capacity(mut self, capacity: usize) -> Self {
        self.outgoing_capacity = capacity;
        self
    }

    pub fn with_incoming_capacity(mut self, capacity: usize) -> Self {
        self.incoming_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig {
            host: "localhost".to_string(),
            port: 8080,
            username: "alice".to_string(),
            room: None,
        }
    }

    #[test]
    fn test_valid_config_builds_chat_endpoint() {
        // テスト項目: ルーム指定なしではチャットエンドポイントに接続する
        // given (前提条件):
        let config = config();

        // when (操作):
        let config = config.validate().unwrap();

        // then (期待する結果):
        assert_eq!(config.endpoint(), "ws://localhost:8080/ws/chat");
    }

    #[test]
    fn test_room_config_builds_room_endpoint() {
        // テスト項目: ルーム指定時はルーム用のエンドポイントになる
        // given (前提条件):
        let config = ClientConfig {
            room: Some("rust_lang".to_string()),
            ..config()
        };

        // when (操作):
        let config = config.validate().unwrap();

        // then (期待する結果):
        assert_eq!(config.endpoint(), "ws://localhost:8080/ws/room/rust_lang");
    }

    #[test]
    fn test_blank_username_is_rejected() {
        // テスト項目: 空白だけのユーザー名は拒否される
        // given (前提条件):
        let config = ClientConfig {
            username: "   ".to_string(),
            ..config()
        };

        // when (操作):
        let result = config.validate();

        // then (期待する結果):
        assert_eq!(result, Err(ConfigError::EmptyUsername));
    }

    #[test]
    fn test_username_is_trimmed() {
        // テスト項目: ユーザー名の前後の空白は取り除かれる
        // given (前提条件):
        let config = ClientConfig {
            username: "  bob ".to_string(),
            ..config()
        };

        // when (操作):
        let validated = config.validate().unwrap();

        // then (期待する結果):
        assert_eq!(validated.username, "bob");
    }

    #[test]
    fn test_invalid_port_and_host_are_rejected() {
        // テスト項目: ポート 0 と空のホストは検証で拒否される
        // given (前提条件):
        let zero_port = ClientConfig { port: 0, ..config() };
        let no_host = ClientConfig {
            host: String::new(),
            ..config()
        };

        // when (操作):
        let port_result = zero_port.validate();
        let host_result = no_host.validate();

        // then (期待する結果):
        assert_eq!(port_result, Err(ConfigError::InvalidPort(0)));
        assert_eq!(host_result, Err(ConfigError::EmptyHost));
    }

    #[test]
    fn test_room_with_path_characters_is_rejected() {
        // テスト項目: URL パスを壊すルーム名は拒否される
        // given (前提条件):
        let config = ClientConfig {
            room: Some("a/b".to_string()),
            ..config()
        };

        // when (操作):
        let result = config.validate();

        // then (期待する結果):
        assert_eq!(result, Err(ConfigError::InvalidRoom("a/b".to_string())));
    }

    #[test]
    fn test_session_pong_wait_keeps_ping_ratio() {
        // テスト項目: 読み取り期限を変更しても ping 間隔は 9/10 に保たれる
        // given (前提条件):
        let config = SessionConfig::default();

        // when (操作):
        let shortened = config.with_pong_wait(Duration::from_secs(10));

        // then (期待する結果):
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert_eq!(shortened.ping_period, Duration::from_secs(9));
    }
}
