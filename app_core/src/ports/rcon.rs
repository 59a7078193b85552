// remote administration (RCON) port

use async_trait::async_trait;
use thiserror::Error;

/// Address and credentials of one game server's RCON endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct RconTarget {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl RconTarget {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// password stays out of logs
impl std::fmt::Debug for RconTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum RconError {
    /// server did not answer within the deadline
    #[error("rcon timeout")]
    Timeout,
    /// connection could not be established
    #[error("rcon unreachable: {0}")]
    Unreachable(String),
    /// server rejected the password
    #[error("rcon authentication rejected")]
    Auth,
    /// transport failure mid-command
    #[error("rcon error: {0}")]
    Other(String),
}

pub type RconResult<T> = Result<T, RconError>;

/// RCON port trait; the transport is an external collaborator, the core
/// only relies on this request/response primitive.
#[async_trait]
pub trait RconPort: Send + Sync {
    async fn send_command(&self, target: &RconTarget, cmd: &str) -> RconResult<String>;
}
