// Source RCON adapter

use app_core::{RconError, RconPort, RconResult, RconTarget};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// One connection per command. Config pushes and admin actions are rare
/// enough that connection reuse is not worth the reconnect bookkeeping,
/// and a fresh handshake doubles as a liveness probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct RconClient;

fn map_rcon_err(e: rcon::Error) -> RconError {
    match e {
        rcon::Error::Auth => RconError::Auth,
        other => RconError::Other(other.to_string()),
    }
}

#[async_trait]
impl RconPort for RconClient {
    #[instrument(name = "rcon.send", skip(self, target, cmd), fields(addr = %target.addr()))]
    async fn send_command(&self, target: &RconTarget, cmd: &str) -> RconResult<String> {
        let mut conn = rcon::Connection::<TcpStream>::builder()
            .connect(target.addr(), &target.password)
            .await
            .map_err(|e| match e {
                rcon::Error::Auth => RconError::Auth,
                other => RconError::Unreachable(other.to_string()),
            })?;
        let raw = conn.cmd(cmd).await.map_err(map_rcon_err)?;
        debug!(bytes = raw.len(), "rcon_ok");
        Ok(raw)
    }
}
