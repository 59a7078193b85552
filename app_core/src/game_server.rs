//! Game servers the allocator can hand matches to.

use crate::{
    Core, CoreError, CoreResult, DbpGameServer, RconTarget,
    utils::{
        normalize::{is_valid_slug, normalize_ws, slugify},
        revision::{ObjectRevision, Revision},
        validation::{FieldError, ValidationErrors, ValidationResult},
    },
};
use serde::{Deserialize, Serialize};

/// A game server. `(host, port)` must be unique among enabled servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameServer {
    id: String,
    #[serde(skip)]
    revision: Revision,
    name: String,
    host: String,
    port: u16,
    rcon_password: String,
    enabled: bool,
}

impl Default for GameServer {
    fn default() -> Self {
        GameServer {
            id: String::new(),
            revision: Revision::New,
            name: String::new(),
            host: String::new(),
            port: 27015,
            rcon_password: String::new(),
            enabled: true,
        }
    }
}

impl ObjectRevision for GameServer {
    fn revision(&self) -> Revision {
        self.revision
    }
    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

impl GameServer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = normalize_ws(name.into());
        GameServer {
            id: slugify(&name),
            name,
            ..Default::default()
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        GameServer {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }
    pub fn get_name(&self) -> &str {
        &self.name
    }
    pub fn get_host(&self) -> &str {
        &self.host
    }
    pub fn get_port(&self) -> u16 {
        self.port
    }
    pub fn get_rcon_password(&self) -> &str {
        &self.rcon_password
    }
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = normalize_ws(name.into());
        if self.id.is_empty() {
            self.id = slugify(&self.name);
        }
        self
    }

    pub fn set_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = normalize_ws(host.into());
        self
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    pub fn set_rcon_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.rcon_password = password.into();
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    /// Address + credentials for the RCON port.
    pub fn rcon_target(&self) -> RconTarget {
        RconTarget {
            host: self.host.clone(),
            port: self.port,
            password: self.rcon_password.clone(),
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        let mut errs = ValidationErrors::new();

        if self.name.is_empty() {
            errs.add(FieldError::builder().set_field("name").add_required().build());
        }
        if !is_valid_slug(&self.id) {
            errs.add(
                FieldError::builder()
                    .set_field("id")
                    .add_invalid_format()
                    .add_message("id must be a lowercase slug")
                    .build(),
            );
        }
        if self.host.is_empty() {
            errs.add(FieldError::builder().set_field("host").add_required().build());
        }
        if self.port == 0 {
            errs.add(
                FieldError::builder()
                    .set_field("port")
                    .add_message("port must be non-zero")
                    .build(),
            );
        }

        errs.into_result()
    }
}

impl Core {
    pub async fn get_server(&self, id: &str) -> CoreResult<Option<GameServer>> {
        Ok(self.database.get_server(id).await?)
    }

    pub async fn list_servers(&self) -> CoreResult<Vec<GameServer>> {
        Ok(self.database.list_servers().await?)
    }

    pub async fn upsert_server(&self, server: &GameServer) -> CoreResult<GameServer> {
        server.validate().map_err(CoreError::from)?;
        Ok(self.database.save_server(server).await?)
    }

    /// Delete fails while the server is bound to a non-completed match.
    pub async fn delete_server(&self, id: &str) -> CoreResult<()> {
        Ok(self.database.delete_server(id).await?)
    }
}
