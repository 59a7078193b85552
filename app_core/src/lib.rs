// contains core functionality

pub mod bracket;
mod errors;
mod events;
mod game_server;
mod interpreter;
mod live;
mod match_;
mod match_doc;
mod ports;
mod scheduler;
mod state_machine;
mod team;
mod tournament;
mod veto;
pub mod utils;

pub use errors::*;
pub use events::*;
pub use game_server::*;
pub use interpreter::*;
pub use live::*;
pub use match_::*;
pub use match_doc::*;
pub use ports::*;
pub use scheduler::*;
pub use state_machine::*;
pub use team::*;
pub use tournament::*;
pub use veto::*;

use std::sync::Arc;
use tracing::warn;

/// Core bundles the ports every component talks through:
/// - the database (the only shared mutable state)
/// - the client registry (lossy notice fan-out)
/// - the RCON transport to game servers
/// - the Steam resolver
///
/// It carries no other state; the scheduler and the event interpreter each
/// take an `Arc<Core>` at construction, which keeps the lifecycle explicit
/// (build, spawn, shutdown) instead of relying on globals.
pub struct Core {
    pub database: Arc<dyn DatabasePort>,
    pub client_registry: Arc<dyn ClientRegistryPort>,
    pub rcon: Arc<dyn RconPort>,
    pub steam: Arc<dyn SteamResolverPort>,
}

impl Core {
    /// Best-effort notice fan-out; a failing registry never fails the
    /// state change that triggered it.
    pub(crate) async fn publish(&self, notice: CrPushNotice) {
        if let Err(e) = self.client_registry.publish(notice).await {
            warn!(error = %e, "publish_failed");
        }
    }
}

pub struct NoDb {}
pub struct NoCr {}
pub struct NoRcon {}
pub struct NoSteam {}

pub struct DynDb(Arc<dyn DatabasePort>);
pub struct DynCr(Arc<dyn ClientRegistryPort>);
pub struct DynRcon(Arc<dyn RconPort>);
pub struct DynSteam(Arc<dyn SteamResolverPort>);

/// Typestate builder: `build` only exists once every port is set.
pub struct CoreBuilder<DB, CR, RC, ST> {
    state_db: DB,
    state_cr: CR,
    state_rcon: RC,
    state_steam: ST,
}

impl CoreBuilder<NoDb, NoCr, NoRcon, NoSteam> {
    pub fn new() -> Self {
        CoreBuilder {
            state_db: NoDb {},
            state_cr: NoCr {},
            state_rcon: NoRcon {},
            state_steam: NoSteam {},
        }
    }
}

impl Default for CoreBuilder<NoDb, NoCr, NoRcon, NoSteam> {
    fn default() -> Self {
        Self::new()
    }
}

impl<DB, CR, RC, ST> CoreBuilder<DB, CR, RC, ST> {
    pub fn set_db(self, database: Arc<dyn DatabasePort>) -> CoreBuilder<DynDb, CR, RC, ST> {
        CoreBuilder {
            state_db: DynDb(database),
            state_cr: self.state_cr,
            state_rcon: self.state_rcon,
            state_steam: self.state_steam,
        }
    }

    pub fn set_cr(
        self,
        client_registry: Arc<dyn ClientRegistryPort>,
    ) -> CoreBuilder<DB, DynCr, RC, ST> {
        CoreBuilder {
            state_db: self.state_db,
            state_cr: DynCr(client_registry),
            state_rcon: self.state_rcon,
            state_steam: self.state_steam,
        }
    }

    pub fn set_rcon(self, rcon: Arc<dyn RconPort>) -> CoreBuilder<DB, CR, DynRcon, ST> {
        CoreBuilder {
            state_db: self.state_db,
            state_cr: self.state_cr,
            state_rcon: DynRcon(rcon),
            state_steam: self.state_steam,
        }
    }

    pub fn set_steam(
        self,
        steam: Arc<dyn SteamResolverPort>,
    ) -> CoreBuilder<DB, CR, RC, DynSteam> {
        CoreBuilder {
            state_db: self.state_db,
            state_cr: self.state_cr,
            state_rcon: self.state_rcon,
            state_steam: DynSteam(steam),
        }
    }
}

impl CoreBuilder<DynDb, DynCr, DynRcon, DynSteam> {
    pub fn build(self) -> Core {
        Core {
            database: self.state_db.0,
            client_registry: self.state_cr.0,
            rcon: self.state_rcon.0,
            steam: self.state_steam.0,
        }
    }
}
