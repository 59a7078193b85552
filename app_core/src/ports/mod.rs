// trait definitions for ports

mod client_registry;
mod database;
mod rcon;
mod steam;

pub use client_registry::*;
pub use database::*;
pub use rcon::*;
pub use steam::*;
