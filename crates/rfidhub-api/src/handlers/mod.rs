//! API handlers.

pub mod basic;
pub mod ws;

pub use crate::state::ServerState;

pub use basic::{health_handler, stations_handler};
pub use ws::ws_handler;
