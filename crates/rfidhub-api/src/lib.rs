//! Web server and connection registry for rfidhub.
//!
//! - `GET /ws`: station WebSocket, one station actor per connection
//! - `GET /api/health`: service status
//! - `GET /api/stations`: connected stations

pub mod handlers;
pub mod hub;
pub mod server;
pub mod state;

pub use hub::{Hub, Registration, StationInfo};
pub use server::{create_router, run, serve, shutdown_signal};
pub use state::ServerState;
