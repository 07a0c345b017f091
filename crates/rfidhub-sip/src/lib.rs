//! SIP2 circulation backend adapter.
//!
//! - [`message`]: request forming and response parsing for the login,
//!   checkin and item information exchanges
//! - [`SipConnection`]: one logged-in TCP session
//! - [`SipPool`]: bounded pool of sessions shared by every station
//! - [`SipClient`]: the [`rfidhub_core::Circulation`] implementation

pub mod client;
pub mod connection;
pub mod error;
pub mod message;
pub mod pool;

pub use client::SipClient;
pub use connection::SipConnection;
pub use error::{SipError, SipResult};
pub use pool::{PooledConnection, SipPool};
