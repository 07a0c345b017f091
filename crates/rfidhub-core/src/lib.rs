//! Shared building blocks for the rfidhub workspace.
//!
//! This crate holds everything the station actor, the device link, the SIP2
//! adapter and the web server need to agree on:
//! - [`message`]: the JSON message exchanged with the browser UI
//! - [`circulation`]: the contract of the circulation backend adapter
//! - [`config`]: configuration loading with file and environment sources

pub mod circulation;
pub mod config;
pub mod message;

pub use circulation::{CallError, Circulation, ItemResult};
pub use config::{
    BackendFailurePolicy, ConfigError, DeviceConfig, HubConfig, ServerConfig, SipConfig,
    StationConfig, UiConfig,
};
pub use message::{Action, Item, Message};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
