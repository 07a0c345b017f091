//! Server state shared across all handlers.

use std::sync::Arc;

use rfidhub_core::{Circulation, HubConfig};

use crate::hub::Hub;

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<HubConfig>,
    /// Connection registry
    pub hub: Arc<Hub>,
    /// Backend adapter shared by every station
    pub circulation: Arc<dyn Circulation>,
    /// Unix timestamp of server start
    pub started_at: i64,
}

impl ServerState {
    pub fn new(config: HubConfig, circulation: Arc<dyn Circulation>) -> Self {
        Self {
            config: Arc::new(config),
            hub: Arc::new(Hub::new()),
            circulation,
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}
