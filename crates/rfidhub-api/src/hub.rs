//! Connection registry.
//!
//! Maps a station IP to the handle of its running actor. A station is
//! identified by its address alone, so a reconnecting browser replaces its
//! own stale station instead of competing with it for the reader.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Registry entry of a running station.
#[derive(Debug)]
struct StationHandle {
    conn_id: Uuid,
    connected_at: DateTime<Utc>,
    stop: watch::Sender<bool>,
}

/// Public view of a registered station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationInfo {
    pub ip: String,
    pub conn_id: Uuid,
    pub connected_at: DateTime<Utc>,
}

/// Registration of one UI connection.
#[derive(Debug)]
pub struct Registration {
    pub conn_id: Uuid,
    /// Fires when the station must stop
    pub stop: watch::Receiver<bool>,
}

#[derive(Debug, Default)]
pub struct Hub {
    stations: DashMap<String, StationHandle>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection for `ip`, stopping any station it replaces.
    pub fn register(&self, ip: &str) -> Registration {
        let (stop_tx, stop_rx) = watch::channel(false);
        let conn_id = Uuid::new_v4();
        let handle = StationHandle {
            conn_id,
            connected_at: Utc::now(),
            stop: stop_tx,
        };

        if let Some(old) = self.stations.insert(ip.to_string(), handle) {
            info!(station = %ip, old = %old.conn_id, new = %conn_id, "Station reconnected, stopping the old one");
            let _ = old.stop.send(true);
        } else {
            info!(station = %ip, conn = %conn_id, "Station registered");
        }

        Registration {
            conn_id,
            stop: stop_rx,
        }
    }

    /// Remove `ip` if it still belongs to `conn_id`.
    pub fn unregister(&self, ip: &str, conn_id: Uuid) -> bool {
        let removed = self
            .stations
            .remove_if(ip, |_, handle| handle.conn_id == conn_id)
            .is_some();
        if removed {
            info!(station = %ip, conn = %conn_id, "Station unregistered");
        } else {
            debug!(station = %ip, conn = %conn_id, "Station already replaced");
        }
        removed
    }

    /// Ask every station to stop.
    pub fn stop_all(&self) {
        for entry in self.stations.iter() {
            let _ = entry.stop.send(true);
        }
    }

    /// Registered stations ordered by IP.
    pub fn stations(&self) -> Vec<StationInfo> {
        let mut list: Vec<StationInfo> = self
            .stations
            .iter()
            .map(|entry| StationInfo {
                ip: entry.key().clone(),
                conn_id: entry.conn_id,
                connected_at: entry.connected_at,
            })
            .collect();
        list.sort_by(|a, b| a.ip.cmp(&b.ip));
        list
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.stations.contains_key(ip)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
