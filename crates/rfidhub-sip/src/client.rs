//! [`Circulation`] implementation over the SIP2 pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use rfidhub_core::{CallError, Circulation, ItemResult, SipConfig};
use tracing::{debug, warn};

use crate::error::{SipError, SipResult};
use crate::message;
use crate::pool::SipPool;

/// SIP2 circulation client shared by all stations.
#[derive(Clone)]
pub struct SipClient {
    pool: Arc<SipPool>,
}

impl SipClient {
    pub fn new(config: SipConfig) -> Self {
        Self {
            pool: Arc::new(SipPool::new(config)),
        }
    }

    pub fn pool(&self) -> &Arc<SipPool> {
        &self.pool
    }

    /// Run one request/response exchange under the call timeout.
    async fn exchange(&self, request: String) -> SipResult<String> {
        let timeout = self.pool.config().call_timeout();
        let call = async {
            let mut conn = self.pool.acquire().await?;
            let reply = conn.call(&request).await?;
            conn.release();
            Ok::<_, SipError>(reply)
        };
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| SipError::Timeout(timeout.as_secs()))?
    }
}

fn to_call_error(op: &str, barcode: &str, e: SipError) -> CallError {
    warn!(op, barcode, error = %e, "SIP call failed");
    CallError::new(e.to_string())
}

#[async_trait]
impl Circulation for SipClient {
    async fn checkin(&self, branch: &str, barcode: &str) -> Result<ItemResult, CallError> {
        let cfg = self.pool.config();
        let request = message::checkin(
            &message::timestamp(&Local::now()),
            branch,
            &cfg.institution,
            barcode,
            &cfg.terminal_password,
        );
        let result = self
            .exchange(request)
            .await
            .and_then(|reply| message::parse_checkin(&reply, barcode))
            .map_err(|e| to_call_error("checkin", barcode, e))?;
        debug!(barcode, ok = !result.transaction_failed, "checkin done");
        Ok(result)
    }

    async fn item_status(&self, barcode: &str) -> Result<ItemResult, CallError> {
        let cfg = self.pool.config();
        let request = message::item_information(
            &message::timestamp(&Local::now()),
            &cfg.institution,
            barcode,
            &cfg.terminal_password,
        );
        self.exchange(request)
            .await
            .and_then(|reply| message::parse_item_information(&reply, barcode))
            .map_err(|e| to_call_error("item_status", barcode, e))
    }
}
