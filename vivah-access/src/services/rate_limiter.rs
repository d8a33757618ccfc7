use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use vivah_shared::errors::{AppError, AppResult, ErrorCode};

use crate::clock::{date_key, next_utc_midnight, Clock};
use crate::store::{AccessStore, StoreExt, StoreTx};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuotaStatus {
    pub quota: u32,
    pub used: u32,
    pub remaining: u32,
    pub resets_at: DateTime<Utc>,
}

/// Daily outbound-interest quota keyed by `(user, UTC date)`. The date key rolls over at
/// midnight, so no reset job exists; old counters are simply never read again.
pub struct RateLimiter {
    store: Arc<dyn AccessStore>,
    clock: Arc<dyn Clock>,
    quota: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn AccessStore>, clock: Arc<dyn Clock>, quota: u32) -> Self {
        Self { store, clock, quota }
    }

    /// Reserve one send inside an existing transaction, so the reservation commits or rolls
    /// back together with whatever the caller writes.
    pub fn reserve_in(&self, tx: &mut dyn StoreTx, user_id: Uuid) -> AppResult<u32> {
        let now = self.clock.now();
        let key = date_key(now);

        match tx.increment_counter_if_below(user_id, &key, self.quota)? {
            Some(count) => {
                tracing::debug!(user_id = %user_id, date_key = %key, count, quota = self.quota, "interest quota reserved");
                Ok(count)
            }
            None => {
                counter!("rate_limit_rejections_total").increment(1);
                tracing::info!(user_id = %user_id, date_key = %key, quota = self.quota, "daily interest quota reached");
                Err(AppError::with_details(
                    ErrorCode::RateLimitExceeded,
                    format!("daily limit of {} interests reached", self.quota),
                    serde_json::json!({
                        "quota": self.quota,
                        "resets_at": next_utc_midnight(now),
                    }),
                ))
            }
        }
    }

    /// Standalone check-and-reserve in its own transaction.
    pub fn check_and_reserve(&self, user_id: Uuid) -> AppResult<u32> {
        self.store.transaction(|tx| self.reserve_in(tx, user_id))
    }

    pub fn status(&self, user_id: Uuid) -> AppResult<QuotaStatus> {
        let now = self.clock.now();
        let key = date_key(now);
        let used = self.store.transaction(|tx| tx.counter_value(user_id, &key))?;

        Ok(QuotaStatus {
            quota: self.quota,
            used,
            remaining: self.quota.saturating_sub(used),
            resets_at: next_utc_midnight(now),
        })
    }
}
