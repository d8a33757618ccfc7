use std::sync::Arc;

use chrono::Duration;
use metrics::counter;
use serde::Deserialize;
use uuid::Uuid;

use vivah_shared::errors::{AppError, AppResult, ErrorCode};
use vivah_shared::types::pagination::{Paginated, PaginationParams};

use crate::clock::Clock;
use crate::events::Notifier;
use crate::models::{Interest, InterestAction, InterestFilter, InterestStatus, RelationshipState};
use crate::services::audit::{AuditEventType, AuditLog};
use crate::services::rate_limiter::RateLimiter;
use crate::store::{AccessStore, StoreExt};

#[derive(Debug, Clone)]
pub struct InterestPolicy {
    pub daily_quota: u32,
    /// How long a rejected sender must wait before proposing to the same receiver again.
    /// Zero disables the cooldown. Revoked interests never impose one.
    pub resend_cooldown: Duration,
}

impl Default for InterestPolicy {
    fn default() -> Self {
        Self {
            daily_quota: 10,
            resend_cooldown: Duration::days(7),
        }
    }
}

/// Receiver's answer to a pending interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl From<Decision> for InterestAction {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => InterestAction::Accept,
            Decision::Reject => InterestAction::Reject,
        }
    }
}

pub struct InterestService {
    store: Arc<dyn AccessStore>,
    clock: Arc<dyn Clock>,
    rate_limiter: Arc<RateLimiter>,
    notifier: Arc<dyn Notifier>,
    audit: AuditLog,
    policy: InterestPolicy,
}

impl InterestService {
    pub fn new(
        store: Arc<dyn AccessStore>,
        clock: Arc<dyn Clock>,
        rate_limiter: Arc<RateLimiter>,
        notifier: Arc<dyn Notifier>,
        audit: AuditLog,
        policy: InterestPolicy,
    ) -> Self {
        Self { store, clock, rate_limiter, notifier, audit, policy }
    }

    /// Create a pending interest from `sender_id` to `receiver_id`.
    ///
    /// Checks run in order: self-interest, an active interest in either direction, the
    /// rejection cooldown, then the daily quota. The quota reservation and the insert share one
    /// transaction, so a failed insert never consumes quota.
    pub async fn send_interest(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<Interest> {
        if sender_id == receiver_id {
            return Err(AppError::new(ErrorCode::SelfInterest, "you cannot send an interest to yourself"));
        }

        let now = self.clock.now();
        let result = self.store.transaction(|tx| {
            tx.lock_pair(sender_id, receiver_id)?;
            let history = tx.interests_between(sender_id, receiver_id)?;

            if let Some(active) = history.iter().find(|i| i.status.is_active()) {
                let direction = if active.sender_id == sender_id { "outgoing" } else { "incoming" };
                return Err(AppError::with_details(
                    ErrorCode::DuplicateActiveInterest,
                    format!("an {} interest already exists between these users", active.status),
                    serde_json::json!({
                        "interest_id": active.id,
                        "status": active.status,
                        "direction": direction,
                    }),
                ));
            }

            if self.policy.resend_cooldown > Duration::zero() {
                let last_rejection = history
                    .iter()
                    .filter(|i| i.sender_id == sender_id && i.status == InterestStatus::Rejected)
                    .filter_map(|i| i.responded_at)
                    .max();
                if let Some(rejected_at) = last_rejection {
                    let available_at = rejected_at + self.policy.resend_cooldown;
                    if now < available_at {
                        return Err(AppError::with_details(
                            ErrorCode::InterestCooldownActive,
                            "this member declined your previous interest; please wait before sending another",
                            serde_json::json!({ "available_at": available_at }),
                        ));
                    }
                }
            }

            self.rate_limiter.reserve_in(tx, sender_id)?;

            let interest = Interest::new_pending(sender_id, receiver_id, now);
            tx.insert_interest(&interest)?;
            Ok(interest)
        });

        let interest = match result {
            Ok(interest) => interest,
            Err(err) => {
                if err.code() == Some(ErrorCode::RateLimitExceeded) {
                    self.audit
                        .emit(
                            sender_id,
                            AuditEventType::InterestRateLimited,
                            serde_json::json!({ "receiver_id": receiver_id, "quota": self.policy.daily_quota }),
                        )
                        .await;
                }
                return Err(err);
            }
        };

        counter!("interest_transitions_total", "transition" => "sent").increment(1);
        tracing::info!(
            interest_id = %interest.id,
            sender_id = %sender_id,
            receiver_id = %receiver_id,
            "interest sent"
        );

        self.audit
            .emit(
                sender_id,
                AuditEventType::InterestSent,
                serde_json::json!({ "interest_id": interest.id, "receiver_id": receiver_id }),
            )
            .await;
        self.notifier.interest_received(&interest).await;

        Ok(interest)
    }

    /// Receiver accepts or rejects a pending interest.
    pub async fn respond_to_interest(
        &self,
        interest_id: Uuid,
        responder_id: Uuid,
        decision: Decision,
    ) -> AppResult<Interest> {
        let interest = self.transition(interest_id, responder_id, decision.into())?;

        let event_type = match decision {
            Decision::Accept => AuditEventType::InterestAccepted,
            Decision::Reject => AuditEventType::InterestRejected,
        };
        self.audit
            .emit(
                responder_id,
                event_type,
                serde_json::json!({ "interest_id": interest.id, "sender_id": interest.sender_id }),
            )
            .await;

        if decision == Decision::Accept {
            self.notifier.interest_accepted(&interest).await;
        }

        Ok(interest)
    }

    /// Sender withdraws an interest the receiver has not answered yet.
    pub async fn revoke_interest(&self, interest_id: Uuid, sender_id: Uuid) -> AppResult<Interest> {
        let interest = self.transition(interest_id, sender_id, InterestAction::Revoke)?;

        self.audit
            .emit(
                sender_id,
                AuditEventType::InterestRevoked,
                serde_json::json!({ "interest_id": interest.id, "receiver_id": interest.receiver_id }),
            )
            .await;

        Ok(interest)
    }

    fn transition(&self, interest_id: Uuid, actor_id: Uuid, action: InterestAction) -> AppResult<Interest> {
        let now = self.clock.now();

        let interest = self.store.transaction(|tx| {
            let mut interest = tx
                .find_interest(interest_id)?
                .ok_or_else(|| AppError::new(ErrorCode::InterestNotFound, "interest not found"))?;

            let permitted_actor = match action {
                InterestAction::Accept | InterestAction::Reject => interest.receiver_id,
                InterestAction::Revoke => interest.sender_id,
            };
            if actor_id != permitted_actor {
                let message = match action {
                    InterestAction::Revoke => "only the sender can revoke this interest",
                    _ => "only the receiver can respond to this interest",
                };
                return Err(AppError::new(ErrorCode::NotAuthorized, message));
            }

            let next = interest.status.apply(action).ok_or_else(|| invalid_transition(&interest, action))?;

            // Compare-and-set: a concurrent responder that got there first leaves us with 0 rows.
            if !tx.update_interest_status(interest.id, interest.status, next, now)? {
                return Err(invalid_transition(&interest, action));
            }

            interest.status = next;
            interest.responded_at = Some(now);
            Ok(interest)
        })?;

        counter!("interest_transitions_total", "transition" => interest.status.as_str()).increment(1);
        tracing::info!(
            interest_id = %interest.id,
            actor_id = %actor_id,
            action = %action,
            status = %interest.status,
            "interest transitioned"
        );

        Ok(interest)
    }

    pub fn list_sent(&self, user_id: Uuid, params: &PaginationParams) -> AppResult<Paginated<Interest>> {
        let filter = InterestFilter { sender_id: Some(user_id), ..Default::default() };
        self.list(&filter, params)
    }

    pub fn list_received(
        &self,
        user_id: Uuid,
        status: Option<InterestStatus>,
        params: &PaginationParams,
    ) -> AppResult<Paginated<Interest>> {
        let filter = InterestFilter { receiver_id: Some(user_id), status, ..Default::default() };
        self.list(&filter, params)
    }

    fn list(&self, filter: &InterestFilter, params: &PaginationParams) -> AppResult<Paginated<Interest>> {
        let (items, total) = self
            .store
            .transaction(|tx| tx.list_interests(filter, params.offset(), params.limit()))?;
        Ok(Paginated::new(items, total, params))
    }

    /// Relationship between two users across both directions.
    pub fn interest_between(&self, a: Uuid, b: Uuid) -> AppResult<RelationshipState> {
        let history = self.store.transaction(|tx| tx.interests_between(a, b))?;
        Ok(RelationshipState::from_interests(&history))
    }
}

fn invalid_transition(interest: &Interest, action: InterestAction) -> AppError {
    AppError::with_details(
        ErrorCode::InvalidStateTransition,
        format!("cannot {action} an interest that is {}", interest.status),
        serde_json::json!({ "interest_id": interest.id, "status": interest.status }),
    )
}
