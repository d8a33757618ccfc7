use std::sync::Arc;

use uuid::Uuid;

use vivah_shared::errors::{AppError, AppResult, ErrorCode};

use crate::clock::Clock;
use crate::models::{Message, RelationshipState};
use crate::services::audit::{AuditEventType, AuditLog};
use crate::store::{AccessStore, StoreExt, StoreTx};

#[derive(Debug, Clone)]
pub struct MessagingPolicy {
    pub max_chars: usize,
}

impl Default for MessagingPolicy {
    fn default() -> Self {
        Self { max_chars: 2000 }
    }
}

/// Messaging opens only between two users joined by an accepted interest, in either direction.
pub struct MessagingGate {
    store: Arc<dyn AccessStore>,
    clock: Arc<dyn Clock>,
    audit: AuditLog,
    policy: MessagingPolicy,
}

fn accepted_between(tx: &mut dyn StoreTx, a: Uuid, b: Uuid) -> AppResult<bool> {
    if a == b {
        return Ok(false);
    }
    let history = tx.interests_between(a, b)?;
    Ok(RelationshipState::from_interests(&history).is_accepted())
}

impl MessagingGate {
    pub fn new(store: Arc<dyn AccessStore>, clock: Arc<dyn Clock>, audit: AuditLog, policy: MessagingPolicy) -> Self {
        Self { store, clock, audit, policy }
    }

    pub fn can_message(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<bool> {
        self.store.transaction(|tx| accepted_between(tx, sender_id, receiver_id))
    }

    /// Persist a message. The gate check and the insert share a transaction, so a message is
    /// only ever written while the pair holds an accepted interest.
    pub async fn send_message(&self, sender_id: Uuid, receiver_id: Uuid, content: &str) -> AppResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::new(ErrorCode::EmptyMessage, "message cannot be empty"));
        }
        let chars = content.chars().count();
        if chars > self.policy.max_chars {
            return Err(AppError::with_details(
                ErrorCode::MessageTooLong,
                format!("message exceeds {} characters", self.policy.max_chars),
                serde_json::json!({ "max_chars": self.policy.max_chars, "length": chars }),
            ));
        }

        let now = self.clock.now();
        let result = self.store.transaction(|tx| {
            if !accepted_between(tx, sender_id, receiver_id)? {
                return Err(AppError::new(
                    ErrorCode::MessagingNotAuthorized,
                    "messaging opens once an interest between you has been accepted",
                ));
            }
            let message = Message {
                id: Uuid::now_v7(),
                sender_id,
                receiver_id,
                content: content.to_string(),
                created_at: now,
            };
            tx.insert_message(&message)?;
            Ok(message)
        });

        match result {
            Ok(message) => {
                tracing::info!(message_id = %message.id, sender_id = %sender_id, receiver_id = %receiver_id, "message sent");
                self.audit
                    .emit(
                        sender_id,
                        AuditEventType::MessageSent,
                        serde_json::json!({ "message_id": message.id, "receiver_id": receiver_id }),
                    )
                    .await;
                Ok(message)
            }
            Err(err) => {
                if err.code() == Some(ErrorCode::MessagingNotAuthorized) {
                    tracing::info!(sender_id = %sender_id, receiver_id = %receiver_id, "message denied");
                    self.audit
                        .emit(
                            sender_id,
                            AuditEventType::MessageDenied,
                            serde_json::json!({ "receiver_id": receiver_id }),
                        )
                        .await;
                }
                Err(err)
            }
        }
    }
}
