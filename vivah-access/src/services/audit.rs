use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vivah_shared::clients::rabbitmq::RabbitMQClient;
use vivah_shared::errors::{AppError, AppResult};
use vivah_shared::types::event::{routing_keys, Event};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    InterestSent,
    InterestAccepted,
    InterestRejected,
    InterestRevoked,
    InterestRateLimited,
    VisibilityDecided,
    PrivacyUpdated,
    MessageSent,
    MessageDenied,
    PhotoUploaded,
    PhotoRejected,
    PhotoPrimarySet,
    PhotoDeleted,
    PhotoModerated,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::InterestSent => "interest_sent",
            AuditEventType::InterestAccepted => "interest_accepted",
            AuditEventType::InterestRejected => "interest_rejected",
            AuditEventType::InterestRevoked => "interest_revoked",
            AuditEventType::InterestRateLimited => "interest_rate_limited",
            AuditEventType::VisibilityDecided => "visibility_decided",
            AuditEventType::PrivacyUpdated => "privacy_updated",
            AuditEventType::MessageSent => "message_sent",
            AuditEventType::MessageDenied => "message_denied",
            AuditEventType::PhotoUploaded => "photo_uploaded",
            AuditEventType::PhotoRejected => "photo_rejected",
            AuditEventType::PhotoPrimarySet => "photo_primary_set",
            AuditEventType::PhotoDeleted => "photo_deleted",
            AuditEventType::PhotoModerated => "photo_moderated",
        }
    }
}

/// Immutable record of one access-control decision or lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub event_type: AuditEventType,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Append-only destination for audit events.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> AppResult<()>;
}

/// Publishes each event on `vivah.access.audit.<event_type>` for the security dashboard.
pub struct RabbitAuditSink {
    rabbitmq: RabbitMQClient,
}

impl RabbitAuditSink {
    pub fn new(rabbitmq: RabbitMQClient) -> Self {
        Self { rabbitmq }
    }
}

#[async_trait::async_trait]
impl AuditSink for RabbitAuditSink {
    async fn record(&self, event: &AuditEvent) -> AppResult<()> {
        let routing_key = format!("{}.{}", routing_keys::ACCESS_AUDIT_PREFIX, event.event_type.as_str());
        let envelope = Event::new("vivah-access", routing_key.as_str(), event)
            .with_user(event.actor_id)
            .with_correlation(event.id)
            .at(event.timestamp);

        self.rabbitmq
            .publish(&routing_key, &envelope)
            .await
            .map_err(|e| AppError::internal(format!("audit publish failed: {e}")))
    }
}

/// In-memory, insertion-ordered log. Read access mirrors what the dashboard sees.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    pub fn events_for(&self, actor_id: Uuid) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.actor_id == actor_id)
            .cloned()
            .collect()
    }

    pub fn count_of(&self, event_type: AuditEventType) -> usize {
        self.events.read().iter().filter(|e| e.event_type == event_type).count()
    }
}

#[async_trait::async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, event: &AuditEvent) -> AppResult<()> {
        self.events.write().push(event.clone());
        Ok(())
    }
}

/// Best-effort front for the sink: stamps events from the engine clock and never lets a sink
/// failure reach the caller.
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    pub async fn emit(&self, actor_id: Uuid, event_type: AuditEventType, payload: serde_json::Value) {
        let event = AuditEvent {
            id: Uuid::now_v7(),
            actor_id,
            event_type,
            payload,
            timestamp: self.clock.now(),
        };

        if let Err(e) = self.sink.record(&event).await {
            tracing::warn!(
                error = %e,
                event_id = %event.id,
                event_type = event_type.as_str(),
                "failed to record audit event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    struct BrokenSink;

    #[async_trait::async_trait]
    impl AuditSink for BrokenSink {
        async fn record(&self, _event: &AuditEvent) -> AppResult<()> {
            Err(AppError::internal("sink down"))
        }
    }

    #[tokio::test]
    async fn emit_stamps_clock_time() {
        let now = Utc::now();
        let log = Arc::new(MemoryAuditLog::new());
        let audit = AuditLog::new(log.clone(), Arc::new(FixedClock::new(now)));
        let actor = Uuid::now_v7();

        audit
            .emit(actor, AuditEventType::InterestSent, serde_json::json!({ "n": 1 }))
            .await;

        let events = log.events_for(actor);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, now);
        assert_eq!(events[0].event_type, AuditEventType::InterestSent);
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let audit = AuditLog::new(Arc::new(BrokenSink), Arc::new(FixedClock::new(Utc::now())));
        audit
            .emit(Uuid::now_v7(), AuditEventType::MessageDenied, serde_json::Value::Null)
            .await;
    }
}
