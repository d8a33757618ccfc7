use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `vivah.{domain}.{entity}.{action}`
/// Example: `vivah.access.interest.sent`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Interest notifications
    pub const ACCESS_INTEREST_SENT: &str = "vivah.access.interest.sent";
    pub const ACCESS_INTEREST_ACCEPTED: &str = "vivah.access.interest.accepted";

    /// Prefix for audit events; the event type is appended, e.g. `vivah.access.audit.interest_sent`.
    pub const ACCESS_AUDIT_PREFIX: &str = "vivah.access.audit";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct InterestSent {
        pub interest_id: Uuid,
        pub sender_id: Uuid,
        pub receiver_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct InterestAccepted {
        pub interest_id: Uuid,
        pub sender_id: Uuid,
        pub receiver_id: Uuid,
    }
}
