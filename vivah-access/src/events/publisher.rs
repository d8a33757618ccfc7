use vivah_shared::clients::rabbitmq::RabbitMQClient;
use vivah_shared::types::event::{routing_keys, payloads, Event};

use crate::models::Interest;

/// Out-of-band notification dispatch. Fire-and-forget: implementations log failures and
/// never report them back, so a broker outage cannot undo an interest transition.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn interest_received(&self, interest: &Interest);
    async fn interest_accepted(&self, interest: &Interest);
}

pub struct RabbitNotifier {
    rabbitmq: RabbitMQClient,
}

impl RabbitNotifier {
    pub fn new(rabbitmq: RabbitMQClient) -> Self {
        Self { rabbitmq }
    }
}

#[async_trait::async_trait]
impl Notifier for RabbitNotifier {
    async fn interest_received(&self, interest: &Interest) {
        let event = Event::new(
            "vivah-access",
            routing_keys::ACCESS_INTEREST_SENT,
            payloads::InterestSent {
                interest_id: interest.id,
                sender_id: interest.sender_id,
                receiver_id: interest.receiver_id,
            },
        )
        .with_user(interest.receiver_id);

        if let Err(e) = self.rabbitmq.publish(routing_keys::ACCESS_INTEREST_SENT, &event).await {
            tracing::error!(error = %e, interest_id = %interest.id, "failed to publish interest.sent event");
        }
    }

    async fn interest_accepted(&self, interest: &Interest) {
        let event = Event::new(
            "vivah-access",
            routing_keys::ACCESS_INTEREST_ACCEPTED,
            payloads::InterestAccepted {
                interest_id: interest.id,
                sender_id: interest.sender_id,
                receiver_id: interest.receiver_id,
            },
        )
        .with_user(interest.sender_id);

        if let Err(e) = self.rabbitmq.publish(routing_keys::ACCESS_INTEREST_ACCEPTED, &event).await {
            tracing::error!(error = %e, interest_id = %interest.id, "failed to publish interest.accepted event");
        }
    }
}
