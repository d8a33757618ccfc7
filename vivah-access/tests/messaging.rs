mod common;

use common::Harness;
use vivah_access::models::RelationshipState;
use vivah_access::services::audit::AuditEventType;
use vivah_access::services::interests::Decision;
use vivah_shared::errors::{ErrorCategory, ErrorCode};

#[tokio::test]
async fn messaging_opens_on_acceptance_in_either_direction() {
    let h = Harness::new();
    let (a, b) = (h.member().await, h.member().await);

    assert!(!h.engine.messaging.can_message(a, b).unwrap());

    let interest = h.engine.interests.send_interest(a, b).await.unwrap();
    assert!(!h.engine.messaging.can_message(a, b).unwrap());

    h.engine
        .interests
        .respond_to_interest(interest.id, b, Decision::Accept)
        .await
        .unwrap();
    assert!(h.engine.messaging.can_message(a, b).unwrap());
    assert!(h.engine.messaging.can_message(b, a).unwrap());

    let message = h.engine.messaging.send_message(b, a, "  Namaste!  ").await.unwrap();
    assert_eq!(message.content, "Namaste!");
    assert_eq!(h.store.messages().len(), 1);
    assert_eq!(h.audit.count_of(AuditEventType::MessageSent), 1);
}

#[tokio::test]
async fn send_without_acceptance_is_refused_and_nothing_is_written() {
    let h = Harness::new();
    let (a, b) = (h.member().await, h.member().await);
    let interest = h.engine.interests.send_interest(a, b).await.unwrap();
    h.engine
        .interests
        .respond_to_interest(interest.id, b, Decision::Reject)
        .await
        .unwrap();

    let err = h.engine.messaging.send_message(a, b, "hello").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::MessagingNotAuthorized));
    assert_eq!(err.category(), ErrorCategory::Authorization);
    assert!(h.store.messages().is_empty());
    assert_eq!(h.audit.count_of(AuditEventType::MessageDenied), 1);
}

#[tokio::test]
async fn nobody_can_message_themselves() {
    let h = Harness::new();
    let a = h.member().await;
    assert!(!h.engine.messaging.can_message(a, a).unwrap());
}

#[tokio::test]
async fn content_is_validated_before_the_gate() {
    let h = Harness::new();
    let (a, b) = (h.member().await, h.member().await);
    h.connect(a, b).await;

    let empty = h.engine.messaging.send_message(a, b, "   ").await.unwrap_err();
    assert_eq!(empty.code(), Some(ErrorCode::EmptyMessage));

    let long = "x".repeat(2001);
    let too_long = h.engine.messaging.send_message(a, b, &long).await.unwrap_err();
    assert_eq!(too_long.code(), Some(ErrorCode::MessageTooLong));
    assert_eq!(too_long.category(), ErrorCategory::Validation);

    assert!(h.store.messages().is_empty());
}

#[tokio::test]
async fn gate_tracks_the_relationship_through_its_lifecycle() {
    let h = Harness::new();
    let (a, b, c) = (h.member().await, h.member().await, h.member().await);

    let pending = h.engine.interests.send_interest(a, b).await.unwrap();
    assert_eq!(h.engine.interests.interest_between(a, b).unwrap(), RelationshipState::Pending);
    assert!(!h.engine.messaging.can_message(a, b).unwrap());

    h.engine
        .interests
        .respond_to_interest(pending.id, b, Decision::Accept)
        .await
        .unwrap();
    assert_eq!(h.engine.interests.interest_between(b, a).unwrap(), RelationshipState::Accepted);
    assert!(h.engine.messaging.can_message(b, a).unwrap());

    let declined = h.engine.interests.send_interest(c, a).await.unwrap();
    h.engine
        .interests
        .respond_to_interest(declined.id, a, Decision::Reject)
        .await
        .unwrap();
    assert_eq!(h.engine.interests.interest_between(a, c).unwrap(), RelationshipState::Rejected);
    assert!(!h.engine.messaging.can_message(a, c).unwrap());
}
