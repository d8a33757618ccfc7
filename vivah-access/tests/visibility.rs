mod common;

use uuid::Uuid;

use common::{free, premium, Harness};
use vivah_access::models::{AudienceTier, PrivacySettings, ProfileVisibility, RelationshipState};
use vivah_access::services::audit::AuditEventType;
use vivah_access::services::interests::Decision;
use vivah_access::services::visibility::{AccessDecision, DataCategory};

fn settings(visibility: ProfileVisibility, photos: AudienceTier, contact: AudienceTier) -> PrivacySettings {
    PrivacySettings {
        visibility,
        photo_visibility: photos,
        contact_visibility: contact,
        blur_photos_for_free: false,
    }
}

#[tokio::test]
async fn premium_profile_opens_to_free_viewer_after_acceptance() {
    let h = Harness::new();
    let a = h.member().await;
    let b = h
        .member_with(settings(ProfileVisibility::Premium, AudienceTier::All, AudienceTier::Premium))
        .await;

    let before = h
        .engine
        .visibility
        .resolve(&free(a), b, DataCategory::Profile)
        .await
        .unwrap();
    assert_eq!(before, AccessDecision::Deny);

    let interest = h.engine.interests.send_interest(a, b).await.unwrap();
    let pending = h
        .engine
        .visibility
        .resolve(&free(a), b, DataCategory::Profile)
        .await
        .unwrap();
    assert_eq!(pending, AccessDecision::Deny);

    h.engine
        .interests
        .respond_to_interest(interest.id, b, Decision::Accept)
        .await
        .unwrap();
    let after = h
        .engine
        .visibility
        .resolve(&free(a), b, DataCategory::Profile)
        .await
        .unwrap();
    assert_eq!(after, AccessDecision::Allow);
}

#[tokio::test]
async fn private_contact_is_never_unlocked_by_subscription() {
    let h = Harness::new();
    let viewer = h.member().await;
    let subject = h
        .member_with(settings(ProfileVisibility::Public, AudienceTier::All, AudienceTier::Private))
        .await;

    let access = h.engine.visibility.resolve_all(&premium(viewer), subject).await.unwrap();
    assert_eq!(access.profile, AccessDecision::Allow);
    assert_eq!(access.contact, AccessDecision::Deny);

    h.connect(subject, viewer).await;
    let access = h.engine.visibility.resolve_all(&premium(viewer), subject).await.unwrap();
    assert_eq!(access.relationship, RelationshipState::Accepted);
    assert_eq!(access.contact, AccessDecision::Allow);
}

#[tokio::test]
async fn private_profile_denies_premium_until_accepted() {
    let h = Harness::new();
    let viewer = h.member().await;
    let subject = h
        .member_with(settings(ProfileVisibility::Private, AudienceTier::Private, AudienceTier::Private))
        .await;

    let access = h.engine.visibility.resolve_all(&premium(viewer), subject).await.unwrap();
    assert_eq!(
        (access.profile, access.photo, access.contact),
        (AccessDecision::Deny, AccessDecision::Deny, AccessDecision::Deny)
    );

    h.connect(viewer, subject).await;
    let access = h.engine.visibility.resolve_all(&free(viewer), subject).await.unwrap();
    assert_eq!(
        (access.profile, access.photo, access.contact),
        (AccessDecision::Allow, AccessDecision::Allow, AccessDecision::Allow)
    );
}

#[tokio::test]
async fn community_profile_requires_a_registered_viewer() {
    let h = Harness::new();
    let subject = h.member().await;
    let stranger = Uuid::now_v7();
    let member = h.member().await;

    let denied = h
        .engine
        .visibility
        .resolve(&free(stranger), subject, DataCategory::Profile)
        .await
        .unwrap();
    assert_eq!(denied, AccessDecision::Deny);

    let allowed = h
        .engine
        .visibility
        .resolve(&free(member), subject, DataCategory::Profile)
        .await
        .unwrap();
    assert_eq!(allowed, AccessDecision::Allow);
}

#[tokio::test]
async fn blur_flag_blurs_photos_for_free_viewers_only() {
    let h = Harness::new();
    let subject = h
        .member_with(PrivacySettings { blur_photos_for_free: true, ..PrivacySettings::default() })
        .await;
    let viewer = h.member().await;

    let as_free = h
        .engine
        .visibility
        .resolve(&free(viewer), subject, DataCategory::Photo)
        .await
        .unwrap();
    assert_eq!(as_free, AccessDecision::Blurred);

    let as_premium = h
        .engine
        .visibility
        .resolve(&premium(viewer), subject, DataCategory::Photo)
        .await
        .unwrap();
    assert_eq!(as_premium, AccessDecision::Allow);
}

#[tokio::test]
async fn self_view_is_always_allowed_and_unaudited() {
    let h = Harness::new();
    let me = h
        .member_with(settings(ProfileVisibility::Private, AudienceTier::Private, AudienceTier::Private))
        .await;

    let access = h.engine.visibility.resolve_all(&free(me), me).await.unwrap();
    assert_eq!(access.profile, AccessDecision::Allow);
    assert_eq!(access.contact, AccessDecision::Allow);
    assert_eq!(h.audit.count_of(AuditEventType::VisibilityDecided), 0);
}

#[tokio::test]
async fn decisions_are_audited_with_the_viewer_as_actor() {
    let h = Harness::new();
    let (viewer, subject) = (h.member().await, h.member().await);

    h.engine.visibility.resolve_all(&free(viewer), subject).await.unwrap();

    let events = h.audit.events_for(viewer);
    let decided: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == AuditEventType::VisibilityDecided)
        .collect();
    assert_eq!(decided.len(), 1);
    assert_eq!(decided[0].payload["subject_id"], serde_json::json!(subject));
    assert_eq!(decided[0].payload["decisions"]["contact"], "deny");
    assert_eq!(decided[0].payload["decisions"]["profile"], "allow");
}

#[tokio::test]
async fn missing_profile_reads_as_defaults() {
    let h = Harness::new();
    let nobody = Uuid::now_v7();
    assert_eq!(h.engine.visibility.get_privacy(nobody).unwrap(), PrivacySettings::default());
}
