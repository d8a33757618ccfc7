mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::{free, jpeg_bytes, png_bytes, premium, Harness};
use vivah_access::config::EnginePolicy;
use vivah_access::models::{AudienceTier, PrivacySettings};
use vivah_access::services::audit::AuditEventType;
use vivah_access::services::photos::{PhotoFormat, PhotoPolicy};
use vivah_access::services::visibility::AccessDecision;
use vivah_shared::errors::{ErrorCategory, ErrorCode};
use vivah_shared::types::auth::{AuthUser, SubscriptionTier, UserRole};

fn primaries(h: &Harness, owner: Uuid) -> Vec<Uuid> {
    h.store
        .photos()
        .into_iter()
        .filter(|p| p.owner_id == owner && p.is_primary)
        .map(|p| p.id)
        .collect()
}

fn auto_approving() -> EnginePolicy {
    EnginePolicy {
        photos: PhotoPolicy { require_approval: false, ..PhotoPolicy::default() },
        ..EnginePolicy::default()
    }
}

#[tokio::test]
async fn upload_compresses_and_stores_under_the_owner() {
    let h = Harness::new();
    let owner = h.member().await;
    let original = png_bytes(480, 480);

    let photo = h.engine.photos.upload(owner, "image/png", original.clone()).await.unwrap();

    assert!(photo.is_primary);
    assert!(!photo.is_approved);
    assert_eq!((photo.width, photo.height), (480, 480));
    assert_eq!(photo.original_byte_size, original.len() as u64);
    assert!(photo.compression_ratio > 0.0);
    assert!(photo.storage_key.starts_with(&format!("users/{owner}/")));

    let stored = h.storage.get(&photo.storage_key).unwrap();
    assert_eq!(stored.content_type, "image/jpeg");
    assert_eq!(PhotoFormat::sniff(&stored.bytes), Some(PhotoFormat::Jpeg));
    assert_eq!(stored.bytes.len() as u64, photo.byte_size);

    let uploaded = h.audit.events_for(owner);
    let event = uploaded
        .iter()
        .find(|e| e.event_type == AuditEventType::PhotoUploaded)
        .unwrap();
    assert_eq!(event.payload["width"], 480);
    assert_eq!(event.payload["original_byte_size"], original.len() as u64);
    assert!(event.payload["compression_ratio"].is_f64());
}

#[tokio::test]
async fn approval_flag_follows_policy() {
    let h = Harness::with_policy(auto_approving());
    let owner = h.member().await;
    let photo = h.engine.photos.upload(owner, "image/jpeg", jpeg_bytes(480, 480)).await.unwrap();
    assert!(photo.is_approved);
}

#[tokio::test]
async fn png_declared_file_with_jpeg_signature_is_rejected() {
    let h = Harness::new();
    let owner = h.member().await;

    let err = h
        .engine
        .photos
        .upload(owner, "image/png", jpeg_bytes(480, 480))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SignatureMismatch));
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(err.details().unwrap()["errors"][0]["code"], "E5004");
    assert_eq!(h.storage.put_attempts(), 0);
    assert_eq!(h.audit.count_of(AuditEventType::PhotoRejected), 1);
}

#[tokio::test]
async fn six_megabyte_upload_is_rejected_before_any_storage_write() {
    let h = Harness::new();
    let owner = h.member().await;
    let mut oversized = vec![0xFF, 0xD8, 0xFF, 0xE0];
    oversized.resize(6 * 1024 * 1024, 0);

    let err = h.engine.photos.upload(owner, "image/jpeg", oversized).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PhotoTooLarge));
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(err.details().unwrap()["errors"].as_array().unwrap().len(), 1);
    assert_eq!(h.storage.put_attempts(), 0);
    assert!(h.store.photos().is_empty());
}

#[tokio::test]
async fn undersized_dimensions_are_rejected() {
    let h = Harness::new();
    let owner = h.member().await;
    let err = h
        .engine
        .photos
        .upload(owner, "image/png", png_bytes(399, 600))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::DimensionsOutOfRange));
    assert_eq!(h.storage.put_attempts(), 0);
}

#[tokio::test]
async fn storage_failure_aborts_the_record() {
    let h = Harness::new();
    let owner = h.member().await;
    h.storage.fail_puts(true);

    let err = h.engine.photos.upload(owner, "image/png", png_bytes(480, 480)).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::StorageFailure));
    assert_eq!(err.category(), ErrorCategory::Dependency);
    assert!(h.store.photos().is_empty());
}

#[tokio::test]
async fn database_failure_removes_the_stored_object() {
    let h = Harness::new();
    let owner = h.member().await;
    h.store.fail_photo_inserts(true);

    let err = h.engine.photos.upload(owner, "image/png", png_bytes(480, 480)).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Dependency);
    assert_eq!(h.storage.put_attempts(), 1);
    assert!(h.storage.is_empty());
    assert!(h.store.photos().is_empty());
}

#[tokio::test]
async fn exactly_one_primary_through_set_and_delete() {
    let h = Harness::with_policy(auto_approving());
    let owner = h.member().await;

    let first = h.engine.photos.upload(owner, "image/png", png_bytes(480, 480)).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(1));
    let second = h.engine.photos.upload(owner, "image/jpeg", jpeg_bytes(500, 450)).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(1));
    let third = h.engine.photos.upload(owner, "image/png", png_bytes(420, 420)).await.unwrap();
    assert!(!second.is_primary && !third.is_primary);
    assert_eq!(primaries(&h, owner), vec![first.id]);

    h.engine.photos.set_primary(owner, second.id).await.unwrap();
    assert_eq!(primaries(&h, owner), vec![second.id]);

    // Setting the current primary again is a no-op.
    h.engine.photos.set_primary(owner, second.id).await.unwrap();
    assert_eq!(primaries(&h, owner), vec![second.id]);

    let promoted = h.engine.photos.delete_photo(owner, second.id).await.unwrap();
    assert_eq!(promoted, Some(third.id));
    assert_eq!(primaries(&h, owner), vec![third.id]);
    assert!(h.storage.get(&second.storage_key).is_none());

    let promoted = h.engine.photos.delete_photo(owner, first.id).await.unwrap();
    assert_eq!(promoted, None);
    assert_eq!(primaries(&h, owner), vec![third.id]);
}

#[tokio::test]
async fn owners_cannot_touch_each_others_photos() {
    let h = Harness::new();
    let (owner, other) = (h.member().await, h.member().await);
    let photo = h.engine.photos.upload(owner, "image/png", png_bytes(480, 480)).await.unwrap();

    let err = h.engine.photos.set_primary(other, photo.id).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PhotoNotFound));
    let err = h.engine.photos.delete_photo(other, photo.id).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PhotoNotFound));
    assert_eq!(h.store.photos().len(), 1);
}

#[tokio::test]
async fn moderation_requires_the_role_and_gates_visibility() {
    let h = Harness::new();
    let (owner, viewer) = (h.member().await, h.member().await);
    let photo = h.engine.photos.upload(owner, "image/png", png_bytes(480, 480)).await.unwrap();

    // Unapproved photos are visible to the owner only.
    let own = h.engine.photos.visible_photos(&free(owner), owner).await.unwrap();
    assert_eq!(own.photos.len(), 1);
    let theirs = h.engine.photos.visible_photos(&premium(viewer), owner).await.unwrap();
    assert!(theirs.photos.is_empty());

    let user = AuthUser {
        id: viewer,
        role: UserRole::User,
        subscription_tier: SubscriptionTier::Free,
        token_id: Uuid::now_v7(),
    };
    let err = h.engine.photos.moderate_photo(&user, photo.id, true).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authorization);

    let moderator = AuthUser { role: UserRole::Moderator, ..user };
    h.engine.photos.moderate_photo(&moderator, photo.id, true).await.unwrap();

    let theirs = h.engine.photos.visible_photos(&premium(viewer), owner).await.unwrap();
    assert_eq!(theirs.decision, AccessDecision::Allow);
    assert_eq!(theirs.photos.len(), 1);
    assert!(!theirs.photos[0].blurred);
    assert_eq!(theirs.photos[0].url.as_deref(), Some(photo.url.as_str()));
    assert_eq!(h.audit.count_of(AuditEventType::PhotoModerated), 1);
}

#[tokio::test]
async fn gallery_respects_photo_tier_and_blur() {
    let h = Harness::with_policy(auto_approving());
    let owner = h
        .member_with(PrivacySettings { blur_photos_for_free: true, ..PrivacySettings::default() })
        .await;
    let viewer = h.member().await;
    let stored = h.engine.photos.upload(owner, "image/png", png_bytes(480, 480)).await.unwrap();

    let blurred = h.engine.photos.visible_photos(&free(viewer), owner).await.unwrap();
    assert_eq!(blurred.decision, AccessDecision::Blurred);
    assert_eq!(blurred.photos.len(), 1);
    assert!(blurred.photos.iter().all(|p| p.blurred && p.url.is_none()));
    let body = serde_json::to_string(&blurred).unwrap();
    assert!(!body.contains(&stored.url));
    assert!(!body.contains(&stored.storage_key));

    let clear = h.engine.photos.visible_photos(&premium(viewer), owner).await.unwrap();
    assert_eq!(clear.decision, AccessDecision::Allow);
    assert_eq!(clear.photos[0].url.as_deref(), Some(stored.url.as_str()));

    h.engine
        .visibility
        .update_privacy(
            owner,
            PrivacySettings { photo_visibility: AudienceTier::Private, ..PrivacySettings::default() },
        )
        .await
        .unwrap();
    let denied = h.engine.photos.visible_photos(&premium(viewer), owner).await.unwrap();
    assert_eq!(denied.decision, AccessDecision::Deny);
    assert!(denied.photos.is_empty());
}

#[tokio::test]
async fn storage_delete_failure_does_not_resurrect_the_record() {
    let h = Harness::new();
    let owner = h.member().await;
    let photo = h.engine.photos.upload(owner, "image/png", png_bytes(480, 480)).await.unwrap();
    h.storage.fail_deletes(true);

    h.engine.photos.delete_photo(owner, photo.id).await.unwrap();
    assert!(h.store.photos().is_empty());
    assert!(h.storage.get(&photo.storage_key).is_some());
    assert_eq!(h.audit.count_of(AuditEventType::PhotoDeleted), 1);
}

#[tokio::test]
async fn deleting_the_primary_promotes_the_newest_even_within_one_instant() {
    let h = Harness::with_policy(auto_approving());
    let owner = h.member().await;

    let first = h.engine.photos.upload(owner, "image/png", png_bytes(480, 480)).await.unwrap();
    let second = h.engine.photos.upload(owner, "image/png", png_bytes(440, 440)).await.unwrap();
    let third = h.engine.photos.upload(owner, "image/png", png_bytes(420, 420)).await.unwrap();
    assert_eq!(first.created_at, third.created_at);
    assert_eq!(primaries(&h, owner), vec![first.id]);

    let promoted = h.engine.photos.delete_photo(owner, first.id).await.unwrap();
    assert_eq!(promoted, Some(third.id));
    assert_ne!(promoted, Some(second.id));
    assert_eq!(primaries(&h, owner), vec![third.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_uploads_all_succeed_with_one_primary() {
    let h = Arc::new(Harness::new());
    let owner = h.member().await;

    let tasks: Vec<_> = (0..4u32)
        .map(|i| {
            let h = h.clone();
            let bytes = png_bytes(400 + i * 10, 420);
            tokio::spawn(async move { h.engine.photos.upload(owner, "image/png", bytes).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.store.photos().len(), 4);
    assert_eq!(primaries(&h, owner).len(), 1);
    assert_eq!(h.storage.put_attempts(), 4);
}
