#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use uuid::Uuid;

use vivah_access::clock::FixedClock;
use vivah_access::config::EnginePolicy;
use vivah_access::events::Notifier;
use vivah_access::models::{Interest, PrivacySettings};
use vivah_access::object_storage::MemoryObjectStorage;
use vivah_access::services::audit::MemoryAuditLog;
use vivah_access::services::visibility::Viewer;
use vivah_access::store::MemoryStore;
use vivah_access::{AccessEngine, EngineDeps};
use vivah_shared::types::auth::SubscriptionTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Received(Uuid),
    Accepted(Uuid),
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn interest_received(&self, interest: &Interest) {
        self.sent.lock().push(Notification::Received(interest.id));
    }

    async fn interest_accepted(&self, interest: &Interest) {
        self.sent.lock().push(Notification::Accepted(interest.id));
    }
}

pub struct Harness {
    pub engine: AccessEngine,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub storage: Arc<MemoryObjectStorage>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(EnginePolicy::default())
    }

    pub fn with_policy(policy: EnginePolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let storage = Arc::new(MemoryObjectStorage::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(FixedClock::new(start_time()));

        let engine = AccessEngine::new(
            EngineDeps {
                store: store.clone(),
                clock: clock.clone(),
                audit_sink: audit.clone(),
                notifier: notifier.clone(),
                storage: storage.clone(),
            },
            policy,
        );

        Self { engine, store, audit, storage, notifier, clock }
    }

    /// A user with a profile row (a registered member) using default privacy settings.
    pub async fn member(&self) -> Uuid {
        self.member_with(PrivacySettings::default()).await
    }

    pub async fn member_with(&self, settings: PrivacySettings) -> Uuid {
        let id = Uuid::now_v7();
        self.engine.visibility.update_privacy(id, settings).await.unwrap();
        id
    }

    /// Send `from -> to` and have `to` accept it.
    pub async fn connect(&self, from: Uuid, to: Uuid) -> Interest {
        use vivah_access::services::interests::Decision;
        let interest = self.engine.interests.send_interest(from, to).await.unwrap();
        self.engine
            .interests
            .respond_to_interest(interest.id, to, Decision::Accept)
            .await
            .unwrap()
    }
}

pub fn free(id: Uuid) -> Viewer {
    Viewer::new(id, SubscriptionTier::Free)
}

pub fn premium(id: Uuid) -> Viewer {
    Viewer::new(id, SubscriptionTier::Premium)
}

/// Incompressible RGB noise, so encoded sizes stay well above the intake minimum.
pub fn noise(width: u32, height: u32) -> RgbImage {
    let mut seed: u32 = 0x9E37_79B9;
    ImageBuffer::from_fn(width, height, |_, _| {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [r, g, b, _] = seed.to_le_bytes();
        Rgb([r, g, b])
    })
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    noise(width, height)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 95)
        .encode_image(&noise(width, height))
        .unwrap();
    out
}
