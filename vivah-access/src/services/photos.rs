use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader};
use metrics::counter;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use vivah_shared::errors::{AppError, AppResult, ErrorCode};
use vivah_shared::types::auth::AuthUser;

use crate::clock::Clock;
use crate::models::Photo;
use crate::object_storage::ObjectStorage;
use crate::services::audit::{AuditEventType, AuditLog};
use crate::services::visibility::{AccessDecision, DataCategory, Viewer, VisibilityResolver};
use crate::store::{AccessStore, StoreExt, StoreTx};

#[derive(Debug, Clone)]
pub struct PhotoPolicy {
    pub min_bytes: usize,
    pub max_bytes: usize,
    pub min_dimension: u32,
    pub max_dimension: u32,
    /// Size the re-encoded JPEG aims for; drives the quality ratio.
    pub target_bytes: usize,
    pub require_approval: bool,
}

impl Default for PhotoPolicy {
    fn default() -> Self {
        Self {
            min_bytes: 50 * 1024,
            max_bytes: 5 * 1024 * 1024,
            min_dimension: 400,
            max_dimension: 4000,
            target_bytes: 1024 * 1024,
            require_approval: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoFormat {
    Jpeg,
    Png,
    WebP,
}

impl PhotoFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(PhotoFormat::Jpeg),
            "image/png" => Some(PhotoFormat::Png),
            "image/webp" => Some(PhotoFormat::WebP),
            _ => None,
        }
    }

    /// Identify the format from the file's leading magic number, ignoring whatever the client
    /// declared.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(PhotoFormat::Jpeg),
            [0x89, b'P', b'N', b'G', ..] => Some(PhotoFormat::Png),
            [b'R', b'I', b'F', b'F', rest @ ..] => match rest.get(4..8) {
                Some(b"WEBP") | None => Some(PhotoFormat::WebP),
                Some(_) => None,
            },
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            PhotoFormat::Jpeg => "image/jpeg",
            PhotoFormat::Png => "image/png",
            PhotoFormat::WebP => "image/webp",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            PhotoFormat::Jpeg => ImageFormat::Jpeg,
            PhotoFormat::Png => ImageFormat::Png,
            PhotoFormat::WebP => ImageFormat::WebP,
        }
    }
}

/// One failed intake check, reported back so the client can show every problem at once.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckFailure {
    #[serde(skip)]
    pub kind: ErrorCode,
    pub code: &'static str,
    pub message: String,
}

impl CheckFailure {
    fn new(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self { kind, code: kind.code(), message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedImage {
    pub format: PhotoFormat,
    pub width: u32,
    pub height: u32,
}

/// The first failure names the error code; `details.errors` lists them all.
fn rejection(failures: Vec<CheckFailure>) -> AppError {
    let primary = failures.first().map(|f| f.kind).unwrap_or(ErrorCode::ValidationError);
    let message = failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    AppError::with_details(primary, message, serde_json::json!({ "errors": failures }))
}

/// Run the intake checks in order: size, declared type, magic number, then pixel dimensions.
/// The first three are all evaluated and reported together; dimensions are read only when
/// the bytes are already known to be a supported image.
pub fn validate(policy: &PhotoPolicy, declared_mime: &str, bytes: &[u8]) -> AppResult<ValidatedImage> {
    let mut failures = Vec::new();

    let size = bytes.len();
    if size < policy.min_bytes {
        failures.push(CheckFailure::new(
            ErrorCode::PhotoTooSmall,
            format!("photo is {size} bytes; the minimum is {} bytes", policy.min_bytes),
        ));
    } else if size > policy.max_bytes {
        failures.push(CheckFailure::new(
            ErrorCode::PhotoTooLarge,
            format!("photo is {size} bytes; the maximum is {} bytes", policy.max_bytes),
        ));
    }

    let declared = PhotoFormat::from_mime(declared_mime);
    if declared.is_none() {
        failures.push(CheckFailure::new(
            ErrorCode::UnsupportedMimeType,
            format!("{declared_mime} is not accepted; use JPEG, PNG or WebP"),
        ));
    }

    let sniffed = PhotoFormat::sniff(bytes);
    match (declared, sniffed) {
        (_, None) => failures.push(CheckFailure::new(
            ErrorCode::SignatureMismatch,
            "file content is not a JPEG, PNG or WebP image",
        )),
        (Some(declared), Some(actual)) if declared != actual => failures.push(CheckFailure::new(
            ErrorCode::SignatureMismatch,
            format!("file was declared as {} but its content is {}", declared.mime(), actual.mime()),
        )),
        _ => {}
    }

    let format = match sniffed {
        Some(format) if failures.is_empty() => format,
        _ => return Err(rejection(failures)),
    };

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format.image_format())
        .into_dimensions()
        .map_err(|e| {
            rejection(vec![CheckFailure::new(
                ErrorCode::UndecodableImage,
                format!("image could not be read: {e}"),
            )])
        })?;

    let in_range = |d: u32| (policy.min_dimension..=policy.max_dimension).contains(&d);
    if !in_range(width) || !in_range(height) {
        return Err(rejection(vec![CheckFailure::new(
            ErrorCode::DimensionsOutOfRange,
            format!(
                "photo is {width}x{height}; each side must be between {min} and {max} pixels",
                min = policy.min_dimension,
                max = policy.max_dimension
            ),
        )]));
    }

    Ok(ValidatedImage { format, width, height })
}

/// JPEG quality for a re-encode, `min(0.9, target / original)` scaled to 1..=100.
pub fn quality_for(target_bytes: usize, original_bytes: usize) -> u8 {
    if original_bytes == 0 {
        return 90;
    }
    let ratio = (target_bytes as f64 / original_bytes as f64).min(0.9);
    (ratio * 100.0).round().clamp(1.0, 100.0) as u8
}

fn compress(bytes: &[u8], format: PhotoFormat, quality: u8) -> AppResult<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(bytes, format.image_format()).map_err(|e| {
        rejection(vec![CheckFailure::new(
            ErrorCode::UndecodableImage,
            format!("image could not be decoded: {e}"),
        )])
    })?;
    let rgb = decoded.to_rgb8();

    let mut out = Vec::with_capacity(bytes.len() / 2);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| AppError::internal(format!("jpeg encode failed: {e}")))?;
    Ok(out)
}

/// `users/<owner>/<uuid v7>-<content hash prefix>.jpg`
fn storage_key(owner_id: Uuid, bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    format!("users/{owner_id}/{}-{}.jpg", Uuid::now_v7(), &digest[..16])
}

/// A photo as served to a viewer. Blurred views never carry the stored object's URL; clients
/// render a placeholder until the viewer is entitled to the original.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub url: Option<String>,
    pub is_primary: bool,
    pub is_approved: bool,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub blurred: bool,
}

impl PhotoView {
    fn new(photo: Photo, blurred: bool) -> Self {
        Self {
            id: photo.id,
            owner_id: photo.owner_id,
            url: if blurred { None } else { Some(photo.url) },
            is_primary: photo.is_primary,
            is_approved: photo.is_approved,
            width: photo.width,
            height: photo.height,
            created_at: photo.created_at,
            blurred,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoGallery {
    pub owner_id: Uuid,
    pub decision: AccessDecision,
    pub photos: Vec<PhotoView>,
}

pub struct PhotoService {
    store: Arc<dyn AccessStore>,
    storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn Clock>,
    visibility: Arc<VisibilityResolver>,
    audit: AuditLog,
    policy: PhotoPolicy,
}

fn owned_photo(tx: &mut dyn StoreTx, owner_id: Uuid, photo_id: Uuid) -> AppResult<Photo> {
    tx.lock_owner_photos(owner_id)?;
    tx.find_photo(photo_id)?
        .filter(|p| p.owner_id == owner_id)
        .ok_or_else(|| AppError::new(ErrorCode::PhotoNotFound, "photo not found"))
}

impl PhotoService {
    pub fn new(
        store: Arc<dyn AccessStore>,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
        visibility: Arc<VisibilityResolver>,
        audit: AuditLog,
        policy: PhotoPolicy,
    ) -> Self {
        Self { store, storage, clock, visibility, audit, policy }
    }

    /// Validate, compress, store and record a new photo. Nothing reaches object storage unless
    /// every check passes; a failed database write removes the stored object again.
    pub async fn upload(&self, owner_id: Uuid, declared_mime: &str, bytes: Vec<u8>) -> AppResult<Photo> {
        let original_size = bytes.len();

        let validated = match validate(&self.policy, declared_mime, &bytes) {
            Ok(v) => v,
            Err(err) => {
                counter!("photo_intake_total", "outcome" => "rejected").increment(1);
                tracing::info!(owner_id = %owner_id, declared_mime, size = original_size, error = %err, "photo rejected");
                self.audit
                    .emit(
                        owner_id,
                        AuditEventType::PhotoRejected,
                        serde_json::json!({
                            "declared_mime": declared_mime,
                            "byte_size": original_size,
                            "errors": err.details().and_then(|d| d.get("errors")).cloned(),
                        }),
                    )
                    .await;
                return Err(err);
            }
        };

        let quality = quality_for(self.policy.target_bytes, original_size);
        let format = validated.format;
        let compressed = tokio::task::spawn_blocking(move || compress(&bytes, format, quality))
            .await
            .map_err(|e| AppError::internal(format!("compression task failed: {e}")))??;

        let byte_size = compressed.len();
        let compression_ratio = byte_size as f64 / original_size as f64;
        let key = storage_key(owner_id, &compressed);

        let url = match self.storage.put(&key, compressed, "image/jpeg").await {
            Ok(url) => url,
            Err(err) => {
                counter!("photo_intake_total", "outcome" => "storage_failed").increment(1);
                tracing::error!(owner_id = %owner_id, key = %key, error = %err, "photo storage write failed");
                return Err(err);
            }
        };

        let now = self.clock.now();
        let is_approved = !self.policy.require_approval;
        let persisted = self.store.transaction(|tx| {
            // An owner with no photos yet has no rows to lock; the advisory lock covers that case.
            tx.lock_owner_photos(owner_id)?;
            let has_photos = !tx.photos_for(owner_id)?.is_empty();
            let photo = Photo {
                id: Uuid::now_v7(),
                owner_id,
                storage_key: key.clone(),
                url: url.clone(),
                is_primary: !has_photos,
                is_approved,
                width: validated.width,
                height: validated.height,
                byte_size: byte_size as u64,
                original_byte_size: original_size as u64,
                compression_ratio,
                created_at: now,
            };
            tx.insert_photo(&photo)?;
            Ok(photo)
        });

        let photo = match persisted {
            Ok(photo) => photo,
            Err(err) => {
                counter!("photo_intake_total", "outcome" => "persist_failed").increment(1);
                tracing::error!(owner_id = %owner_id, key = %key, error = %err, "photo record write failed; removing stored object");
                if let Err(cleanup) = self.storage.delete(&key).await {
                    tracing::error!(key = %key, error = %cleanup, "orphaned photo object left in storage");
                }
                return Err(err);
            }
        };

        counter!("photo_intake_total", "outcome" => "accepted").increment(1);
        tracing::info!(
            photo_id = %photo.id,
            owner_id = %owner_id,
            width = photo.width,
            height = photo.height,
            original_size,
            byte_size,
            quality,
            "photo stored"
        );
        self.audit
            .emit(
                owner_id,
                AuditEventType::PhotoUploaded,
                serde_json::json!({
                    "photo_id": photo.id,
                    "byte_size": photo.byte_size,
                    "original_byte_size": photo.original_byte_size,
                    "compression_ratio": photo.compression_ratio,
                    "width": photo.width,
                    "height": photo.height,
                    "is_primary": photo.is_primary,
                    "is_approved": photo.is_approved,
                }),
            )
            .await;

        Ok(photo)
    }

    pub async fn set_primary(&self, owner_id: Uuid, photo_id: Uuid) -> AppResult<Photo> {
        let photo = self.store.transaction(|tx| {
            let mut photo = owned_photo(tx, owner_id, photo_id)?;
            tx.set_primary_exclusive(owner_id, photo.id)?;
            photo.is_primary = true;
            Ok(photo)
        })?;

        tracing::info!(photo_id = %photo.id, owner_id = %owner_id, "primary photo changed");
        self.audit
            .emit(owner_id, AuditEventType::PhotoPrimarySet, serde_json::json!({ "photo_id": photo.id }))
            .await;
        Ok(photo)
    }

    /// Remove a photo. Deleting the primary promotes the newest remaining photo.
    pub async fn delete_photo(&self, owner_id: Uuid, photo_id: Uuid) -> AppResult<Option<Uuid>> {
        let (photo, promoted) = self.store.transaction(|tx| {
            let photo = owned_photo(tx, owner_id, photo_id)?;
            tx.delete_photo(photo.id)?;

            let mut promoted = None;
            if photo.is_primary {
                if let Some(next) = tx.photos_for(owner_id)?.into_iter().next() {
                    tx.set_primary_exclusive(owner_id, next.id)?;
                    promoted = Some(next.id);
                }
            }
            Ok((photo, promoted))
        })?;

        if let Err(e) = self.storage.delete(&photo.storage_key).await {
            tracing::warn!(photo_id = %photo.id, key = %photo.storage_key, error = %e, "photo object delete failed");
        }

        tracing::info!(photo_id = %photo.id, owner_id = %owner_id, promoted = ?promoted, "photo deleted");
        self.audit
            .emit(
                owner_id,
                AuditEventType::PhotoDeleted,
                serde_json::json!({ "photo_id": photo.id, "promoted_photo_id": promoted }),
            )
            .await;
        Ok(promoted)
    }

    pub async fn moderate_photo(&self, moderator: &AuthUser, photo_id: Uuid, approved: bool) -> AppResult<()> {
        if !moderator.is_moderator() {
            return Err(AppError::forbidden("moderator role required"));
        }

        let found = self.store.transaction(|tx| tx.set_photo_approved(photo_id, approved))?;
        if !found {
            return Err(AppError::new(ErrorCode::PhotoNotFound, "photo not found"));
        }

        tracing::info!(photo_id = %photo_id, moderator_id = %moderator.id, approved, "photo moderated");
        self.audit
            .emit(
                moderator.id,
                AuditEventType::PhotoModerated,
                serde_json::json!({ "photo_id": photo_id, "approved": approved }),
            )
            .await;
        Ok(())
    }

    /// Photos of `owner_id` the viewer may see. Owners see everything they uploaded; everyone
    /// else sees approved photos only, and nothing when the photo decision is a denial.
    pub async fn visible_photos(&self, viewer: &Viewer, owner_id: Uuid) -> AppResult<PhotoGallery> {
        let decision = self.visibility.resolve(viewer, owner_id, DataCategory::Photo).await?;
        let is_owner = viewer.id == owner_id;

        let photos = if decision.permits_view() {
            let blurred = decision == AccessDecision::Blurred;
            self.store
                .transaction(|tx| tx.photos_for(owner_id))?
                .into_iter()
                .filter(|p| is_owner || p.is_approved)
                .map(|photo| PhotoView::new(photo, blurred))
                .collect()
        } else {
            Vec::new()
        };

        Ok(PhotoGallery { owner_id, decision, photos })
    }
}
