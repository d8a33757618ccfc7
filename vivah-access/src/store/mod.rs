//! Persistence boundary for the access-control engine.
//!
//! Every engine operation that mutates state runs inside [`StoreExt::transaction`]; the
//! closure's reads and writes commit together or not at all. Implementations must serialize
//! transactions that touch the same interest pair and make
//! [`StoreTx::increment_counter_if_below`] a single atomic check-and-increment.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use vivah_shared::errors::{AppError, AppResult};

use crate::models::{Interest, InterestFilter, InterestStatus, Message, Photo, PrivacySettings};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait AccessStore: Send + Sync {
    /// Run `f` atomically. `f` is invoked exactly once.
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn StoreTx) -> AppResult<()>,
    ) -> AppResult<()>;

    /// Cheap connectivity check for health endpoints.
    fn ping(&self) -> AppResult<()>;
}

pub trait StoreTx {
    // Profiles
    fn privacy_settings(&mut self, user_id: Uuid) -> AppResult<Option<PrivacySettings>>;
    fn upsert_privacy_settings(
        &mut self,
        user_id: Uuid,
        settings: &PrivacySettings,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    // Interests
    /// Hold an exclusive lock on the unordered pair until the transaction ends.
    fn lock_pair(&mut self, a: Uuid, b: Uuid) -> AppResult<()>;
    fn find_interest(&mut self, id: Uuid) -> AppResult<Option<Interest>>;
    /// Every interest between `a` and `b` in either direction, newest first.
    fn interests_between(&mut self, a: Uuid, b: Uuid) -> AppResult<Vec<Interest>>;
    fn insert_interest(&mut self, interest: &Interest) -> AppResult<()>;
    /// Compare-and-set on status. Returns `false` when the row is no longer in `expected`.
    fn update_interest_status(
        &mut self,
        id: Uuid,
        expected: InterestStatus,
        new_status: InterestStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<bool>;
    /// Newest first; returns the page and the total match count.
    fn list_interests(
        &mut self,
        filter: &InterestFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<Interest>, u64)>;

    // Daily counters
    /// Increment `(user_id, date_key)` only if it is below `quota`. Returns the new count, or
    /// `None` if the quota was already reached (nothing written).
    fn increment_counter_if_below(
        &mut self,
        user_id: Uuid,
        date_key: &str,
        quota: u32,
    ) -> AppResult<Option<u32>>;
    fn counter_value(&mut self, user_id: Uuid, date_key: &str) -> AppResult<u32>;

    // Photos
    /// Hold an exclusive lock on `owner_id`'s photo set until the transaction ends, including
    /// when the owner has no photos yet.
    fn lock_owner_photos(&mut self, owner_id: Uuid) -> AppResult<()>;
    fn insert_photo(&mut self, photo: &Photo) -> AppResult<()>;
    fn find_photo(&mut self, id: Uuid) -> AppResult<Option<Photo>>;
    /// Owner's photos, newest first.
    fn photos_for(&mut self, owner_id: Uuid) -> AppResult<Vec<Photo>>;
    /// Mark `photo_id` primary and clear the flag on every other photo of `owner_id`.
    fn set_primary_exclusive(&mut self, owner_id: Uuid, photo_id: Uuid) -> AppResult<()>;
    fn set_photo_approved(&mut self, id: Uuid, approved: bool) -> AppResult<bool>;
    fn delete_photo(&mut self, id: Uuid) -> AppResult<bool>;

    // Messages
    fn insert_message(&mut self, message: &Message) -> AppResult<()>;
}

pub trait StoreExt {
    fn transaction<T>(&self, f: impl FnOnce(&mut dyn StoreTx) -> AppResult<T>) -> AppResult<T>;
}

impl<S: AccessStore + ?Sized> StoreExt for S {
    fn transaction<T>(&self, f: impl FnOnce(&mut dyn StoreTx) -> AppResult<T>) -> AppResult<T> {
        let mut f = Some(f);
        let mut out = None;
        self.run_in_transaction(&mut |tx| {
            let f = f
                .take()
                .ok_or_else(|| AppError::internal("transaction body invoked twice"))?;
            out = Some(f(tx)?);
            Ok(())
        })?;
        out.ok_or_else(|| AppError::internal("transaction committed without a result"))
    }
}
