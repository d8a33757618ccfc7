use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use vivah_shared::errors::{AppError, AppResult};

use crate::models::{Interest, InterestFilter, InterestStatus, Message, Photo, PrivacySettings};
use crate::store::{AccessStore, StoreTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    profiles: HashMap<Uuid, PrivacySettings>,
    interests: Vec<Interest>,
    counters: HashMap<(Uuid, String), u32>,
    photos: Vec<Photo>,
    messages: Vec<Message>,
}

/// In-process store for tests and local runs. Transactions run against a snapshot that
/// replaces the live state only on success; the lock serializes all transactions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_photo_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    pub fn interests(&self) -> Vec<Interest> {
        self.state.lock().interests.clone()
    }

    pub fn photos(&self) -> Vec<Photo> {
        self.state.lock().photos.clone()
    }

    /// Make every subsequent `insert_photo` fail, to exercise rollback paths.
    pub fn fail_photo_inserts(&self, fail: bool) {
        self.fail_photo_inserts.store(fail, Ordering::SeqCst);
    }
}

impl AccessStore for MemoryStore {
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn StoreTx) -> AppResult<()>,
    ) -> AppResult<()> {
        let mut live = self.state.lock();
        let mut snapshot = live.clone();
        f(&mut MemoryTx {
            state: &mut snapshot,
            fail_photo_inserts: self.fail_photo_inserts.load(Ordering::SeqCst),
        })?;
        *live = snapshot;
        Ok(())
    }

    fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

struct MemoryTx<'a> {
    state: &'a mut MemoryState,
    fail_photo_inserts: bool,
}

/// Newest first; equal timestamps fall back to the id, which is a time-ordered UUID v7.
fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

impl StoreTx for MemoryTx<'_> {
    fn privacy_settings(&mut self, user_id: Uuid) -> AppResult<Option<PrivacySettings>> {
        Ok(self.state.profiles.get(&user_id).cloned())
    }

    fn upsert_privacy_settings(
        &mut self,
        user_id: Uuid,
        settings: &PrivacySettings,
        _now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.state.profiles.insert(user_id, settings.clone());
        Ok(())
    }

    fn lock_pair(&mut self, _a: Uuid, _b: Uuid) -> AppResult<()> {
        // The store-wide lock already serializes every transaction.
        Ok(())
    }

    fn find_interest(&mut self, id: Uuid) -> AppResult<Option<Interest>> {
        Ok(self.state.interests.iter().find(|i| i.id == id).cloned())
    }

    fn interests_between(&mut self, a: Uuid, b: Uuid) -> AppResult<Vec<Interest>> {
        let mut found: Vec<Interest> = self
            .state
            .interests
            .iter()
            .filter(|i| i.involves(a, b))
            .cloned()
            .collect();
        newest_first(&mut found, |i| (i.created_at, i.id));
        Ok(found)
    }

    fn insert_interest(&mut self, interest: &Interest) -> AppResult<()> {
        self.state.interests.push(interest.clone());
        Ok(())
    }

    fn update_interest_status(
        &mut self,
        id: Uuid,
        expected: InterestStatus,
        new_status: InterestStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        match self
            .state
            .interests
            .iter_mut()
            .find(|i| i.id == id && i.status == expected)
        {
            Some(interest) => {
                interest.status = new_status;
                interest.responded_at = Some(responded_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_interests(
        &mut self,
        filter: &InterestFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<Interest>, u64)> {
        let mut matching: Vec<Interest> = self
            .state
            .interests
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        newest_first(&mut matching, |i| (i.created_at, i.id));
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    fn increment_counter_if_below(
        &mut self,
        user_id: Uuid,
        date_key: &str,
        quota: u32,
    ) -> AppResult<Option<u32>> {
        let count = self
            .state
            .counters
            .entry((user_id, date_key.to_string()))
            .or_insert(0);
        if *count >= quota {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }

    fn counter_value(&mut self, user_id: Uuid, date_key: &str) -> AppResult<u32> {
        Ok(self
            .state
            .counters
            .get(&(user_id, date_key.to_string()))
            .copied()
            .unwrap_or(0))
    }

    fn lock_owner_photos(&mut self, _owner_id: Uuid) -> AppResult<()> {
        Ok(())
    }

    fn insert_photo(&mut self, photo: &Photo) -> AppResult<()> {
        if self.fail_photo_inserts {
            return Err(AppError::Database(diesel::result::Error::RollbackTransaction));
        }
        self.state.photos.push(photo.clone());
        Ok(())
    }

    fn find_photo(&mut self, id: Uuid) -> AppResult<Option<Photo>> {
        Ok(self.state.photos.iter().find(|p| p.id == id).cloned())
    }

    fn photos_for(&mut self, owner_id: Uuid) -> AppResult<Vec<Photo>> {
        let mut owned: Vec<Photo> = self
            .state
            .photos
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut owned, |p| (p.created_at, p.id));
        Ok(owned)
    }

    fn set_primary_exclusive(&mut self, owner_id: Uuid, photo_id: Uuid) -> AppResult<()> {
        for photo in self.state.photos.iter_mut().filter(|p| p.owner_id == owner_id) {
            photo.is_primary = photo.id == photo_id;
        }
        Ok(())
    }

    fn set_photo_approved(&mut self, id: Uuid, approved: bool) -> AppResult<bool> {
        match self.state.photos.iter_mut().find(|p| p.id == id) {
            Some(photo) => {
                photo.is_approved = approved;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_photo(&mut self, id: Uuid) -> AppResult<bool> {
        let before = self.state.photos.len();
        self.state.photos.retain(|p| p.id != id);
        Ok(self.state.photos.len() != before)
    }

    fn insert_message(&mut self, message: &Message) -> AppResult<()> {
        self.state.messages.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreExt;

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();

        let result: AppResult<()> = store.transaction(|tx| {
            tx.increment_counter_if_below(user, "2024-01-01", 10)?;
            Err(AppError::internal("boom"))
        });
        assert!(result.is_err());

        let count = store
            .transaction(|tx| tx.counter_value(user, "2024-01-01"))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn counter_stops_at_quota() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        for expected in 1..=3 {
            let got = store
                .transaction(|tx| tx.increment_counter_if_below(user, "d", 3))
                .unwrap();
            assert_eq!(got, Some(expected));
        }
        let denied = store
            .transaction(|tx| tx.increment_counter_if_below(user, "d", 3))
            .unwrap();
        assert_eq!(denied, None);
        assert_eq!(store.transaction(|tx| tx.counter_value(user, "d")).unwrap(), 3);
    }

    #[test]
    fn equal_timestamps_list_the_later_id_first() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let now = Utc::now();
        let mut older = Interest::new_pending(a, b, now);
        older.status = InterestStatus::Rejected;
        let newer = Interest::new_pending(b, a, now);
        assert!(newer.id > older.id);

        let history = store
            .transaction(|tx| {
                tx.insert_interest(&older)?;
                tx.insert_interest(&newer)?;
                tx.interests_between(a, b)
            })
            .unwrap();
        assert_eq!(history.iter().map(|i| i.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
    }
}
