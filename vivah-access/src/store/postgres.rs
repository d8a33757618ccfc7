use chrono::{DateTime, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Uuid as SqlUuid, Varchar};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use vivah_shared::clients::db::DbPool;
use vivah_shared::errors::{AppError, AppResult};

use crate::models::{Interest, InterestFilter, InterestStatus, Message, Photo, PrivacySettings};
use crate::schema::{daily_interest_counters, interests, messages, profile_photos, profiles};
use crate::store::{AccessStore, StoreTx};

// --- Rows ---

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = interests)]
struct InterestRow {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

impl TryFrom<InterestRow> for Interest {
    type Error = AppError;

    fn try_from(row: InterestRow) -> Result<Self, Self::Error> {
        Ok(Interest {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            status: row.status.parse().map_err(AppError::internal)?,
            created_at: row.created_at,
            responded_at: row.responded_at,
        })
    }
}

impl From<&Interest> for InterestRow {
    fn from(interest: &Interest) -> Self {
        Self {
            id: interest.id,
            sender_id: interest.sender_id,
            receiver_id: interest.receiver_id,
            status: interest.status.as_str().to_string(),
            created_at: interest.created_at,
            responded_at: interest.responded_at,
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = profiles)]
struct ProfileRow {
    visibility: String,
    photo_visibility: String,
    contact_visibility: String,
    blur_photos_for_free: bool,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = profiles)]
struct ProfileUpsert<'a> {
    user_id: Uuid,
    visibility: &'a str,
    photo_visibility: &'a str,
    contact_visibility: &'a str,
    blur_photos_for_free: bool,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = profile_photos)]
struct PhotoRow {
    id: Uuid,
    user_id: Uuid,
    storage_key: String,
    url: String,
    is_primary: bool,
    is_approved: bool,
    width: i32,
    height: i32,
    byte_size: i64,
    original_byte_size: i64,
    compression_ratio: f64,
    created_at: DateTime<Utc>,
}

impl From<PhotoRow> for Photo {
    fn from(row: PhotoRow) -> Self {
        Photo {
            id: row.id,
            owner_id: row.user_id,
            storage_key: row.storage_key,
            url: row.url,
            is_primary: row.is_primary,
            is_approved: row.is_approved,
            width: row.width.max(0) as u32,
            height: row.height.max(0) as u32,
            byte_size: row.byte_size.max(0) as u64,
            original_byte_size: row.original_byte_size.max(0) as u64,
            compression_ratio: row.compression_ratio,
            created_at: row.created_at,
        }
    }
}

impl From<&Photo> for PhotoRow {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id,
            user_id: photo.owner_id,
            storage_key: photo.storage_key.clone(),
            url: photo.url.clone(),
            is_primary: photo.is_primary,
            is_approved: photo.is_approved,
            width: photo.width as i32,
            height: photo.height as i32,
            byte_size: photo.byte_size as i64,
            original_byte_size: photo.original_byte_size as i64,
            compression_ratio: photo.compression_ratio,
            created_at: photo.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
struct NewMessageRow<'a> {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: &'a str,
    created_at: DateTime<Utc>,
}

#[derive(Debug, QueryableByName)]
struct CounterRow {
    #[diesel(sql_type = Integer)]
    count: i32,
}

// --- Store ---

/// Postgres-backed store. Each transaction checks out one pooled connection and runs the
/// engine closure inside `BEGIN … COMMIT`.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AccessStore for PgStore {
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn StoreTx) -> AppResult<()>,
    ) -> AppResult<()> {
        let mut pooled = self.pool.get().map_err(|e| AppError::internal(e.to_string()))?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction::<(), AppError, _>(|conn| f(&mut PgTx { conn }))
    }

    fn ping(&self) -> AppResult<()> {
        let mut pooled = self.pool.get().map_err(|e| AppError::internal(e.to_string()))?;
        diesel::sql_query("SELECT 1").execute(&mut *pooled)?;
        Ok(())
    }
}

struct PgTx<'a> {
    conn: &'a mut PgConnection,
}

/// Advisory-lock key for `ids` within `namespace`, so pair locks and owner locks never collide.
fn advisory_key(namespace: &str, ids: &[Uuid]) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    for id in ids {
        hasher.update(id.as_bytes());
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(prefix)
}

/// Stable advisory-lock key for an unordered user pair.
fn pair_lock_key(a: Uuid, b: Uuid) -> i64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    advisory_key("interest-pair", &[lo, hi])
}

fn owner_photos_lock_key(owner_id: Uuid) -> i64 {
    advisory_key("owner-photos", &[owner_id])
}

fn advisory_xact_lock(conn: &mut PgConnection, key: i64) -> AppResult<()> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(key)
        .execute(conn)?;
    Ok(())
}

impl StoreTx for PgTx<'_> {
    fn privacy_settings(&mut self, user_id: Uuid) -> AppResult<Option<PrivacySettings>> {
        let row = profiles::table
            .find(user_id)
            .select(ProfileRow::as_select())
            .first::<ProfileRow>(self.conn)
            .optional()?;

        row.map(|row| {
            Ok(PrivacySettings {
                visibility: row.visibility.parse().map_err(AppError::internal)?,
                photo_visibility: row.photo_visibility.parse().map_err(AppError::internal)?,
                contact_visibility: row.contact_visibility.parse().map_err(AppError::internal)?,
                blur_photos_for_free: row.blur_photos_for_free,
            })
        })
        .transpose()
    }

    fn upsert_privacy_settings(
        &mut self,
        user_id: Uuid,
        settings: &PrivacySettings,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let row = ProfileUpsert {
            user_id,
            visibility: settings.visibility.as_str(),
            photo_visibility: settings.photo_visibility.as_str(),
            contact_visibility: settings.contact_visibility.as_str(),
            blur_photos_for_free: settings.blur_photos_for_free,
            updated_at: now,
        };

        diesel::insert_into(profiles::table)
            .values(&row)
            .on_conflict(profiles::user_id)
            .do_update()
            .set(&row)
            .execute(self.conn)?;
        Ok(())
    }

    fn lock_pair(&mut self, a: Uuid, b: Uuid) -> AppResult<()> {
        advisory_xact_lock(self.conn, pair_lock_key(a, b))
    }

    fn find_interest(&mut self, id: Uuid) -> AppResult<Option<Interest>> {
        interests::table
            .find(id)
            .select(InterestRow::as_select())
            .for_update()
            .first::<InterestRow>(self.conn)
            .optional()?
            .map(Interest::try_from)
            .transpose()
    }

    fn interests_between(&mut self, a: Uuid, b: Uuid) -> AppResult<Vec<Interest>> {
        interests::table
            .filter(
                interests::sender_id.eq(a).and(interests::receiver_id.eq(b))
                    .or(interests::sender_id.eq(b).and(interests::receiver_id.eq(a))),
            )
            .order((interests::created_at.desc(), interests::id.desc()))
            .select(InterestRow::as_select())
            .load::<InterestRow>(self.conn)?
            .into_iter()
            .map(Interest::try_from)
            .collect()
    }

    fn insert_interest(&mut self, interest: &Interest) -> AppResult<()> {
        diesel::insert_into(interests::table)
            .values(InterestRow::from(interest))
            .execute(self.conn)?;
        Ok(())
    }

    fn update_interest_status(
        &mut self,
        id: Uuid,
        expected: InterestStatus,
        new_status: InterestStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let updated = diesel::update(
            interests::table
                .filter(interests::id.eq(id))
                .filter(interests::status.eq(expected.as_str())),
        )
        .set((
            interests::status.eq(new_status.as_str()),
            interests::responded_at.eq(Some(responded_at)),
        ))
        .execute(self.conn)?;
        Ok(updated == 1)
    }

    fn list_interests(
        &mut self,
        filter: &InterestFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<Interest>, u64)> {
        let filtered = || {
            let mut query: interests::BoxedQuery<'_, Pg> = interests::table.into_boxed();
            if let Some(sender) = filter.sender_id {
                query = query.filter(interests::sender_id.eq(sender));
            }
            if let Some(receiver) = filter.receiver_id {
                query = query.filter(interests::receiver_id.eq(receiver));
            }
            if let Some(status) = filter.status {
                query = query.filter(interests::status.eq(status.as_str()));
            }
            query
        };

        let total: i64 = filtered().count().get_result(self.conn)?;
        let items = filtered()
            .select(InterestRow::as_select())
            .order((interests::created_at.desc(), interests::id.desc()))
            .offset(offset as i64)
            .limit(limit as i64)
            .load::<InterestRow>(self.conn)?
            .into_iter()
            .map(Interest::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((items, total.max(0) as u64))
    }

    fn increment_counter_if_below(
        &mut self,
        user_id: Uuid,
        date_key: &str,
        quota: u32,
    ) -> AppResult<Option<u32>> {
        if quota == 0 {
            return Ok(None);
        }

        // Single statement: the row lock taken by ON CONFLICT makes check-and-increment atomic
        // across concurrent sessions for the same user.
        let rows: Vec<CounterRow> = diesel::sql_query(
            "INSERT INTO daily_interest_counters (user_id, date_key, count) \
             VALUES ($1, $2, 1) \
             ON CONFLICT (user_id, date_key) \
             DO UPDATE SET count = daily_interest_counters.count + 1 \
             WHERE daily_interest_counters.count < $3 \
             RETURNING count",
        )
        .bind::<SqlUuid, _>(user_id)
        .bind::<Varchar, _>(date_key)
        .bind::<Integer, _>(quota as i32)
        .load(self.conn)?;

        Ok(rows.first().map(|row| row.count.max(0) as u32))
    }

    fn counter_value(&mut self, user_id: Uuid, date_key: &str) -> AppResult<u32> {
        let count = daily_interest_counters::table
            .filter(daily_interest_counters::user_id.eq(user_id))
            .filter(daily_interest_counters::date_key.eq(date_key))
            .select(daily_interest_counters::count)
            .first::<i32>(self.conn)
            .optional()?;
        Ok(count.unwrap_or(0).max(0) as u32)
    }

    fn lock_owner_photos(&mut self, owner_id: Uuid) -> AppResult<()> {
        advisory_xact_lock(self.conn, owner_photos_lock_key(owner_id))
    }

    fn insert_photo(&mut self, photo: &Photo) -> AppResult<()> {
        diesel::insert_into(profile_photos::table)
            .values(PhotoRow::from(photo))
            .execute(self.conn)?;
        Ok(())
    }

    fn find_photo(&mut self, id: Uuid) -> AppResult<Option<Photo>> {
        Ok(profile_photos::table
            .find(id)
            .select(PhotoRow::as_select())
            .first::<PhotoRow>(self.conn)
            .optional()?
            .map(Photo::from))
    }

    fn photos_for(&mut self, owner_id: Uuid) -> AppResult<Vec<Photo>> {
        Ok(profile_photos::table
            .filter(profile_photos::user_id.eq(owner_id))
            .order((profile_photos::created_at.desc(), profile_photos::id.desc()))
            .select(PhotoRow::as_select())
            .for_update()
            .load::<PhotoRow>(self.conn)?
            .into_iter()
            .map(Photo::from)
            .collect())
    }

    fn set_primary_exclusive(&mut self, owner_id: Uuid, photo_id: Uuid) -> AppResult<()> {
        // Clear first: the partial unique index on (user_id) WHERE is_primary is checked per row.
        diesel::update(
            profile_photos::table
                .filter(profile_photos::user_id.eq(owner_id))
                .filter(profile_photos::id.ne(photo_id))
                .filter(profile_photos::is_primary.eq(true)),
        )
        .set(profile_photos::is_primary.eq(false))
        .execute(self.conn)?;

        diesel::update(
            profile_photos::table
                .filter(profile_photos::user_id.eq(owner_id))
                .filter(profile_photos::id.eq(photo_id)),
        )
        .set(profile_photos::is_primary.eq(true))
        .execute(self.conn)?;
        Ok(())
    }

    fn set_photo_approved(&mut self, id: Uuid, approved: bool) -> AppResult<bool> {
        let updated = diesel::update(profile_photos::table.find(id))
            .set(profile_photos::is_approved.eq(approved))
            .execute(self.conn)?;
        Ok(updated == 1)
    }

    fn delete_photo(&mut self, id: Uuid) -> AppResult<bool> {
        let deleted = diesel::delete(profile_photos::table.find(id)).execute(self.conn)?;
        Ok(deleted == 1)
    }

    fn insert_message(&mut self, message: &Message) -> AppResult<()> {
        diesel::insert_into(messages::table)
            .values(NewMessageRow {
                id: message.id,
                sender_id: message.sender_id,
                receiver_id: message.receiver_id,
                content: &message.content,
                created_at: message.created_at,
            })
            .execute(self.conn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_lock_key_ignores_direction() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        assert_eq!(pair_lock_key(a, b), pair_lock_key(b, a));
        assert_ne!(pair_lock_key(a, b), pair_lock_key(a, Uuid::now_v7()));
    }

    #[test]
    fn owner_lock_does_not_share_a_key_with_pair_locks() {
        let owner = Uuid::now_v7();
        assert_eq!(owner_photos_lock_key(owner), owner_photos_lock_key(owner));
        assert_ne!(owner_photos_lock_key(owner), pair_lock_key(owner, owner));
        assert_ne!(owner_photos_lock_key(owner), owner_photos_lock_key(Uuid::now_v7()));
    }
}
