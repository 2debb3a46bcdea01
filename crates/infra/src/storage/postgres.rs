//! Postgres-backed storage.
//!
//! Each entity type maps to its own table and the Place/Amenity link lives in
//! the `place_amenity` join table. The live set is loaded into memory by
//! `reload()`; `save()` writes only what changed since the previous save.
//!
//! ## Save batches
//!
//! A save runs in one transaction:
//!
//! 1. Deletions, children first (`reviews`, `places`, `cities`, `states`,
//!    `amenities`, `users`)
//! 2. Upserts, parents first (`states`, `users`, `amenities`, `cities`,
//!    `places`, `reviews`); for every upserted place its join rows are
//!    rewritten
//!
//! If the transaction fails with a transient error the change record is handed
//! back to the live set, so the next save retries the same work. A permanent
//! failure discards the batch; replaying it would fail every later save too.
//!
//! Text columns are unbounded `TEXT`, so any value the file backend accepts is
//! accepted here as well.
//!
//! ## Error Mapping
//!
//! | SQLx Error | Transient | Scenario |
//! |------------|-----------|----------|
//! | `PoolTimedOut` | yes | Pool exhausted or server slow to accept |
//! | `Io` | yes | Connection dropped mid-operation |
//! | `Database` | no | Constraint violation, bad schema |
//! | other | no | Protocol/decode failures |
//!
//! Transient errors are retried with the configured backoff before surfacing.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tokio::sync::Mutex;
use tracing::{Span, debug, field, info, instrument, warn};

use hbnb_core::{
    Amenity, AnyEntity, BaseEntity, City, EntityId, EntityKind, Place, Review, State, User,
};

use super::live_set::{LiveSet, PendingBatch};
use super::r#trait::{Storage, StorageError};
use crate::retry::{RetryPolicy, retry};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS states (
        id TEXT PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        email TEXT NOT NULL,
        password TEXT NOT NULL,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS amenities (
        id TEXT PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cities (
        id TEXT PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        name TEXT NOT NULL,
        state_id TEXT NOT NULL REFERENCES states(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS places (
        id TEXT PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        city_id TEXT NOT NULL REFERENCES cities(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        number_rooms BIGINT NOT NULL DEFAULT 0,
        number_bathrooms BIGINT NOT NULL DEFAULT 0,
        max_guest BIGINT NOT NULL DEFAULT 0,
        price_by_night BIGINT NOT NULL DEFAULT 0,
        latitude DOUBLE PRECISION NOT NULL DEFAULT 0,
        longitude DOUBLE PRECISION NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id TEXT PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        place_id TEXT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        text TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS place_amenity (
        place_id TEXT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
        amenity_id TEXT NOT NULL REFERENCES amenities(id) ON DELETE CASCADE,
        PRIMARY KEY (place_id, amenity_id)
    )
    "#,
];

const DROP_SCHEMA: &str =
    "DROP TABLE IF EXISTS place_amenity, reviews, places, cities, amenities, users, states CASCADE";

const DELETE_ORDER: [EntityKind; 6] = [
    EntityKind::Review,
    EntityKind::Place,
    EntityKind::City,
    EntityKind::State,
    EntityKind::Amenity,
    EntityKind::User,
];

const UPSERT_ORDER: [EntityKind; 6] = [
    EntityKind::State,
    EntityKind::User,
    EntityKind::Amenity,
    EntityKind::City,
    EntityKind::Place,
    EntityKind::Review,
];

/// Postgres-backed storage engine.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool (Send + Sync). Saves and reloads are
/// serialized by an internal mutex; every save is one transaction.
#[derive(Debug)]
pub struct PostgresStorage {
    pool: PgPool,
    objects: LiveSet,
    persist_lock: Mutex<()>,
    reset_on_reload: bool,
    retry: RetryPolicy,
}

impl PostgresStorage {
    /// Connect a pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| StorageError::database("connect", e))?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            objects: LiveSet::new(),
            persist_lock: Mutex::new(()),
            reset_on_reload: false,
            retry: RetryPolicy::default(),
        }
    }

    /// Drop every table before recreating it on reload.
    pub fn reset_on_reload(mut self, reset: bool) -> Self {
        self.reset_on_reload = reset;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        if self.reset_on_reload {
            sqlx::query(DROP_SCHEMA)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::database("drop_schema", e))?;
        }
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::database("create_schema", e))?;
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<AnyEntity>, StorageError> {
        let mut entities = Vec::new();

        let rows = fetch(&self.pool, "load_states", "SELECT id, created_at, updated_at, name FROM states").await?;
        for row in &rows {
            entities.push(State { base: base_from_row(row)?, name: get(row, "name")? }.into());
        }

        let rows = fetch(
            &self.pool,
            "load_users",
            "SELECT id, created_at, updated_at, email, password, first_name, last_name FROM users",
        )
        .await?;
        for row in &rows {
            entities.push(
                User {
                    base: base_from_row(row)?,
                    email: get(row, "email")?,
                    password: get(row, "password")?,
                    first_name: get(row, "first_name")?,
                    last_name: get(row, "last_name")?,
                }
                .into(),
            );
        }

        let rows = fetch(&self.pool, "load_amenities", "SELECT id, created_at, updated_at, name FROM amenities").await?;
        for row in &rows {
            entities.push(Amenity { base: base_from_row(row)?, name: get(row, "name")? }.into());
        }

        let rows = fetch(
            &self.pool,
            "load_cities",
            "SELECT id, created_at, updated_at, name, state_id FROM cities",
        )
        .await?;
        for row in &rows {
            entities.push(
                City {
                    base: base_from_row(row)?,
                    name: get(row, "name")?,
                    state_id: EntityId::from(get::<String>(row, "state_id")?),
                }
                .into(),
            );
        }

        let rows = fetch(&self.pool, "load_place_amenity", "SELECT place_id, amenity_id FROM place_amenity").await?;
        let mut links: HashMap<String, BTreeSet<EntityId>> = HashMap::new();
        for row in &rows {
            let place_id: String = get(row, "place_id")?;
            let amenity_id: String = get(row, "amenity_id")?;
            links.entry(place_id).or_default().insert(EntityId::from(amenity_id));
        }

        let rows = fetch(
            &self.pool,
            "load_places",
            r#"
            SELECT id, created_at, updated_at, city_id, user_id, name, description,
                   number_rooms, number_bathrooms, max_guest, price_by_night,
                   latitude, longitude
            FROM places
            "#,
        )
        .await?;
        for row in &rows {
            let base = base_from_row(row)?;
            let amenity_ids = links.remove(base.id.as_str()).unwrap_or_default();
            entities.push(
                Place {
                    base,
                    city_id: EntityId::from(get::<String>(row, "city_id")?),
                    user_id: EntityId::from(get::<String>(row, "user_id")?),
                    name: get(row, "name")?,
                    description: get(row, "description")?,
                    number_rooms: get(row, "number_rooms")?,
                    number_bathrooms: get(row, "number_bathrooms")?,
                    max_guest: get(row, "max_guest")?,
                    price_by_night: get(row, "price_by_night")?,
                    latitude: get(row, "latitude")?,
                    longitude: get(row, "longitude")?,
                    amenity_ids,
                }
                .into(),
            );
        }

        let rows = fetch(
            &self.pool,
            "load_reviews",
            "SELECT id, created_at, updated_at, place_id, user_id, text FROM reviews",
        )
        .await?;
        for row in &rows {
            entities.push(
                Review {
                    base: base_from_row(row)?,
                    place_id: EntityId::from(get::<String>(row, "place_id")?),
                    user_id: EntityId::from(get::<String>(row, "user_id")?),
                    text: get(row, "text")?,
                }
                .into(),
            );
        }

        Ok(entities)
    }

    async fn write_batch(&self, batch: &PendingBatch) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::database("begin_transaction", e))?;

        for kind in DELETE_ORDER {
            let ids = batch.removed_ids(kind);
            if ids.is_empty() {
                continue;
            }
            sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", kind.plural()))
                .bind(&ids)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::database("delete", e))?;
        }

        let mut upserts: Vec<&AnyEntity> = batch.upserts.iter().collect();
        upserts.sort_by_key(|e| UPSERT_ORDER.iter().position(|k| *k == e.kind()));
        for entity in upserts {
            upsert(&mut tx, entity).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::database("commit", e))?;
        Ok(())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    fn all(&self, kind: Option<EntityKind>) -> HashMap<String, AnyEntity> {
        self.objects.all(kind)
    }

    fn new(&self, entity: AnyEntity) {
        self.objects.insert(entity);
    }

    fn get(&self, kind: EntityKind, id: &str) -> Option<AnyEntity> {
        self.objects.get(kind, id)
    }

    fn count(&self, kind: Option<EntityKind>) -> usize {
        self.objects.count(kind)
    }

    fn delete(&self, entity: &AnyEntity) {
        let removed = self.objects.remove(entity);
        if removed.len() > 1 {
            debug!(root = %entity.key(), cascaded = removed.len() - 1, "cascading delete");
        }
    }

    #[instrument(skip(self), fields(upserts = field::Empty, deletes = field::Empty), err)]
    async fn save(&self) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock().await;

        let batch = self.objects.take_pending();
        if batch.is_empty() {
            return Ok(());
        }

        let span = Span::current();
        span.record("upserts", batch.upserts.len());
        span.record("deletes", batch.changes.removed.len());

        let this = self;
        let pending = &batch;
        match retry(&self.retry, "db.save", move || this.write_batch(pending)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => {
                self.objects.restore_pending(batch.changes);
                Err(e)
            }
            Err(e) => {
                warn!(
                    upserts = batch.changes.upserted.len(),
                    deletes = batch.changes.removed.len(),
                    "discarding change batch after permanent failure"
                );
                Err(e)
            }
        }
    }

    #[instrument(skip(self), fields(reset = self.reset_on_reload), err)]
    async fn reload(&self) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock().await;

        let this = self;
        retry(&self.retry, "db.reload", move || this.ensure_schema()).await?;
        let entities = retry(&self.retry, "db.reload", move || this.load_all()).await?;

        info!(entities = entities.len(), "storage reloaded");
        self.objects.replace_all(entities);
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.save().await?;
        self.pool.close().await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "db"
    }
}

async fn fetch(pool: &PgPool, operation: &'static str, sql: &str) -> Result<Vec<PgRow>, StorageError> {
    sqlx::query(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::database(operation, e))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StorageError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StorageError::database("decode_row", e))
}

fn base_from_row(row: &PgRow) -> Result<BaseEntity, StorageError> {
    Ok(BaseEntity {
        id: EntityId::from(get::<String>(row, "id")?),
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
        updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
    })
}

async fn upsert(tx: &mut Transaction<'_, Postgres>, entity: &AnyEntity) -> Result<(), StorageError> {
    let base = entity.base();
    let result = match entity {
        AnyEntity::State(state) => {
            sqlx::query(
                r#"
                INSERT INTO states (id, created_at, updated_at, name)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE SET
                    updated_at = EXCLUDED.updated_at,
                    name = EXCLUDED.name
                "#,
            )
            .bind(base.id.as_str())
            .bind(base.created_at)
            .bind(base.updated_at)
            .bind(&state.name)
            .execute(&mut **tx)
            .await
        }
        AnyEntity::User(user) => {
            sqlx::query(
                r#"
                INSERT INTO users (id, created_at, updated_at, email, password, first_name, last_name)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    updated_at = EXCLUDED.updated_at,
                    email = EXCLUDED.email,
                    password = EXCLUDED.password,
                    first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name
                "#,
            )
            .bind(base.id.as_str())
            .bind(base.created_at)
            .bind(base.updated_at)
            .bind(&user.email)
            .bind(&user.password)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .execute(&mut **tx)
            .await
        }
        AnyEntity::Amenity(amenity) => {
            sqlx::query(
                r#"
                INSERT INTO amenities (id, created_at, updated_at, name)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE SET
                    updated_at = EXCLUDED.updated_at,
                    name = EXCLUDED.name
                "#,
            )
            .bind(base.id.as_str())
            .bind(base.created_at)
            .bind(base.updated_at)
            .bind(&amenity.name)
            .execute(&mut **tx)
            .await
        }
        AnyEntity::City(city) => {
            sqlx::query(
                r#"
                INSERT INTO cities (id, created_at, updated_at, name, state_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE SET
                    updated_at = EXCLUDED.updated_at,
                    name = EXCLUDED.name,
                    state_id = EXCLUDED.state_id
                "#,
            )
            .bind(base.id.as_str())
            .bind(base.created_at)
            .bind(base.updated_at)
            .bind(&city.name)
            .bind(city.state_id.as_str())
            .execute(&mut **tx)
            .await
        }
        AnyEntity::Place(place) => {
            upsert_place(tx, place).await?;
            return Ok(());
        }
        AnyEntity::Review(review) => {
            sqlx::query(
                r#"
                INSERT INTO reviews (id, created_at, updated_at, place_id, user_id, text)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    updated_at = EXCLUDED.updated_at,
                    place_id = EXCLUDED.place_id,
                    user_id = EXCLUDED.user_id,
                    text = EXCLUDED.text
                "#,
            )
            .bind(base.id.as_str())
            .bind(base.created_at)
            .bind(base.updated_at)
            .bind(review.place_id.as_str())
            .bind(review.user_id.as_str())
            .bind(&review.text)
            .execute(&mut **tx)
            .await
        }
    };

    result
        .map(|_| ())
        .map_err(|e| StorageError::database("upsert", e))
}

async fn upsert_place(tx: &mut Transaction<'_, Postgres>, place: &Place) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO places (
            id, created_at, updated_at, city_id, user_id, name, description,
            number_rooms, number_bathrooms, max_guest, price_by_night, latitude, longitude
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (id) DO UPDATE SET
            updated_at = EXCLUDED.updated_at,
            city_id = EXCLUDED.city_id,
            user_id = EXCLUDED.user_id,
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            number_rooms = EXCLUDED.number_rooms,
            number_bathrooms = EXCLUDED.number_bathrooms,
            max_guest = EXCLUDED.max_guest,
            price_by_night = EXCLUDED.price_by_night,
            latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude
        "#,
    )
    .bind(place.base.id.as_str())
    .bind(place.base.created_at)
    .bind(place.base.updated_at)
    .bind(place.city_id.as_str())
    .bind(place.user_id.as_str())
    .bind(&place.name)
    .bind(&place.description)
    .bind(place.number_rooms)
    .bind(place.number_bathrooms)
    .bind(place.max_guest)
    .bind(place.price_by_night)
    .bind(place.latitude)
    .bind(place.longitude)
    .execute(&mut **tx)
    .await
    .map_err(|e| StorageError::database("upsert_place", e))?;

    sqlx::query("DELETE FROM place_amenity WHERE place_id = $1")
        .bind(place.base.id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::database("unlink_amenities", e))?;

    let amenity_ids: Vec<String> = place.amenity_ids.iter().map(|id| id.to_string()).collect();
    if !amenity_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO place_amenity (place_id, amenity_id)
            SELECT $1, UNNEST($2::TEXT[])
            "#,
        )
        .bind(place.base.id.as_str())
        .bind(&amenity_ids)
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::database("link_amenities", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    //! Requires a reachable Postgres; run with
    //! `DATABASE_URL=postgres://... cargo test -- --ignored --test-threads=1`
    //! (every test drops and recreates the schema).

    use super::*;
    use crate::storage::StorageExt;
    use hbnb_core::Model;

    async fn storage() -> PostgresStorage {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
        PostgresStorage::connect(&url, 2)
            .await
            .unwrap()
            .reset_on_reload(true)
            .with_retry_policy(RetryPolicy::no_retry())
    }

    #[tokio::test]
    #[ignore]
    async fn save_then_reload_round_trips_with_relations() {
        let storage = storage().await;
        storage.reload().await.unwrap();

        let state = State::new("Nebraska");
        let city = City::new("Omaha", state.id().clone());
        let user = User::new("host@hbnb.io", "pw");
        let wifi = Amenity::new("Wifi");
        let mut place = Place::new("Loft", city.id().clone(), user.id().clone());
        place.link_amenity(wifi.id().clone());
        let review = Review::new(place.id().clone(), user.id().clone(), "Great");

        storage.put(review.clone());
        storage.put(place.clone());
        storage.put(wifi.clone());
        storage.put(user.clone());
        storage.put(city.clone());
        storage.put(state.clone());
        storage.save().await.unwrap();

        let fresh = PostgresStorage::from_pool(storage.pool.clone());
        fresh.reload().await.unwrap();
        assert_eq!(fresh.count(None), 6);
        assert_eq!(fresh.get_as::<Place>(place.id().as_str()), Some(place));
        assert_eq!(fresh.get_as::<Review>(review.id().as_str()), Some(review));
    }

    #[tokio::test]
    #[ignore]
    async fn cascading_delete_is_persisted() {
        let storage = storage().await;
        storage.reload().await.unwrap();

        let state = State::new("Ohio");
        let city = City::new("Akron", state.id().clone());
        storage.put(state.clone());
        storage.put(city.clone());
        storage.save().await.unwrap();

        storage.delete(&state.clone().into());
        storage.save().await.unwrap();

        let fresh = PostgresStorage::from_pool(storage.pool.clone());
        fresh.reload().await.unwrap();
        assert_eq!(fresh.count(None), 0);
    }

    #[tokio::test]
    #[ignore]
    async fn long_text_values_are_stored() {
        let storage = storage().await;
        storage.reload().await.unwrap();

        let state = State::new("N".repeat(200));
        let review_text = "great stay ".repeat(200);
        let user = User::new("u@hbnb.io", "pw");
        let city = City::new("Omaha", state.id().clone());
        let place = Place::new("Loft", city.id().clone(), user.id().clone());
        let review = Review::new(place.id().clone(), user.id().clone(), review_text);
        storage.put(state.clone());
        storage.put(user);
        storage.put(city);
        storage.put(place);
        storage.put(review.clone());
        storage.save().await.unwrap();

        let fresh = PostgresStorage::from_pool(storage.pool.clone());
        fresh.reload().await.unwrap();
        assert_eq!(fresh.get_as::<State>(state.id().as_str()), Some(state));
        assert_eq!(fresh.get_as::<Review>(review.id().as_str()), Some(review));
    }

    #[tokio::test]
    #[ignore]
    async fn permanent_failure_does_not_block_later_saves() {
        let storage = storage().await;
        storage.reload().await.unwrap();

        // Foreign key violation: the state was never stored.
        let orphan = City::new("Nowhere", EntityId::new());
        storage.put(orphan);
        let err = storage.save().await.unwrap_err();
        assert!(!err.is_transient());
        assert!(storage.objects.pending().is_empty());

        let state = State::new("Nebraska");
        storage.put(state.clone());
        storage.save().await.unwrap();
        storage.close().await.unwrap();

        let reopened = self::storage().await.reset_on_reload(false);
        reopened.reload().await.unwrap();
        assert_eq!(reopened.count(None), 1);
        assert_eq!(reopened.get_as::<State>(state.id().as_str()), Some(state));
    }
}
