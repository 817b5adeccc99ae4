//! Persistence seam keyed by `(source, source_id)`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use buidl_core::{CanonicalRecord, EntityKind, GrantRecord, HackathonRecord, Source};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("no {kind} row with id {id}")]
    NotFound { kind: EntityKind, id: Uuid },
    #[error("slug {0} already belongs to another record")]
    SlugConflict(String),
    #[error("serializing record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What a point lookup returns: enough to decide create / update / skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRef {
    pub id: Uuid,
    pub content_hash: String,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find(
        &self,
        kind: EntityKind,
        source: Source,
        source_id: &str,
    ) -> Result<Option<StoredRef>, StoreError>;

    async fn insert(&self, record: &CanonicalRecord) -> Result<Uuid, StoreError>;

    /// Overwrites every field of an existing row.
    async fn update(&self, id: Uuid, record: &CanonicalRecord) -> Result<(), StoreError>;
}

type RowKey = (EntityKind, Source, String);

#[derive(Debug, Clone)]
struct MemoryRow {
    id: Uuid,
    record: CanonicalRecord,
}

/// In-process store for dry runs and tests. Counts every insert/update.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<RowKey, MemoryRow>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    pub async fn get(&self, kind: EntityKind, source: Source, source_id: &str) -> Option<CanonicalRecord> {
        let rows = self.rows.lock().await;
        rows.get(&(kind, source, source_id.to_string()))
            .map(|row| row.record.clone())
    }

    /// All rows, ordered by source then source id.
    pub async fn records(&self) -> Vec<CanonicalRecord> {
        let rows = self.rows.lock().await;
        let mut out = rows.values().map(|row| row.record.clone()).collect::<Vec<_>>();
        out.sort_by(|a, b| {
            (a.source(), a.source_id()).cmp(&(b.source(), b.source_id()))
        });
        out
    }

    fn key(record: &CanonicalRecord) -> RowKey {
        (record.kind(), record.source(), record.source_id().to_string())
    }

    fn slug_taken(rows: &HashMap<RowKey, MemoryRow>, record: &CanonicalRecord, except: Option<Uuid>) -> bool {
        rows.values().any(|row| {
            Some(row.id) != except && row.record.kind() == record.kind() && row.record.slug() == record.slug()
        })
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(
        &self,
        kind: EntityKind,
        source: Source,
        source_id: &str,
    ) -> Result<Option<StoredRef>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.get(&(kind, source, source_id.to_string())).map(|row| StoredRef {
            id: row.id,
            content_hash: row.record.content_hash().to_string(),
        }))
    }

    async fn insert(&self, record: &CanonicalRecord) -> Result<Uuid, StoreError> {
        let mut rows = self.rows.lock().await;
        if Self::slug_taken(&rows, record, None) {
            return Err(StoreError::SlugConflict(record.slug().to_string()));
        }
        let id = Uuid::new_v4();
        rows.insert(
            Self::key(record),
            MemoryRow {
                id,
                record: record.clone(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update(&self, id: Uuid, record: &CanonicalRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if Self::slug_taken(&rows, record, Some(id)) {
            return Err(StoreError::SlugConflict(record.slug().to_string()));
        }
        let row = rows
            .values_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound { kind: record.kind(), id })?;
        row.record = record.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Postgres-backed store over the `hackathons` / `grants` tables.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn insert_hackathon(&self, id: Uuid, h: &HackathonRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO hackathons (
                id, source, source_id, slug, name, description, short_description,
                start_date, end_date, dates_estimated, format, location,
                prize_amount, prize_currency, registration_url, website_url, logo_url,
                banner_url, participant_count, chains, chain_ids, categories, themes,
                sponsors, status, is_official, raw_data, content_hash, last_scraped_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29
            )
            "#,
        )
        .bind(id)
        .bind(h.source.as_str())
        .bind(&h.source_id)
        .bind(&h.slug)
        .bind(&h.name)
        .bind(&h.description)
        .bind(&h.short_description)
        .bind(h.start_date)
        .bind(h.end_date)
        .bind(h.dates_estimated)
        .bind(h.format.as_str())
        .bind(&h.location)
        .bind(h.prize_pool.as_ref().map(|m| m.amount))
        .bind(h.prize_pool.as_ref().map(|m| m.currency.clone()))
        .bind(&h.registration_url)
        .bind(&h.website_url)
        .bind(&h.logo_url)
        .bind(&h.banner_url)
        .bind(h.participant_count.map(i64::from))
        .bind(&h.chains)
        .bind(&h.chain_ids)
        .bind(&h.categories)
        .bind(&h.themes)
        .bind(&h.sponsors)
        .bind(h.status.as_str())
        .bind(h.is_official)
        .bind(&h.raw_data)
        .bind(&h.content_hash)
        .bind(h.last_scraped_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_hackathon(&self, id: Uuid, h: &HackathonRecord) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE hackathons
               SET slug = $2, name = $3, description = $4, short_description = $5,
                   start_date = $6, end_date = $7, dates_estimated = $8, format = $9,
                   location = $10, prize_amount = $11, prize_currency = $12,
                   registration_url = $13, website_url = $14, logo_url = $15,
                   banner_url = $16, participant_count = $17, chains = $18,
                   chain_ids = $19, categories = $20, themes = $21, sponsors = $22,
                   status = $23, is_official = $24, raw_data = $25,
                   content_hash = $26, last_scraped_at = $27, updated_at = NOW()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&h.slug)
        .bind(&h.name)
        .bind(&h.description)
        .bind(&h.short_description)
        .bind(h.start_date)
        .bind(h.end_date)
        .bind(h.dates_estimated)
        .bind(h.format.as_str())
        .bind(&h.location)
        .bind(h.prize_pool.as_ref().map(|m| m.amount))
        .bind(h.prize_pool.as_ref().map(|m| m.currency.clone()))
        .bind(&h.registration_url)
        .bind(&h.website_url)
        .bind(&h.logo_url)
        .bind(&h.banner_url)
        .bind(h.participant_count.map(i64::from))
        .bind(&h.chains)
        .bind(&h.chain_ids)
        .bind(&h.categories)
        .bind(&h.themes)
        .bind(&h.sponsors)
        .bind(h.status.as_str())
        .bind(h.is_official)
        .bind(&h.raw_data)
        .bind(&h.content_hash)
        .bind(h.last_scraped_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_grant(&self, id: Uuid, g: &GrantRecord) -> Result<(), StoreError> {
        let foundation = serde_json::to_value(&g.foundation)?;
        let funding = g.funding.as_ref().map(serde_json::to_value).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO grants (
                id, source, source_id, slug, name, description, short_description,
                foundation, funding, application_deadline, program_start_date,
                program_end_date, is_rolling, chains, chain_ids, categories, tracks,
                application_url, guidelines_url, logo_url, status, raw_data,
                content_hash, last_scraped_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            "#,
        )
        .bind(id)
        .bind(g.source.as_str())
        .bind(&g.source_id)
        .bind(&g.slug)
        .bind(&g.name)
        .bind(&g.description)
        .bind(&g.short_description)
        .bind(foundation)
        .bind(funding)
        .bind(g.application_deadline)
        .bind(g.program_start_date)
        .bind(g.program_end_date)
        .bind(g.is_rolling)
        .bind(&g.chains)
        .bind(&g.chain_ids)
        .bind(&g.categories)
        .bind(&g.tracks)
        .bind(&g.application_url)
        .bind(&g.guidelines_url)
        .bind(&g.logo_url)
        .bind(g.status.as_str())
        .bind(&g.raw_data)
        .bind(&g.content_hash)
        .bind(g.last_scraped_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_grant(&self, id: Uuid, g: &GrantRecord) -> Result<u64, StoreError> {
        let foundation = serde_json::to_value(&g.foundation)?;
        let funding = g.funding.as_ref().map(serde_json::to_value).transpose()?;
        let result = sqlx::query(
            r#"
            UPDATE grants
               SET slug = $2, name = $3, description = $4, short_description = $5,
                   foundation = $6, funding = $7, application_deadline = $8,
                   program_start_date = $9, program_end_date = $10, is_rolling = $11,
                   chains = $12, chain_ids = $13, categories = $14, tracks = $15,
                   application_url = $16, guidelines_url = $17, logo_url = $18,
                   status = $19, raw_data = $20, content_hash = $21,
                   last_scraped_at = $22, updated_at = NOW()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&g.slug)
        .bind(&g.name)
        .bind(&g.description)
        .bind(&g.short_description)
        .bind(foundation)
        .bind(funding)
        .bind(g.application_deadline)
        .bind(g.program_start_date)
        .bind(g.program_end_date)
        .bind(g.is_rolling)
        .bind(&g.chains)
        .bind(&g.chain_ids)
        .bind(&g.categories)
        .bind(&g.tracks)
        .bind(&g.application_url)
        .bind(&g.guidelines_url)
        .bind(&g.logo_url)
        .bind(g.status.as_str())
        .bind(&g.raw_data)
        .bind(&g.content_hash)
        .bind(g.last_scraped_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find(
        &self,
        kind: EntityKind,
        source: Source,
        source_id: &str,
    ) -> Result<Option<StoredRef>, StoreError> {
        let sql = format!(
            "SELECT id, content_hash FROM {} WHERE source = $1 AND source_id = $2",
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(source.as_str())
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(StoredRef {
                id: row.try_get("id")?,
                content_hash: row.try_get("content_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn insert(&self, record: &CanonicalRecord) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        match record {
            CanonicalRecord::Hackathon(h) => self.insert_hackathon(id, h).await?,
            CanonicalRecord::Grant(g) => self.insert_grant(id, g).await?,
        }
        debug!(%id, source = %record.source(), source_id = record.source_id(), "inserted row");
        Ok(id)
    }

    async fn update(&self, id: Uuid, record: &CanonicalRecord) -> Result<(), StoreError> {
        let affected = match record {
            CanonicalRecord::Hackathon(h) => self.update_hackathon(id, h).await?,
            CanonicalRecord::Grant(g) => self.update_grant(id, g).await?,
        };
        if affected == 0 {
            return Err(StoreError::NotFound { kind: record.kind(), id });
        }
        Ok(())
    }
}
