use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Result, Venue, VenueId, VenueName, VenueStatus, VenueStoreError,
    store::{VenueStore, VenueTransaction},
};

/// Key of the transaction-scoped advisory lock guarding the first-sold-out marker.
const FIRST_SOLD_OUT_LOCK_KEY: i64 = 0x5645_4e55_4546;

/// Name of the partial unique index allowing a single marker holder.
const SINGLE_HOLDER_INDEX: &str = "venues_single_first_sold_out";

const VENUE_COLUMNS: &str =
    "id, name, is_sold_out, is_first_sold_out, created_at, updated_at, deleted_at";

/// PostgreSQL-backed venue store implementation.
#[derive(Clone)]
pub struct PostgresVenueStore {
    pool: PgPool,
}

impl PostgresVenueStore {
    /// Creates a new PostgreSQL venue store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn row_to_venue(row: PgRow) -> Result<Venue> {
    let name: String = row.try_get("name")?;
    let name = VenueName::parse(name)
        .map_err(|e| VenueStoreError::InvalidRow(format!("venue name: {e}")))?;

    Ok(Venue {
        id: VenueId::new(row.try_get("id")?),
        name,
        sold_out: row.try_get("is_sold_out")?,
        first_sold_out: row.try_get("is_first_sold_out")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

/// Maps a violation of the single-holder index to a typed conflict.
fn map_write_error(e: sqlx::Error, venue: &VenueName) -> VenueStoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.constraint() == Some(SINGLE_HOLDER_INDEX)
    {
        tracing::warn!(%venue, "single first-sold-out holder index rejected write");
        return VenueStoreError::FirstSoldOutConflict {
            venue: venue.clone(),
        };
    }
    VenueStoreError::Database(e)
}

#[async_trait]
impl VenueStore for PostgresVenueStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn find_by_name(&self, name: &VenueName) -> Result<Option<Venue>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {VENUE_COLUMNS} FROM venues WHERE name = $1 AND deleted_at IS NULL"
        ))
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_venue).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Venue>> {
        let rows = sqlx::query(&format!(
            "SELECT {VENUE_COLUMNS} FROM venues WHERE deleted_at IS NULL ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_venue).collect()
    }
}

/// Transaction over a [`PostgresVenueStore`].
///
/// Wraps an `sqlx` transaction; dropping it without commit rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl VenueTransaction for PostgresTransaction {
    async fn lock_first_sold_out(&mut self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(FIRST_SOLD_OUT_LOCK_KEY)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_for_update(&mut self, name: &VenueName) -> Result<Option<Venue>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {VENUE_COLUMNS} FROM venues WHERE name = $1 FOR UPDATE"
        ))
        .bind(name.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_venue).transpose()
    }

    async fn first_sold_out_holder(
        &mut self,
        excluding: &VenueName,
    ) -> Result<Option<VenueName>> {
        let holder: Option<String> = sqlx::query_scalar(
            r#"
            SELECT name FROM venues
            WHERE is_first_sold_out AND deleted_at IS NULL AND name <> $1
            LIMIT 1
            "#,
        )
        .bind(excluding.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        holder
            .map(|name| {
                VenueName::parse(name)
                    .map_err(|e| VenueStoreError::InvalidRow(format!("venue name: {e}")))
            })
            .transpose()
    }

    async fn release_first_sold_out(&mut self, keep: &VenueName) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE venues
            SET is_first_sold_out = FALSE, updated_at = NOW()
            WHERE is_first_sold_out AND name <> $1
            "#,
        )
        .bind(keep.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert(&mut self, name: &VenueName, status: VenueStatus) -> Result<Venue> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO venues (name, is_sold_out, is_first_sold_out)
            VALUES ($1, $2, $3)
            RETURNING {VENUE_COLUMNS}
            "#
        ))
        .bind(name.as_str())
        .bind(status.sold_out)
        .bind(status.first_sold_out)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, name))?;

        row_to_venue(row)
    }

    async fn update(&mut self, existing: &Venue, status: VenueStatus) -> Result<Venue> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE venues
            SET is_sold_out = $2, is_first_sold_out = $3, updated_at = NOW(), deleted_at = NULL
            WHERE id = $1
            RETURNING {VENUE_COLUMNS}
            "#
        ))
        .bind(existing.id.as_i64())
        .bind(status.sold_out)
        .bind(status.first_sold_out)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, &existing.name))?
        .ok_or_else(|| {
            VenueStoreError::InvalidRow(format!("no venue with id {}", existing.id))
        })?;

        row_to_venue(row)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
