//! SQL Store - Relational Backend
//!
//! Durable [`AssetStore`] over SQLite. Assets are normalized into a parent
//! `assets` table plus one child table per variant (`charts` + `chart_data`,
//! `insights`, `audiences`); favourites live in a join table that carries the
//! variant tag so reads know which child table to load from.
//!
//! Every multi-statement write runs in one `BEGIN IMMEDIATE` transaction and
//! is rolled back on any error. Reads are plain independent statements.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::model::{Asset, AssetKind, Audience, Chart, ChartDataPoint, Favourite, Insight};
use crate::traits::AssetStore;

/// How long a write waits for another writer's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tables, created idempotently by [`SqlStore::ensure_schema`]
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        asset_id TEXT PRIMARY KEY,
        title TEXT,
        description TEXT NOT NULL DEFAULT '',
        asset_type TEXT NOT NULL,
        user_id TEXT NOT NULL REFERENCES users(id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS assets_user_id_idx ON assets(user_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS charts (
        id TEXT PRIMARY KEY REFERENCES assets(asset_id),
        title TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        x_axis_title TEXT NOT NULL DEFAULT '',
        y_axis_title TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chart_data (
        chart_id TEXT NOT NULL REFERENCES charts(id),
        datapoint_code TEXT NOT NULL,
        value REAL NOT NULL,
        PRIMARY KEY (chart_id, datapoint_code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS insights (
        id TEXT PRIMARY KEY REFERENCES assets(asset_id),
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audiences (
        id TEXT PRIMARY KEY REFERENCES assets(asset_id),
        gender TEXT NOT NULL DEFAULT '',
        country TEXT NOT NULL DEFAULT '',
        age_group TEXT NOT NULL DEFAULT '',
        social_hours INTEGER NOT NULL DEFAULT 0,
        purchases INTEGER NOT NULL DEFAULT 0,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS favourites (
        user_id TEXT NOT NULL REFERENCES users(id),
        asset_id TEXT NOT NULL REFERENCES assets(asset_id),
        asset_type TEXT NOT NULL,
        PRIMARY KEY (user_id, asset_id)
    )
    "#,
];

// Helper structs for sqlx query_as
#[derive(sqlx::FromRow)]
struct AssetRefRow {
    asset_id: String,
    asset_type: String,
}

#[derive(sqlx::FromRow)]
struct ChartRow {
    id: String,
    title: String,
    description: String,
    x_axis_title: String,
    y_axis_title: String,
}

#[derive(sqlx::FromRow)]
struct ChartDataRow {
    datapoint_code: String,
    value: f64,
}

#[derive(sqlx::FromRow)]
struct InsightRow {
    id: String,
    description: String,
}

#[derive(sqlx::FromRow)]
struct AudienceRow {
    id: String,
    gender: String,
    country: String,
    age_group: String,
    social_hours: i32,
    purchases: i32,
    description: String,
}

impl ChartRow {
    fn into_chart(self, data: Vec<ChartDataRow>) -> Chart {
        Chart {
            id: self.id,
            title: self.title,
            description: self.description,
            x_axis_title: self.x_axis_title,
            y_axis_title: self.y_axis_title,
            data: data
                .into_iter()
                .map(|row| ChartDataPoint::new(row.datapoint_code, row.value))
                .collect(),
        }
    }
}

impl From<InsightRow> for Insight {
    fn from(row: InsightRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
        }
    }
}

impl From<AudienceRow> for Audience {
    fn from(row: AudienceRow) -> Self {
        Self {
            id: row.id,
            gender: row.gender,
            country: row.country,
            age_group: row.age_group,
            social_hours: row.social_hours,
            purchases: row.purchases,
            description: row.description,
        }
    }
}

fn parse_stored_kind(asset_id: &str, asset_type: &str) -> StoreResult<AssetKind> {
    AssetKind::from_str(asset_type).map_err(|_| StoreError::UnknownStoredType {
        asset_id: asset_id.to_string(),
        asset_type: asset_type.to_string(),
    })
}

/// Write transaction opened with `BEGIN IMMEDIATE`
///
/// The write lock is taken before the first read, so concurrent writers wait
/// on the busy timeout instead of failing a read-to-write lock upgrade with
/// `SQLITE_BUSY`. Dropped before [`settle`](Self::settle), the connection is
/// rolled back on a background task before it can return to the pool.
struct WriteTx {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTx {
    async fn begin(pool: &SqlitePool) -> StoreResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> &mut SqliteConnection {
        match self.conn.as_deref_mut() {
            Some(conn) => conn,
            // Only `settle` and `drop` take the connection, and both consume the guard
            None => unreachable!("write transaction used after settle"),
        }
    }

    /// Commit on success, roll back on failure
    async fn settle<T>(mut self, outcome: StoreResult<T>) -> StoreResult<T> {
        let end = if outcome.is_ok() { "COMMIT" } else { "ROLLBACK" };

        let ended = sqlx::query(end).execute(self.conn()).await;
        match ended {
            Ok(_) => {
                // Back to the pool outside any transaction
                self.conn.take();
                outcome
            }
            Err(end_err) => {
                warn!(statement = end, error = %end_err, "[Sql] Failed to end write transaction");
                // Drop rolls back whatever is left open
                outcome.and(Err(end_err.into()))
            }
        }
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        warn!("[Sql] Write transaction left open, rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        warn!(error = %err, "[Sql] Rollback failed, closing connection");
                        drop(conn.detach());
                    }
                });
            }
            // Closing the connection discards the transaction
            Err(_) => drop(conn.detach()),
        }
    }
}

/// Whether `database_url` names an in-memory database
fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// SQLite-backed asset store
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Connect to `database_url` and create the schema if needed
    ///
    /// File databases are opened in WAL mode so reads never wait on a writer.
    /// In-memory URLs keep their query options but get a single pinned
    /// connection, since a memory database lives and dies with its connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the database cannot be opened,
    /// or the schema cannot be created.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid SQLite database URL: {database_url}"))?
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = if is_memory_url(database_url) {
            info!(database_url = %database_url, "Opening in-memory SQLite asset store");
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            info!(database_url = %database_url, "Opening SQLite asset store");
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(
                    options
                        .create_if_missing(true)
                        .journal_mode(SqliteJournalMode::Wal),
                )
                .await
        }
        .with_context(|| format!("Failed to connect to SQLite database at: {database_url}"))?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database, mainly for tests
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot be opened or the schema cannot be created.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Wrap an existing pool and create the schema if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store
            .ensure_schema()
            .await
            .context("Failed to create asset store schema")?;
        info!("SQLite asset store ready");
        Ok(store)
    }

    /// Create missing tables; existing tables are left untouched
    ///
    /// # Errors
    ///
    /// Returns an error if a `CREATE` statement fails.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Variant tag of `asset_id` if `user_id` owns it
    async fn owned_kind(
        conn: &mut SqliteConnection,
        user_id: &str,
        asset_id: &str,
    ) -> StoreResult<Option<AssetKind>> {
        let asset_type: Option<String> = sqlx::query_scalar(
            r#"
            SELECT asset_type FROM assets WHERE asset_id = ?1 AND user_id = ?2
            "#,
        )
        .bind(asset_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        asset_type
            .map(|asset_type| parse_stored_kind(asset_id, &asset_type))
            .transpose()
    }

    /// Returns `false` without writing anything if the ID is already taken
    async fn insert_asset(conn: &mut SqliteConnection, user_id: &str, asset: &Asset) -> StoreResult<bool> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name) VALUES (?1, NULL)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        let title = match asset {
            Asset::Chart(chart) => Some(chart.title.as_str()),
            Asset::Insight(_) | Asset::Audience(_) => None,
        };
        let inserted = sqlx::query(
            r#"
            INSERT INTO assets (asset_id, title, description, asset_type, user_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(asset_id) DO NOTHING
            "#,
        )
        .bind(asset.id())
        .bind(title)
        .bind(asset.description())
        .bind(asset.kind().as_str())
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Ok(false);
        }

        match asset {
            Asset::Chart(chart) => {
                sqlx::query(
                    r#"
                    INSERT INTO charts (id, title, description, x_axis_title, y_axis_title)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )
                .bind(&chart.id)
                .bind(&chart.title)
                .bind(&chart.description)
                .bind(&chart.x_axis_title)
                .bind(&chart.y_axis_title)
                .execute(&mut *conn)
                .await?;

                for point in &chart.data {
                    sqlx::query(
                        r#"
                        INSERT INTO chart_data (chart_id, datapoint_code, value)
                        VALUES (?1, ?2, ?3)
                        "#,
                    )
                    .bind(&chart.id)
                    .bind(&point.datapoint_code)
                    .bind(point.value)
                    .execute(&mut *conn)
                    .await?;
                }
            }
            Asset::Insight(insight) => {
                sqlx::query(
                    r#"
                    INSERT INTO insights (id, description) VALUES (?1, ?2)
                    "#,
                )
                .bind(&insight.id)
                .bind(&insight.description)
                .execute(&mut *conn)
                .await?;
            }
            Asset::Audience(audience) => {
                sqlx::query(
                    r#"
                    INSERT INTO audiences (id, gender, country, age_group, social_hours, purchases, description)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(&audience.id)
                .bind(&audience.gender)
                .bind(&audience.country)
                .bind(&audience.age_group)
                .bind(audience.social_hours)
                .bind(audience.purchases)
                .bind(&audience.description)
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(true)
    }

    async fn delete_asset(conn: &mut SqliteConnection, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        let Some(kind) = Self::owned_kind(conn, user_id, asset_id).await? else {
            return Ok(false);
        };

        // Children first; every table below references its parent
        sqlx::query("DELETE FROM favourites WHERE asset_id = ?1")
            .bind(asset_id)
            .execute(&mut *conn)
            .await?;

        match kind {
            AssetKind::Chart => {
                sqlx::query("DELETE FROM chart_data WHERE chart_id = ?1")
                    .bind(asset_id)
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("DELETE FROM charts WHERE id = ?1")
                    .bind(asset_id)
                    .execute(&mut *conn)
                    .await?;
            }
            AssetKind::Insight => {
                sqlx::query("DELETE FROM insights WHERE id = ?1")
                    .bind(asset_id)
                    .execute(&mut *conn)
                    .await?;
            }
            AssetKind::Audience => {
                sqlx::query("DELETE FROM audiences WHERE id = ?1")
                    .bind(asset_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        let deleted = sqlx::query("DELETE FROM assets WHERE asset_id = ?1 AND user_id = ?2")
            .bind(asset_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn update_description(
        conn: &mut SqliteConnection,
        user_id: &str,
        asset_id: &str,
        description: &str,
    ) -> StoreResult<bool> {
        let parent = sqlx::query(
            r#"
            UPDATE assets SET description = ?1 WHERE asset_id = ?2 AND user_id = ?3
            "#,
        )
        .bind(description)
        .bind(asset_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if parent == 0 {
            return Ok(false);
        }

        // One statement per variant table; only the owning table has a matching row
        let mut children = 0;
        for statement in [
            "UPDATE charts SET description = ?1 WHERE id = ?2",
            "UPDATE insights SET description = ?1 WHERE id = ?2",
            "UPDATE audiences SET description = ?1 WHERE id = ?2",
        ] {
            children += sqlx::query(statement)
                .bind(description)
                .bind(asset_id)
                .execute(&mut *conn)
                .await?
                .rows_affected();
        }

        if children == 0 {
            warn!(asset_id = %asset_id, "[Sql] Asset has no variant row; only the parent description was updated");
        }
        Ok(true)
    }

    async fn insert_favourite(
        conn: &mut SqliteConnection,
        user_id: &str,
        asset_id: &str,
        kind: AssetKind,
    ) -> StoreResult<bool> {
        match Self::owned_kind(conn, user_id, asset_id).await? {
            None => {
                warn!(user_id = %user_id, asset_id = %asset_id, "[Sql] Favourite rejected: asset not owned by user");
                return Ok(false);
            }
            Some(stored) if stored != kind => {
                warn!(user_id = %user_id, asset_id = %asset_id, stored = %stored, requested = %kind, "[Sql] Favourite rejected: asset type mismatch");
                return Ok(false);
            }
            Some(_) => {}
        }

        sqlx::query(
            r#"
            INSERT INTO favourites (user_id, asset_id, asset_type) VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, asset_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(asset_id)
        .bind(kind.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(true)
    }

    /// Full variant payload of one asset; `None` if its child row is gone
    async fn load_asset(&self, asset_id: &str, kind: AssetKind) -> StoreResult<Option<Asset>> {
        let asset = match kind {
            AssetKind::Chart => {
                let row: Option<ChartRow> = sqlx::query_as(
                    r#"
                    SELECT id, title, description, x_axis_title, y_axis_title
                    FROM charts WHERE id = ?1
                    "#,
                )
                .bind(asset_id)
                .fetch_optional(&self.pool)
                .await?;

                match row {
                    Some(row) => {
                        let data: Vec<ChartDataRow> = sqlx::query_as(
                            r#"
                            SELECT datapoint_code, value FROM chart_data
                            WHERE chart_id = ?1
                            ORDER BY rowid
                            "#,
                        )
                        .bind(asset_id)
                        .fetch_all(&self.pool)
                        .await?;
                        Some(Asset::Chart(row.into_chart(data)))
                    }
                    None => None,
                }
            }
            AssetKind::Insight => {
                let row: Option<InsightRow> =
                    sqlx::query_as("SELECT id, description FROM insights WHERE id = ?1")
                        .bind(asset_id)
                        .fetch_optional(&self.pool)
                        .await?;
                row.map(|row| Asset::Insight(row.into()))
            }
            AssetKind::Audience => {
                let row: Option<AudienceRow> = sqlx::query_as(
                    r#"
                    SELECT id, gender, country, age_group, social_hours, purchases, description
                    FROM audiences WHERE id = ?1
                    "#,
                )
                .bind(asset_id)
                .fetch_optional(&self.pool)
                .await?;
                row.map(|row| Asset::Audience(row.into()))
            }
        };

        if asset.is_none() {
            // A concurrent remove between the listing and this read ends up here
            warn!(asset_id = %asset_id, kind = %kind, "[Sql] Asset row has no variant row, skipping");
        }
        Ok(asset)
    }

    /// Resolve listed `(asset_id, asset_type)` rows into full assets
    async fn load_listed(&self, rows: Vec<AssetRefRow>) -> StoreResult<Vec<Asset>> {
        let mut assets = Vec::with_capacity(rows.len());
        for row in rows {
            let kind = parse_stored_kind(&row.asset_id, &row.asset_type)?;
            if let Some(asset) = self.load_asset(&row.asset_id, kind).await? {
                assets.push(asset);
            }
        }
        Ok(assets)
    }
}

#[async_trait]
impl AssetStore for SqlStore {
    async fn get(&self, user_id: &str) -> StoreResult<Vec<Asset>> {
        debug!(user_id = %user_id, "[Sql] get");

        let rows: Vec<AssetRefRow> = sqlx::query_as(
            r#"
            SELECT asset_id, asset_type FROM assets WHERE user_id = ?1 ORDER BY rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| error!(user_id = %user_id, error = %e, "[Sql] Failed to list assets"))?;

        self.load_listed(rows).await
    }

    async fn add(&self, user_id: &str, asset: Asset) -> StoreResult<()> {
        debug!(user_id = %user_id, asset_id = %asset.id(), kind = %asset.kind(), "[Sql] add");

        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = Self::insert_asset(tx.conn(), user_id, &asset).await;
        let inserted = tx.settle(outcome)
            .await
            .inspect_err(|e| error!(user_id = %user_id, asset_id = %asset.id(), error = %e, "[Sql] Failed to add asset"))?;

        if !inserted {
            debug!(user_id = %user_id, asset_id = %asset.id(), "[Sql] Asset already exists, ignoring add");
        }
        Ok(())
    }

    async fn remove(&self, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        debug!(user_id = %user_id, asset_id = %asset_id, "[Sql] remove");

        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = Self::delete_asset(tx.conn(), user_id, asset_id).await;
        tx.settle(outcome)
            .await
            .inspect_err(|e| error!(user_id = %user_id, asset_id = %asset_id, error = %e, "[Sql] Failed to remove asset"))
    }

    async fn edit_description(
        &self,
        user_id: &str,
        asset_id: &str,
        description: &str,
    ) -> StoreResult<bool> {
        debug!(user_id = %user_id, asset_id = %asset_id, "[Sql] edit_description");

        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = Self::update_description(tx.conn(), user_id, asset_id, description).await;
        tx.settle(outcome)
            .await
            .inspect_err(|e| error!(user_id = %user_id, asset_id = %asset_id, error = %e, "[Sql] Failed to edit description"))
    }

    async fn get_favourites(&self, user_id: &str) -> StoreResult<Vec<Favourite>> {
        debug!(user_id = %user_id, "[Sql] get_favourites");

        let rows: Vec<AssetRefRow> = sqlx::query_as(
            r#"
            SELECT asset_id, asset_type FROM favourites WHERE user_id = ?1 ORDER BY rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| error!(user_id = %user_id, error = %e, "[Sql] Failed to list favourites"))?;

        Ok(self
            .load_listed(rows)
            .await?
            .into_iter()
            .map(|asset| Favourite::new(user_id, asset))
            .collect())
    }

    async fn add_favourite(
        &self,
        user_id: &str,
        asset_id: &str,
        kind: AssetKind,
    ) -> StoreResult<bool> {
        debug!(user_id = %user_id, asset_id = %asset_id, kind = %kind, "[Sql] add_favourite");

        let mut tx = WriteTx::begin(&self.pool).await?;
        let outcome = Self::insert_favourite(tx.conn(), user_id, asset_id, kind).await;
        tx.settle(outcome)
            .await
            .inspect_err(|e| error!(user_id = %user_id, asset_id = %asset_id, error = %e, "[Sql] Failed to add favourite"))
    }

    async fn remove_favourite(&self, user_id: &str, asset_id: &str) -> StoreResult<bool> {
        debug!(user_id = %user_id, asset_id = %asset_id, "[Sql] remove_favourite");

        let deleted = sqlx::query("DELETE FROM favourites WHERE user_id = ?1 AND asset_id = ?2")
            .bind(user_id)
            .bind(asset_id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| error!(user_id = %user_id, asset_id = %asset_id, error = %e, "[Sql] Failed to remove favourite"))?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn name(&self) -> &'static str {
        "Sql"
    }
}
