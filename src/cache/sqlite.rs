//! SQLite Backend
//!
//! Persistent favicon cache. Icons are stored once per content digest in
//! `blobs`; `blob_map` maps each `(resolver, authority)` to a digest and the
//! time of its last write. A `properties` table holds the schema version and
//! the time of the last maintenance sweep.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, Pool, Sqlite};
use tracing::{debug, error, info, warn};

use crate::cache::{
    admit, current_timestamp_secs, Admitted, CacheBackend, Lookup, MaintenanceReport,
    StorageSummary, SENTINEL_DIGEST,
};
use crate::config::{Config, MaintenanceMode};
use crate::error::{CacheError, Result};

/// Version of the database layout; a database with another version is refused.
pub const DB_SCHEMA: i64 = 1;

/// Oldest SQLite library with `INSERT ... ON CONFLICT DO UPDATE` support
/// for every statement used here.
pub const MIN_SQLITE_VERSION: (u32, u32, u32) = (3, 35, 0);

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PROP_DB_SCHEMA: &str = "DB_SCHEMA";
const PROP_LAST_MAINTENANCE: &str = "LAST_MAINTENANCE";

const DDL_PROPERTIES: &str = "\
CREATE TABLE IF NOT EXISTS properties (
  name       TEXT,
  value      TEXT,
  m_time     INTEGER DEFAULT (strftime('%s', 'now')),
  PRIMARY KEY (name))";

const DDL_BLOBS: &str = "\
CREATE TABLE IF NOT EXISTS blobs (
  sha256     TEXT,
  bytes_c    INTEGER,
  mime       TEXT NOT NULL,
  data       BLOB NOT NULL,
  PRIMARY KEY (sha256))";

const DDL_BLOB_MAP: &str = "\
CREATE TABLE IF NOT EXISTS blob_map (
  m_time     INTEGER DEFAULT (strftime('%s', 'now')),
  sha256     TEXT NOT NULL,
  resolver   TEXT,
  authority  TEXT,
  PRIMARY KEY (resolver, authority))";

const DDL_CREATE_TABLES: [(&str, &str); 2] = [("blobs", DDL_BLOBS), ("blob_map", DDL_BLOB_MAP)];

const SQL_GET_PROPERTY: &str = "SELECT value FROM properties WHERE name = ?";
const SQL_GET_PROPERTY_M_TIME: &str = "SELECT m_time FROM properties WHERE name = ?";
const SQL_SET_PROPERTY: &str = "\
INSERT INTO properties (name, value, m_time) VALUES (?, ?, ?)
    ON CONFLICT (name) DO UPDATE
   SET value = excluded.value, m_time = excluded.m_time";

const SQL_LOOKUP_MAP: &str = "SELECT sha256 FROM blob_map WHERE resolver = ? AND authority = ?";
const SQL_LOOKUP_BLOB: &str = "SELECT data, mime FROM blobs WHERE sha256 = ?";

const SQL_INSERT_BLOB: &str = "\
INSERT INTO blobs (sha256, bytes_c, mime, data) VALUES (?, ?, ?, ?)
    ON CONFLICT (sha256) DO NOTHING";

const SQL_UPSERT_BLOB_MAP: &str = "\
INSERT INTO blob_map (sha256, resolver, authority, m_time) VALUES (?, ?, ?, ?)
    ON CONFLICT (resolver, authority) DO UPDATE
   SET sha256 = excluded.sha256, m_time = excluded.m_time";

const SQL_DROP_EXPIRED_MAPPINGS: &str = "DELETE FROM blob_map WHERE m_time < ?";

const SQL_DROP_LEFTOVER_BLOBS: &str = "\
DELETE FROM blobs WHERE sha256 IN (
  SELECT b.sha256
    FROM blobs b
    LEFT JOIN blob_map bm
      ON b.sha256 = bm.sha256
   WHERE bm.sha256 IS NULL)";

const SQL_TOTAL_BYTES: &str = "SELECT COALESCE(SUM(bytes_c), 0) FROM blobs";

/// Blobs ordered by the last write of their oldest referencing mapping.
const SQL_BLOBS_BY_OLDEST_MAPPING: &str = "\
SELECT b.sha256, b.bytes_c
  FROM blobs b
  JOIN blob_map bm
    ON b.sha256 = bm.sha256
 GROUP BY b.sha256, b.bytes_c
 ORDER BY MIN(bm.m_time) ASC, b.sha256 ASC";

const SQL_DROP_BLOB: &str = "DELETE FROM blobs WHERE sha256 = ?";
const SQL_DROP_BLOB_MAPPINGS: &str = "DELETE FROM blob_map WHERE sha256 = ?";

// == SQLite Cache ==
/// Favicon cache persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: Pool<Sqlite>,
    hold_time: i64,
    limit_total_bytes: u64,
    blob_max_bytes: u64,
    maintenance_period: i64,
    maintenance_mode: MaintenanceMode,
}

impl SqliteCache {
    // == Constructor ==
    /// Opens (and if needed creates) the database at `config.db_url`.
    ///
    /// Fails with [`CacheError::BackendUnavailable`] when the SQLite library
    /// is too old, and with [`CacheError::SchemaMismatch`] when the database
    /// was created with another schema version.
    pub async fn open(config: &Config) -> Result<Self> {
        let in_memory = config.db_url == Path::new(":memory:");

        let pool = if in_memory {
            warn!("don't use SQLite DB in :memory: in production!!");
            let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.busy_timeout(BUSY_TIMEOUT);
            // Every connection to :memory: is its own database; keep exactly one alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(opts)
                .await?
        } else {
            if let Some(parent) = config.db_url.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let opts = SqliteConnectOptions::new()
                .filename(&config.db_url)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(BUSY_TIMEOUT);
            SqlitePoolOptions::new()
                .max_connections(DEFAULT_MAX_CONNECTIONS)
                .connect_with(opts)
                .await?
        };

        let cache = Self {
            pool,
            hold_time: to_i64(config.hold_time),
            limit_total_bytes: config.limit_total_bytes,
            blob_max_bytes: config.blob_max_bytes,
            maintenance_period: to_i64(config.maintenance_period),
            maintenance_mode: config.maintenance_mode,
        };

        cache.check_library_version().await?;
        cache.init_schema().await?;

        info!(
            "favicon cache opened: db={} hold_time={}s limit_total_bytes={} blob_max_bytes={} maintenance={}",
            config.db_url.display(),
            config.hold_time,
            config.limit_total_bytes,
            config.blob_max_bytes,
            config.maintenance_mode
        );
        Ok(cache)
    }

    /// Connection pool, for inspection in tests and tools.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn check_library_version(&self) -> Result<()> {
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await?;

        match parse_sqlite_version(&version) {
            Some(v) if v >= MIN_SQLITE_VERSION => {
                debug!("SQLite library version {}", version);
                Ok(())
            }
            _ => Err(CacheError::BackendUnavailable(format!(
                "SQLite library ({}) is too old! (require >= {}.{}.{})",
                version, MIN_SQLITE_VERSION.0, MIN_SQLITE_VERSION.1, MIN_SQLITE_VERSION.2
            ))),
        }
    }

    // == Schema ==
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(DDL_PROPERTIES).execute(&self.pool).await?;

        match self.property(PROP_DB_SCHEMA).await? {
            None => self.create_schema().await,
            Some(found) if found.trim().parse::<i64>().ok() == Some(DB_SCHEMA) => {
                debug!("DB_SCHEMA = {}", DB_SCHEMA);
                Ok(())
            }
            Some(found) => Err(CacheError::SchemaMismatch {
                expected: DB_SCHEMA,
                found,
            }),
        }
    }

    async fn create_schema(&self) -> Result<()> {
        debug!("create schema ..");
        let now = current_timestamp_secs();
        let mut tx = self.pool.begin().await?;

        for (table_name, ddl) in DDL_CREATE_TABLES {
            sqlx::query(ddl).execute(&mut *tx).await?;
            set_property(
                &mut *tx,
                &format!("Table {} created", table_name),
                table_name,
                now,
            )
            .await?;
        }
        set_property(&mut *tx, PROP_DB_SCHEMA, &DB_SCHEMA.to_string(), now).await?;
        set_property(&mut *tx, PROP_LAST_MAINTENANCE, "", now).await?;

        tx.commit().await?;
        Ok(())
    }

    // == Properties ==
    async fn property(&self, name: &str) -> Result<Option<String>> {
        let value: Option<Option<String>> = sqlx::query_scalar(SQL_GET_PROPERTY)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.flatten())
    }

    async fn property_m_time(&self, name: &str) -> Result<i64> {
        let m_time: Option<Option<i64>> = sqlx::query_scalar(SQL_GET_PROPERTY_M_TIME)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(m_time.flatten().unwrap_or(0))
    }

    // == Maintenance Schedule ==
    /// Unix time from which the next maintenance sweep is due.
    pub async fn next_maintenance_time(&self) -> Result<i64> {
        let last = self.property_m_time(PROP_LAST_MAINTENANCE).await?;
        Ok(last.saturating_add(self.maintenance_period))
    }

    /// A sweep is due from the scheduled second on.
    async fn maintenance_due(&self, now: i64) -> Result<bool> {
        Ok(now >= self.next_maintenance_time().await?)
    }

    /// Writes only trigger the inline sweep once the scheduled second has passed.
    async fn inline_maintenance_due(&self, now: i64) -> Result<bool> {
        Ok(now > self.next_maintenance_time().await?)
    }

    // == Store ==
    /// Stores a resolution as if the current time were `now`.
    pub async fn store_at(
        &self,
        now: i64,
        resolver: &str,
        authority: &str,
        mime: Option<&str>,
        data: Option<&[u8]>,
    ) -> Result<bool> {
        let Some(admitted) = admit(resolver, authority, mime, data, self.blob_max_bytes) else {
            return Ok(false);
        };

        if self.maintenance_mode == MaintenanceMode::Auto && self.inline_maintenance_due(now).await? {
            if let Err(e) = self.maintenance_at(now, false).await {
                warn!("favicon cache maintenance failed: {}", e);
            }
        }

        // Blob and mapping are committed together or not at all.
        let mut tx = self.pool.begin().await?;
        if let Admitted::Blob { digest, mime, data } = &admitted {
            sqlx::query(SQL_INSERT_BLOB)
                .bind(digest.as_str())
                .bind(data.len() as i64)
                .bind(*mime)
                .bind(*data)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(SQL_UPSERT_BLOB_MAP)
            .bind(admitted.digest())
            .bind(resolver)
            .bind(authority)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(true)
    }

    // == Maintenance ==
    /// Runs a maintenance sweep as if the current time were `now`.
    ///
    /// Without `force` nothing happens until the maintenance period has
    /// elapsed. Concurrent callers may both run a sweep; the deletes are
    /// idempotent.
    pub async fn maintenance_at(&self, now: i64, force: bool) -> Result<Option<MaintenanceReport>> {
        if !force && !self.maintenance_due(now).await? {
            debug!("no maintenance required yet, next maintenance interval is in the future");
            return Ok(None);
        }
        set_property(&self.pool, PROP_LAST_MAINTENANCE, "", now).await?;

        let mut report = MaintenanceReport::default();
        let mut tx = self.pool.begin().await?;

        report.expired_mappings = sqlx::query(SQL_DROP_EXPIRED_MAPPINGS)
            .bind(now.saturating_sub(self.hold_time))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!("dropped {} obsolete blob_map items from db", report.expired_mappings);

        report.orphaned_blobs = sqlx::query(SQL_DROP_LEFTOVER_BLOBS)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!("dropped {} obsolete BLOBS from db", report.orphaned_blobs);

        let total: i64 = sqlx::query_scalar(SQL_TOTAL_BYTES)
            .fetch_one(&mut *tx)
            .await?;
        report.total_bytes_before = total.max(0) as u64;
        report.total_bytes_after = report.total_bytes_before;

        if report.total_bytes_before > self.limit_total_bytes {
            let excess = report.total_bytes_before - self.limit_total_bytes;
            let candidates: Vec<(String, i64)> = sqlx::query_as(SQL_BLOBS_BY_OLDEST_MAPPING)
                .fetch_all(&mut *tx)
                .await?;

            let (victims, freed) = select_eviction_victims(&candidates, excess);
            for digest in &victims {
                sqlx::query(SQL_DROP_BLOB)
                    .bind(*digest)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(SQL_DROP_BLOB_MAPPINGS)
                    .bind(*digest)
                    .execute(&mut *tx)
                    .await?;
            }

            report.evicted_blobs = victims.len() as u64;
            report.evicted_bytes = freed;
            report.total_bytes_after = report.total_bytes_before.saturating_sub(freed);
            debug!(
                "dropped {} blobs with total size of {} bytes",
                report.evicted_blobs, freed
            );
        }

        tx.commit().await?;

        info!(
            "favicon cache maintenance: expired_mappings={} orphaned_blobs={} evicted_blobs={} total_bytes={}",
            report.expired_mappings,
            report.orphaned_blobs,
            report.evicted_blobs,
            report.total_bytes_after
        );
        Ok(Some(report))
    }

    // == Counts ==
    /// Number of stored blobs.
    pub async fn blob_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Number of mapping entries, negative ones included.
    pub async fn mapping_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blob_map")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Sum of all stored blob sizes.
    pub async fn total_bytes(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(SQL_TOTAL_BYTES)
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }
}

#[async_trait]
impl CacheBackend for SqliteCache {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn lookup(&self, resolver: &str, authority: &str) -> Result<Lookup> {
        // Mapping and blob are read from one snapshot, a concurrent sweep
        // cannot remove the blob in between.
        let mut tx = self.pool.begin().await?;

        let digest: Option<String> = sqlx::query_scalar(SQL_LOOKUP_MAP)
            .bind(resolver)
            .bind(authority)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(digest) = digest else {
            return Ok(Lookup::Miss);
        };
        if digest == SENTINEL_DIGEST {
            return Ok(Lookup::NegativeHit);
        }

        let blob: Option<(Vec<u8>, String)> = sqlx::query_as(SQL_LOOKUP_BLOB)
            .bind(&digest)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;

        match blob {
            Some((data, mime)) => Ok(Lookup::PositiveHit { data, mime }),
            None => {
                error!(
                    "blob_map entry {} / {} points to missing blob {}",
                    resolver, authority, digest
                );
                Ok(Lookup::Miss)
            }
        }
    }

    async fn store(
        &self,
        resolver: &str,
        authority: &str,
        mime: Option<&str>,
        data: Option<&[u8]>,
    ) -> Result<bool> {
        self.store_at(current_timestamp_secs(), resolver, authority, mime, data)
            .await
    }

    async fn maintenance(&self, force: bool) -> Result<Option<MaintenanceReport>> {
        self.maintenance_at(current_timestamp_secs(), force).await
    }

    async fn summary(&self) -> Result<StorageSummary> {
        Ok(StorageSummary {
            blob_count: self.blob_count().await?,
            mapping_count: self.mapping_count().await?,
            total_bytes: self.total_bytes().await?,
        })
    }
}

// == Helpers ==
async fn set_property<'e, E>(executor: E, name: &str, value: &str, now: i64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(SQL_SET_PROPERTY)
        .bind(name)
        .bind(value)
        .bind(now)
        .execute(executor)
        .await?;
    Ok(())
}

/// Picks blobs from the front of `candidates` until their sizes cover `excess`.
///
/// Returns the selected digests and the number of bytes they free.
fn select_eviction_victims(candidates: &[(String, i64)], excess: u64) -> (Vec<&str>, u64) {
    let mut victims = Vec::new();
    let mut freed: u64 = 0;

    for (digest, bytes_c) in candidates {
        if freed >= excess {
            break;
        }
        victims.push(digest.as_str());
        freed += (*bytes_c).max(0) as u64;
    }

    (victims, freed)
}

/// Parses `"3.45.1"` into `(3, 45, 1)`.
fn parse_sqlite_version(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.trim().split('.').map(|p| p.parse::<u32>());
    let major = parts.next()?.ok()?;
    let minor = parts.next()?.ok()?;
    let patch = match parts.next() {
        Some(p) => p.ok()?,
        None => 0,
    };
    Some((major, minor, patch))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
