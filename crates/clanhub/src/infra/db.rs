use log::debug;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, Sqlite, SqlitePool,
};
use std::{
    future::Future,
    hash::{DefaultHasher, Hash, Hasher},
    str::FromStr,
    sync::Arc,
    time::Duration as StdDuration,
};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::Mutex;

use crate::config::{DBSettings, SqliteSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteMode {
    ReadWriteCreate,
    ReadOnly,
    Memory,
}

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub mode: SqliteMode,
    pub busy_timeout_ms: u32,
    pub journal_mode: String,
    pub synchronous: String,
    pub cache_size: i32,
    pub foreign_keys: bool,
}

impl SqliteConfig {
    pub fn testing() -> Self {
        SqliteSettings::testing().into()
    }

    pub fn build_connect_options(&self, database_path: &str) -> SqliteConnectOptions {
        let mut options = SqliteConnectOptions::new();

        match self.mode {
            SqliteMode::Memory => {
                // read and write pools must land on the same in-memory database,
                // the name is derived from the path so each database gets its own
                let mut hasher = DefaultHasher::new();
                database_path.hash(&mut hasher);
                let unique_id = hasher.finish();

                let memory_uri = format!("file:memdb_{}?mode=memory&cache=shared", unique_id);
                options = options.filename(&memory_uri).shared_cache(true);
            }
            SqliteMode::ReadOnly => {
                return options
                    .filename(database_path)
                    .read_only(true)
                    .busy_timeout(StdDuration::from_millis(self.busy_timeout_ms as u64));
            }
            SqliteMode::ReadWriteCreate => {
                options = options
                    .filename(database_path)
                    .read_only(false)
                    .create_if_missing(true);
            }
        }

        options = options
            .busy_timeout(StdDuration::from_millis(self.busy_timeout_ms as u64))
            .pragma("journal_mode", self.journal_mode.to_uppercase())
            .pragma("synchronous", self.synchronous.to_uppercase())
            .pragma("cache_size", self.cache_size.to_string())
            .pragma("temp_store", "memory");

        if self.foreign_keys {
            options = options.pragma("foreign_keys", "true");
        }

        options
    }
}

impl From<SqliteSettings> for SqliteConfig {
    fn from(settings: SqliteSettings) -> Self {
        Self {
            mode: match settings.mode.to_lowercase().as_str() {
                "memory" => SqliteMode::Memory,
                _ => SqliteMode::ReadWriteCreate,
            },
            busy_timeout_ms: settings.busy_timeout_ms,
            journal_mode: settings.journal_mode,
            synchronous: settings.synchronous,
            cache_size: settings.cache_size,
            foreign_keys: settings.foreign_keys,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub read_max_connections: u32,
    pub read_min_connections: u32,
    pub write_max_connections: u32,
    pub write_min_connections: u32,
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub sqlite_config: SqliteConfig,
}

impl DatabasePoolConfig {
    pub fn testing() -> Self {
        Self {
            read_max_connections: 2,
            read_min_connections: 1,
            write_max_connections: 1,
            write_min_connections: 1,
            idle_timeout_secs: 600,
            acquire_timeout_secs: 5,
            sqlite_config: SqliteConfig::testing(),
        }
    }
}

impl From<DBSettings> for DatabasePoolConfig {
    fn from(config: DBSettings) -> Self {
        Self {
            read_max_connections: config.read_max_connections,
            read_min_connections: config.read_min_connections,
            write_max_connections: config.write_max_connections,
            write_min_connections: config.write_min_connections,
            idle_timeout_secs: config.idle_timeout_secs,
            acquire_timeout_secs: config.acquire_timeout_secs,
            sqlite_config: config.sqlite.into(),
        }
    }
}

static CLAN_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/clan");
static BINGO_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/bingo");

#[derive(Debug, Clone, Copy)]
pub enum DatabaseType {
    /// Bounties, submissions, settings and the clan snapshot
    Clan,
    Bingo,
}

#[derive(Debug, Error)]
pub enum DatabaseWriteError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("timed out after {0:?} waiting for the database writer")]
    Timeout(StdDuration),
}

#[derive(Clone, Debug)]
pub struct DBConnection {
    pub database_name: String,
    pub database_path: String,
    read_pool: SqlitePool,
    write_pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
    write_timeout: StdDuration,
}

impl DBConnection {
    pub async fn new(
        path: &str,
        db_name: &str,
        database_pool_config: DatabasePoolConfig,
        db_type: DatabaseType,
    ) -> Result<Self, sqlx::Error> {
        let database_path = format!("{}/{}.db", path, db_name);

        if database_pool_config.sqlite_config.mode != SqliteMode::Memory {
            let database_url = format!("sqlite:{}", database_path);
            if !Sqlite::database_exists(&database_url).await? {
                Sqlite::create_database(&database_url).await?;
            }
        }

        let (read_pool, write_pool) =
            Self::create_pools(&database_path, &database_pool_config).await?;

        let migrator = match db_type {
            DatabaseType::Clan => &CLAN_MIGRATOR,
            DatabaseType::Bingo => &BINGO_MIGRATOR,
        };

        migrator
            .run(&write_pool)
            .await
            .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;

        Ok(Self {
            database_name: db_name.to_string(),
            database_path,
            read_pool,
            write_pool,
            write_lock: Arc::new(Mutex::new(())),
            write_timeout: StdDuration::from_secs(database_pool_config.acquire_timeout_secs),
        })
    }

    #[cfg(test)]
    pub fn new_with_pools(
        database_name: String,
        database_path: String,
        read_pool: SqlitePool,
        write_pool: SqlitePool,
    ) -> Self {
        Self {
            database_name,
            database_path,
            read_pool,
            write_pool,
            write_lock: Arc::new(Mutex::new(())),
            write_timeout: StdDuration::from_secs(5),
        }
    }

    async fn create_pools(
        database_path: &str,
        database_pool_config: &DatabasePoolConfig,
    ) -> Result<(SqlitePool, SqlitePool), sqlx::Error> {
        let base = &database_pool_config.sqlite_config;
        let read_config = if base.mode == SqliteMode::Memory {
            base.clone()
        } else {
            SqliteConfig {
                mode: SqliteMode::ReadOnly,
                ..base.clone()
            }
        };

        let write_connection = base.build_connect_options(database_path);
        debug!("Write connection: {:?}", write_connection);

        let write_pool = SqlitePoolOptions::new()
            .max_connections(database_pool_config.write_max_connections)
            .min_connections(database_pool_config.write_min_connections)
            .acquire_timeout(StdDuration::from_secs(
                database_pool_config.acquire_timeout_secs,
            ))
            .idle_timeout(StdDuration::from_secs(
                database_pool_config.idle_timeout_secs,
            ))
            .connect_with(write_connection)
            .await?;

        let read_connection = read_config.build_connect_options(database_path);
        debug!("Read connection: {:?}", read_connection);

        let read_pool = SqlitePoolOptions::new()
            .max_connections(database_pool_config.read_max_connections)
            .min_connections(database_pool_config.read_min_connections)
            .acquire_timeout(StdDuration::from_secs(
                database_pool_config.acquire_timeout_secs,
            ))
            .idle_timeout(StdDuration::from_secs(
                database_pool_config.idle_timeout_secs,
            ))
            .connect_with(read_connection)
            .await?;

        Ok((read_pool, write_pool))
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let _: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.read_pool)
            .await?;
        let _: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.write_pool)
            .await?;

        Ok(())
    }

    pub fn read(&self) -> &SqlitePool {
        &self.read_pool
    }

    /// Run `f` against the write pool while holding the single writer slot.
    ///
    /// Writers are serialized per database, so a transaction opened inside `f` never races
    /// another writer's read-then-update sequence.
    pub async fn execute_write<F, Fut, T>(&self, f: F) -> Result<T, DatabaseWriteError>
    where
        F: FnOnce(SqlitePool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let _guard = tokio::time::timeout(self.write_timeout, self.write_lock.lock())
            .await
            .map_err(|_| DatabaseWriteError::Timeout(self.write_timeout))?;

        f(self.write_pool.clone()).await.map_err(DatabaseWriteError::from)
    }
}

pub fn format_datetime(value: &OffsetDateTime) -> Result<String, sqlx::Error> {
    value
        .format(&Rfc3339)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

pub fn parse_required_datetime(
    row: &SqliteRow,
    column: &str,
) -> Result<OffsetDateTime, sqlx::Error> {
    let date_str: String = row.try_get(column)?;
    OffsetDateTime::parse(&date_str, &Rfc3339).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

pub fn parse_optional_datetime(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<OffsetDateTime>, sqlx::Error> {
    row.try_get::<Option<String>, _>(column)?
        .map(|s| OffsetDateTime::parse(&s, &Rfc3339))
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

pub fn parse_required_enum<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

pub fn parse_optional_enum<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    row.try_get::<Option<String>, _>(column)?
        .map(|raw| raw.parse::<T>())
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

pub fn parse_required_json<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
