//! Database initialization
//!
//! Creates the catalog schema on first run. The schema carries the catalog
//! in two representations:
//! - Normalized: `works` joined to `editions`, `license_pools`, and
//!   `work_genres`, plus curated `custom_lists`
//! - Precomputed: `work_summaries` / `work_genre_summaries`, flattened rows
//!   rebuilt from the normalized tables (see `db::summaries`)

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL allows concurrent readers while summaries are being rebuilt
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Open an existing database without taking write access
pub async fn open_database_readonly(db_path: &Path) -> Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=ro", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await?;
    Ok(pool)
}

/// Create all catalog tables (idempotent - safe to call multiple times)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_works_table(pool).await?;
    create_editions_table(pool).await?;
    create_license_pools_table(pool).await?;
    create_work_genres_table(pool).await?;
    create_custom_lists_table(pool).await?;
    create_custom_list_entries_table(pool).await?;

    // Precomputed representation
    create_work_summaries_table(pool).await?;
    create_work_genre_summaries_table(pool).await?;

    Ok(())
}

async fn create_works_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS works (
            guid TEXT PRIMARY KEY,
            audience TEXT NOT NULL DEFAULT 'Adult',
            target_age_lo INTEGER,
            target_age_hi INTEGER,
            fiction INTEGER,
            appeal TEXT,
            quality REAL NOT NULL DEFAULT 0.0,
            random REAL NOT NULL DEFAULT 0.0,
            last_update_time TEXT NOT NULL DEFAULT (datetime('now')),
            presentation_ready INTEGER NOT NULL DEFAULT 0,
            superseded_by TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (random >= 0.0 AND random <= 1.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_works_audience ON works(audience)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_editions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS editions (
            work_guid TEXT PRIMARY KEY REFERENCES works(guid) ON DELETE CASCADE,
            title TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT '',
            sort_title TEXT NOT NULL,
            sort_author TEXT NOT NULL DEFAULT '',
            language TEXT,
            medium TEXT NOT NULL DEFAULT 'Book',
            source TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_editions_language ON editions(language)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_editions_sort_title ON editions(sort_title)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_license_pools_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS license_pools (
            work_guid TEXT PRIMARY KEY REFERENCES works(guid) ON DELETE CASCADE,
            open_access INTEGER NOT NULL DEFAULT 0,
            licenses_owned INTEGER NOT NULL DEFAULT 0,
            licenses_available INTEGER NOT NULL DEFAULT 0,
            fulfillable INTEGER NOT NULL DEFAULT 1,
            CHECK (licenses_owned >= 0),
            CHECK (licenses_available >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_work_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_genres (
            work_guid TEXT NOT NULL REFERENCES works(guid) ON DELETE CASCADE,
            genre TEXT NOT NULL,
            PRIMARY KEY (work_guid, genre)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_work_genres_genre ON work_genres(genre)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_custom_lists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS custom_lists (
            identifier TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_custom_list_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS custom_list_entries (
            list_identifier TEXT NOT NULL REFERENCES custom_lists(identifier) ON DELETE CASCADE,
            work_guid TEXT NOT NULL REFERENCES works(guid) ON DELETE CASCADE,
            most_recent_appearance TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (list_identifier, work_guid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_custom_list_entries_work ON custom_list_entries(work_guid)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per presentation-ready, non-superseded work. Rebuilt wholesale
/// by `db::summaries::rebuild_summaries`.
async fn create_work_summaries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_summaries (
            work_guid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT '',
            sort_title TEXT NOT NULL,
            sort_author TEXT NOT NULL DEFAULT '',
            language TEXT,
            medium TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT '',
            audience TEXT NOT NULL,
            target_age_lo INTEGER,
            target_age_hi INTEGER,
            fiction INTEGER,
            appeal TEXT,
            quality REAL NOT NULL,
            random REAL NOT NULL,
            last_update_time TEXT,
            open_access INTEGER NOT NULL,
            licenses_owned INTEGER NOT NULL,
            licenses_available INTEGER NOT NULL,
            fulfillable INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_work_summaries_language ON work_summaries(language)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_work_summaries_random ON work_summaries(random)")
        .execute(pool)
        .await?;

    Ok(())
}

/// One row per (work, genre) pair; otherwise identical to `work_summaries`
async fn create_work_genre_summaries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_genre_summaries (
            work_guid TEXT NOT NULL,
            genre TEXT NOT NULL,
            title TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT '',
            sort_title TEXT NOT NULL,
            sort_author TEXT NOT NULL DEFAULT '',
            language TEXT,
            medium TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT '',
            audience TEXT NOT NULL,
            target_age_lo INTEGER,
            target_age_hi INTEGER,
            fiction INTEGER,
            appeal TEXT,
            quality REAL NOT NULL,
            random REAL NOT NULL,
            last_update_time TEXT,
            open_access INTEGER NOT NULL,
            licenses_owned INTEGER NOT NULL,
            licenses_available INTEGER NOT NULL,
            fulfillable INTEGER NOT NULL,
            PRIMARY KEY (work_guid, genre)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_work_genre_summaries_genre ON work_genre_summaries(genre)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
