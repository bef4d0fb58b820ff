//! Precomputed-summary maintenance
//!
//! The browse layer reads most traffic from flattened summary rows instead
//! of the normalized join. `rebuild_summaries` repopulates both summary
//! tables from the normalized tables inside one transaction, keeping only
//! presentation-ready works that have not been superseded. Works that lose
//! eligibility disappear from the summaries on the next rebuild.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

const SUMMARY_COLUMNS: &str = "work_guid, title, author, sort_title, sort_author, language, \
     medium, source, audience, target_age_lo, target_age_hi, fiction, appeal, quality, random, \
     last_update_time, open_access, licenses_owned, licenses_available, fulfillable";

const SUMMARY_SELECT: &str = "SELECT w.guid, e.title, e.author, e.sort_title, e.sort_author, \
     e.language, e.medium, e.source, w.audience, w.target_age_lo, w.target_age_hi, w.fiction, \
     w.appeal, w.quality, w.random, w.last_update_time, lp.open_access, lp.licenses_owned, \
     lp.licenses_available, lp.fulfillable \
     FROM works w \
     JOIN editions e ON e.work_guid = w.guid \
     JOIN license_pools lp ON lp.work_guid = w.guid \
     WHERE w.presentation_ready = 1 AND w.superseded_by IS NULL";

/// Rebuild both summary tables from the normalized tables.
///
/// Returns (work rows, work-genre rows) written.
pub async fn rebuild_summaries(pool: &SqlitePool) -> Result<(u64, u64)> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM work_summaries")
        .execute(&mut *tx)
        .await?;
    let works = sqlx::query(&format!(
        "INSERT INTO work_summaries ({}) {}",
        SUMMARY_COLUMNS, SUMMARY_SELECT
    ))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM work_genre_summaries")
        .execute(&mut *tx)
        .await?;
    let pairs = sqlx::query(&format!(
        "INSERT INTO work_genre_summaries (genre, {}) \
         SELECT wg.genre, s.* FROM ({}) s \
         JOIN work_genres wg ON wg.work_guid = s.guid",
        SUMMARY_COLUMNS, SUMMARY_SELECT
    ))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    info!("Rebuilt summaries: {} works, {} work-genre rows", works, pairs);
    Ok((works, pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_tables;

    async fn seed_work(pool: &SqlitePool, guid: &str, ready: i64, superseded: Option<&str>) {
        sqlx::query(
            "INSERT INTO works (guid, presentation_ready, superseded_by, quality, random) \
             VALUES (?, ?, ?, 0.5, 0.5)",
        )
        .bind(guid)
        .bind(ready)
        .bind(superseded)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO editions (work_guid, title, sort_title, language) VALUES (?, ?, ?, 'eng')",
        )
        .bind(guid)
        .bind(format!("Title {}", guid))
        .bind(format!("title {}", guid))
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO license_pools (work_guid, licenses_owned) VALUES (?, 1)")
            .bind(guid)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rebuild_keeps_only_ready_unsuperseded() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        create_tables(&pool).await.unwrap();

        seed_work(&pool, "11111111-1111-1111-1111-111111111111", 1, None).await;
        seed_work(&pool, "22222222-2222-2222-2222-222222222222", 0, None).await;
        seed_work(
            &pool,
            "33333333-3333-3333-3333-333333333333",
            1,
            Some("11111111-1111-1111-1111-111111111111"),
        )
        .await;

        let (works, pairs) = rebuild_summaries(&pool).await.unwrap();
        assert_eq!(works, 1);
        assert_eq!(pairs, 0);

        let guid: String = sqlx::query_scalar("SELECT work_guid FROM work_summaries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(guid, "11111111-1111-1111-1111-111111111111");
    }

    #[tokio::test]
    async fn test_rebuild_expands_genres() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        create_tables(&pool).await.unwrap();

        seed_work(&pool, "11111111-1111-1111-1111-111111111111", 1, None).await;
        for genre in ["Mystery", "Romance"] {
            sqlx::query("INSERT INTO work_genres (work_guid, genre) VALUES (?, ?)")
                .bind("11111111-1111-1111-1111-111111111111")
                .bind(genre)
                .execute(&pool)
                .await
                .unwrap();
        }

        let (works, pairs) = rebuild_summaries(&pool).await.unwrap();
        assert_eq!(works, 1);
        assert_eq!(pairs, 2);

        // Rebuild is idempotent, not additive
        let (works, pairs) = rebuild_summaries(&pool).await.unwrap();
        assert_eq!(works, 1);
        assert_eq!(pairs, 2);
    }
}
