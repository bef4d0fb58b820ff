//! Title search scoped to a lane
//!
//! Searching prefers an external ranked index when one is supplied. The
//! index sees the lane's restrictions (languages, fiction when fixed,
//! audiences, the full matched genre set) and returns ranked ids, which
//! hydrate from the precomputed representation in rank order. A
//! connectivity failure, a missing index, or an empty result set all fall
//! back to a plain substring match against the normalized representation.
//! The fallback never falls back further.

use crate::lane::{FictionMode, Lane};
use crate::query::{Arg, Clause, NORMALIZED, WorkView};
use crate::store;
use async_trait::async_trait;
use sqlx::SqlitePool;
use stacks_common::db::models::{WorkRecord, MEDIUM_BOOK};
use stacks_common::{BrowsePolicy, Error};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The index could not be reached. Recoverable: search falls back to
    /// the database.
    #[error("search index unavailable: {0}")]
    Unavailable(String),
    /// The index answered with an error. Not recoverable here.
    #[error("search backend error: {0}")]
    Backend(String),
}

/// What a lane asks of a search index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub medium: String,
    pub languages: Vec<String>,
    /// `Some` only when the lane's fiction mode is fixed
    pub fiction: Option<bool>,
    pub audiences: Vec<String>,
    /// The lane's full matched genre set
    pub genres: Vec<String>,
    pub limit: i64,
}

/// A ranked title index, Elasticsearch-shaped
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn query_titles(
        &self,
        request: &SearchRequest,
    ) -> std::result::Result<Vec<Uuid>, SearchError>;
}

impl Lane {
    /// Find works in this lane matching a search query.
    ///
    /// # Arguments
    /// * `languages` - Languages requested for this search (the index
    ///   restriction; the database fallback keeps the lane's own languages)
    /// * `query_text` - The patron's query
    /// * `index` - Ranked index to consult, if any
    /// * `limit` - Maximum number of records returned by either path
    pub async fn search(
        &self,
        pool: &SqlitePool,
        policy: &BrowsePolicy,
        index: Option<&dyn SearchIndex>,
        languages: &[String],
        query_text: &str,
        limit: i64,
    ) -> Result<Vec<WorkRecord>, Error> {
        let fiction = match self.fiction {
            FictionMode::Fiction => Some(true),
            FictionMode::Nonfiction => Some(false),
            FictionMode::Both | FictionMode::Unclassified => None,
        };

        let mut results = Vec::new();
        if let Some(index) = index {
            let request = SearchRequest {
                query: query_text.to_string(),
                medium: MEDIUM_BOOK.to_string(),
                languages: languages.to_vec(),
                fiction,
                audiences: self
                    .audiences
                    .iter()
                    .map(|a| a.to_db_string().to_string())
                    .collect(),
                genres: self.genres.iter().cloned().collect(),
                limit,
            };
            let started = Instant::now();
            match index.query_titles(&request).await {
                Ok(ids) => {
                    debug!(
                        "Search index returned {} ids in {:.2?}",
                        ids.len(),
                        started.elapsed()
                    );
                    results = store::fetch_by_guids(pool, &ids).await?;
                }
                Err(SearchError::Unavailable(reason)) => {
                    error!(
                        "Could not reach search index ({}); falling back to database search",
                        reason
                    );
                }
                Err(SearchError::Backend(reason)) => {
                    return Err(Error::Internal(format!("search backend error: {}", reason)));
                }
            }
        }

        if results.is_empty() {
            results = self.search_database(pool, policy, query_text, limit).await?;
        }
        Ok(results)
    }

    /// Crude substring search over the normalized representation, for when
    /// no index is available or the index came up empty.
    async fn search_database(
        &self,
        pool: &SqlitePool,
        policy: &BrowsePolicy,
        query_text: &str,
        limit: i64,
    ) -> Result<Vec<WorkRecord>, Error> {
        let pattern = format!("%{}%", query_text);
        let mut query = self.works_query(policy);
        query.push(Clause::with(
            format!(
                "{} LIKE ? OR {} LIKE ?",
                NORMALIZED.title_col(),
                NORMALIZED.author_col()
            ),
            vec![Arg::Text(pattern.clone()), Arg::Text(pattern)],
        ));
        query.set_limit(limit);
        store::fetch(pool, &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::LaneConfig;
    use crate::taxonomy::Taxonomy;
    use stacks_common::db::{create_tables, rebuild_summaries};

    struct RankedIndex(Vec<Uuid>);

    #[async_trait]
    impl SearchIndex for RankedIndex {
        async fn query_titles(
            &self,
            _request: &SearchRequest,
        ) -> std::result::Result<Vec<Uuid>, SearchError> {
            Ok(self.0.clone())
        }
    }

    struct DownIndex;

    #[async_trait]
    impl SearchIndex for DownIndex {
        async fn query_titles(
            &self,
            _request: &SearchRequest,
        ) -> std::result::Result<Vec<Uuid>, SearchError> {
            Err(SearchError::Unavailable("connection refused".to_string()))
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl SearchIndex for BrokenIndex {
        async fn query_titles(
            &self,
            _request: &SearchRequest,
        ) -> std::result::Result<Vec<Uuid>, SearchError> {
            Err(SearchError::Backend("malformed query".to_string()))
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        create_tables(&pool).await.expect("Failed to create tables");
        pool
    }

    async fn seed_work(pool: &SqlitePool, title: &str, author: &str) -> Uuid {
        let guid = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO works (guid, audience, fiction, quality, random, presentation_ready) \
             VALUES (?, 'Adult', 1, 0.5, 0.5, 1)",
        )
        .bind(guid.to_string())
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO editions (work_guid, title, author, sort_title, sort_author, language, \
             medium, source) VALUES (?, ?, ?, ?, ?, 'eng', 'Book', 'Overdrive')",
        )
        .bind(guid.to_string())
        .bind(title)
        .bind(author)
        .bind(title)
        .bind(author)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO license_pools (work_guid, open_access, licenses_owned, licenses_available) \
             VALUES (?, 1, 1, 1)",
        )
        .bind(guid.to_string())
        .execute(pool)
        .await
        .unwrap();
        guid
    }

    fn everything_lane() -> Lane {
        Lane::from_config(
            Taxonomy::builtin(),
            None,
            LaneConfig {
                name: "Everything".to_string(),
                ..LaneConfig::default()
            },
        )
        .unwrap()
    }

    fn eng() -> Vec<String> {
        vec!["eng".to_string()]
    }

    #[tokio::test]
    async fn test_index_hits_hydrate_in_rank_order() {
        let pool = test_pool().await;
        let tea = seed_work(&pool, "Tea Time", "A. Writer").await;
        let crumpets = seed_work(&pool, "Crumpets", "B. Writer").await;
        seed_work(&pool, "Unrelated", "C. Writer").await;
        rebuild_summaries(&pool).await.unwrap();

        let lane = everything_lane();
        let index = RankedIndex(vec![crumpets, Uuid::new_v4(), tea]);
        let results = lane
            .search(
                &pool,
                &BrowsePolicy::default(),
                Some(&index),
                &eng(),
                "tea",
                30,
            )
            .await
            .unwrap();
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Crumpets", "Tea Time"]);
    }

    #[tokio::test]
    async fn test_unreachable_index_falls_back_to_database() {
        let pool = test_pool().await;
        seed_work(&pool, "Tea Time", "A. Writer").await;
        seed_work(&pool, "Coffee Break", "B. Writer").await;

        let lane = everything_lane();
        let policy = BrowsePolicy::default();
        let with_down_index = lane
            .search(&pool, &policy, Some(&DownIndex), &eng(), "tea", 30)
            .await
            .unwrap();
        let without_index = lane
            .search(&pool, &policy, None, &eng(), "tea", 30)
            .await
            .unwrap();

        assert_eq!(with_down_index.len(), 1);
        assert_eq!(with_down_index[0].title, "Tea Time");
        assert_eq!(without_index[0].guid, with_down_index[0].guid);
    }

    #[tokio::test]
    async fn test_fallback_matches_title_or_author_case_insensitively() {
        let pool = test_pool().await;
        seed_work(&pool, "A History of Tea", "Jane Doe").await;
        seed_work(&pool, "Gardening", "Tealeaf Smith").await;
        seed_work(&pool, "Gardening II", "Jane Doe").await;

        let lane = everything_lane();
        let results = lane
            .search(&pool, &BrowsePolicy::default(), None, &eng(), "TEA", 30)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_index_results_fall_back() {
        let pool = test_pool().await;
        seed_work(&pool, "Tea Time", "A. Writer").await;
        rebuild_summaries(&pool).await.unwrap();

        let lane = everything_lane();
        let index = RankedIndex(Vec::new());
        let results = lane
            .search(
                &pool,
                &BrowsePolicy::default(),
                Some(&index),
                &eng(),
                "tea",
                30,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_errors_propagate() {
        let pool = test_pool().await;
        let lane = everything_lane();
        let err = lane
            .search(
                &pool,
                &BrowsePolicy::default(),
                Some(&BrokenIndex),
                &eng(),
                "tea",
                30,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("search backend"));
    }
}
