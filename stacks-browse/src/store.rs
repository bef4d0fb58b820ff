//! Query execution and row hydration
//!
//! A `WorkQuery` renders to SQL plus a bind list; this module runs it and
//! turns the rows back into `WorkRecord`s. Every view exposes the same
//! select aliases, so one hydration path serves all representations.

use crate::query::{Arg, Clause, WorkQuery, WorkView, SUMMARY};
use sqlx::query::{Query, QueryScalar};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Row, SqlitePool};
use stacks_common::db::WorkRecord;
use stacks_common::{Error, Result};
use std::collections::HashMap;
use uuid::Uuid;

/// Fetch the records matching a query, in query order.
pub async fn fetch(pool: &SqlitePool, query: &WorkQuery) -> Result<Vec<WorkRecord>> {
    let (sql, binds) = query.select_sql();
    let mut statement = sqlx::query(&sql);
    for arg in &binds {
        statement = bind_arg(statement, arg);
    }
    let rows = statement.fetch_all(pool).await?;
    rows.iter().map(record_from_row).collect()
}

/// Count the records matching a query.
pub async fn count(pool: &SqlitePool, query: &WorkQuery) -> Result<i64> {
    let (sql, binds) = query.count_sql();
    let mut statement = sqlx::query_scalar::<_, i64>(&sql);
    for arg in &binds {
        statement = bind_scalar_arg(statement, arg);
    }
    Ok(statement.fetch_one(pool).await?)
}

/// Hydrate records for the given ids from the precomputed representation,
/// preserving the caller's order. Ids with no summary row are dropped.
pub async fn fetch_by_guids(pool: &SqlitePool, guids: &[Uuid]) -> Result<Vec<WorkRecord>> {
    if guids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = WorkQuery::new(&SUMMARY);
    query.push(Clause::in_texts(
        SUMMARY.id_col(),
        guids.iter().map(|guid| guid.to_string()),
    ));
    let records = fetch(pool, &query).await?;
    let mut by_guid: HashMap<Uuid, WorkRecord> =
        records.into_iter().map(|r| (r.guid, r)).collect();
    Ok(guids.iter().filter_map(|guid| by_guid.remove(guid)).collect())
}

fn bind_arg<'q>(
    statement: Query<'q, Sqlite, SqliteArguments<'q>>,
    arg: &'q Arg,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match arg {
        Arg::Text(value) => statement.bind(value),
        Arg::Int(value) => statement.bind(*value),
        Arg::Real(value) => statement.bind(*value),
    }
}

fn bind_scalar_arg<'q>(
    statement: QueryScalar<'q, Sqlite, i64, SqliteArguments<'q>>,
    arg: &'q Arg,
) -> QueryScalar<'q, Sqlite, i64, SqliteArguments<'q>> {
    match arg {
        Arg::Text(value) => statement.bind(value),
        Arg::Int(value) => statement.bind(*value),
        Arg::Real(value) => statement.bind(*value),
    }
}

fn record_from_row(row: &SqliteRow) -> Result<WorkRecord> {
    let guid_str: String = row.get("guid");
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("invalid work guid {}: {}", guid_str, e)))?;
    Ok(WorkRecord {
        guid,
        title: row.get("title"),
        author: row.get("author"),
        sort_title: row.get("sort_title"),
        sort_author: row.get("sort_author"),
        language: row.get("language"),
        medium: row.get("medium"),
        source: row.get("source"),
        audience: row.get("audience"),
        target_age_lo: row.get("target_age_lo"),
        target_age_hi: row.get("target_age_hi"),
        fiction: row.get("fiction"),
        appeal: row.get("appeal"),
        quality: row.get("quality"),
        random: row.get("random"),
        last_update_time: row.get("last_update_time"),
        open_access: row.get("open_access"),
        licenses_owned: row.get("licenses_owned"),
        licenses_available: row.get("licenses_available"),
        fulfillable: row.get("fulfillable"),
    })
}
