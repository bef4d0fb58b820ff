//! Query assembly over the catalog's two representations
//!
//! Browse queries are built as data (filter clauses, sort keys, a window)
//! and rendered to SQL once. Rendering is deterministic: the same
//! construction always yields the same statement and bind list.
//!
//! The representation behind a query hides behind `WorkView`:
//! - `NORMALIZED` reads works joined to editions and license pools
//! - `SUMMARY` reads the flattened per-work summary table
//! - `GENRE_SUMMARY` reads the per-(work, genre) summary table
//!
//! Every view exposes the same named fields and the same select aliases,
//! so filter construction and row hydration never branch on which
//! representation is underneath.

/// A value bound into a SQL placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Text(String),
    Int(i64),
    Real(f64),
}

/// A WHERE fragment plus its bind values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub sql: String,
    pub binds: Vec<Arg>,
}

impl Clause {
    pub fn new(sql: impl Into<String>) -> Self {
        Clause {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub fn with(sql: impl Into<String>, binds: Vec<Arg>) -> Self {
        Clause {
            sql: sql.into(),
            binds,
        }
    }

    /// `column IN (?, ?, ...)`. An empty value list matches nothing.
    pub fn in_texts<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let binds: Vec<Arg> = values.into_iter().map(|v| Arg::Text(v.into())).collect();
        if binds.is_empty() {
            return Clause::new("0");
        }
        let placeholders = vec!["?"; binds.len()].join(", ");
        Clause {
            sql: format!("{} IN ({})", column, placeholders),
            binds,
        }
    }

    /// Conjunction. An empty conjunction is vacuously true.
    pub fn all<I>(clauses: I) -> Self
    where
        I: IntoIterator<Item = Clause>,
    {
        Self::join(clauses, " AND ", "1")
    }

    /// Disjunction. An empty disjunction is vacuously false.
    pub fn any<I>(clauses: I) -> Self
    where
        I: IntoIterator<Item = Clause>,
    {
        Self::join(clauses, " OR ", "0")
    }

    fn join<I>(clauses: I, separator: &str, empty: &str) -> Clause
    where
        I: IntoIterator<Item = Clause>,
    {
        let mut parts = Vec::new();
        let mut binds = Vec::new();
        for clause in clauses {
            parts.push(format!("({})", clause.sql));
            binds.extend(clause.binds);
        }
        if parts.is_empty() {
            return Clause::new(empty);
        }
        Clause {
            sql: parts.join(separator),
            binds,
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub ascending: bool,
}

/// Field accessors for one catalog representation.
///
/// Filter and ordering code addresses fields through these methods only,
/// so a query built for one view builds identically for another. The
/// select aliases are unified across views; `store::fetch` hydrates every
/// view through the same path.
pub trait WorkView: std::fmt::Debug + Send + Sync {
    fn from_clause(&self) -> &'static str;
    fn select_list(&self) -> &'static str;

    /// Restriction every query against this view must carry
    fn base_clause(&self) -> Option<Clause> {
        None
    }

    /// Whether result rows require deduplication
    fn distinct(&self) -> bool {
        false
    }

    fn count_expr(&self) -> &'static str {
        "COUNT(*)"
    }

    /// The genre column, for views that expand works per genre
    fn genre_col(&self) -> Option<&'static str> {
        None
    }

    fn id_col(&self) -> &'static str;
    fn title_col(&self) -> &'static str;
    fn author_col(&self) -> &'static str;
    fn sort_title_col(&self) -> &'static str;
    fn sort_author_col(&self) -> &'static str;
    fn language_col(&self) -> &'static str;
    fn medium_col(&self) -> &'static str;
    fn source_col(&self) -> &'static str;
    fn audience_col(&self) -> &'static str;
    fn target_age_lo_col(&self) -> &'static str;
    fn target_age_hi_col(&self) -> &'static str;
    fn fiction_col(&self) -> &'static str;
    fn appeal_col(&self) -> &'static str;
    fn quality_col(&self) -> &'static str;
    fn random_col(&self) -> &'static str;
    fn last_update_col(&self) -> &'static str;
    fn open_access_col(&self) -> &'static str;
    fn licenses_owned_col(&self) -> &'static str;
    fn licenses_available_col(&self) -> &'static str;
    fn fulfillable_col(&self) -> &'static str;
}

/// Normalized representation: works joined to editions and license pools
#[derive(Debug)]
pub struct NormalizedView;

/// Precomputed representation, one row per work
#[derive(Debug)]
pub struct SummaryView;

/// Precomputed representation, one row per (work, genre) pair
#[derive(Debug)]
pub struct GenreSummaryView;

pub static NORMALIZED: NormalizedView = NormalizedView;
pub static SUMMARY: SummaryView = SummaryView;
pub static GENRE_SUMMARY: GenreSummaryView = GenreSummaryView;

impl WorkView for NormalizedView {
    fn from_clause(&self) -> &'static str {
        "works \
         JOIN editions ON editions.work_guid = works.guid \
         JOIN license_pools ON license_pools.work_guid = works.guid"
    }

    fn select_list(&self) -> &'static str {
        "works.guid AS guid, editions.title AS title, editions.author AS author, \
         editions.sort_title AS sort_title, editions.sort_author AS sort_author, \
         editions.language AS language, editions.medium AS medium, editions.source AS source, \
         works.audience AS audience, works.target_age_lo AS target_age_lo, \
         works.target_age_hi AS target_age_hi, works.fiction AS fiction, \
         works.appeal AS appeal, works.quality AS quality, works.random AS random, \
         works.last_update_time AS last_update_time, \
         license_pools.open_access AS open_access, \
         license_pools.licenses_owned AS licenses_owned, \
         license_pools.licenses_available AS licenses_available, \
         license_pools.fulfillable AS fulfillable"
    }

    // The precomputed tables exclude these rows at rebuild time; the
    // normalized join must exclude them per query.
    fn base_clause(&self) -> Option<Clause> {
        Some(Clause::new(
            "works.presentation_ready = 1 AND works.superseded_by IS NULL",
        ))
    }

    fn id_col(&self) -> &'static str {
        "works.guid"
    }
    fn title_col(&self) -> &'static str {
        "editions.title"
    }
    fn author_col(&self) -> &'static str {
        "editions.author"
    }
    fn sort_title_col(&self) -> &'static str {
        "editions.sort_title"
    }
    fn sort_author_col(&self) -> &'static str {
        "editions.sort_author"
    }
    fn language_col(&self) -> &'static str {
        "editions.language"
    }
    fn medium_col(&self) -> &'static str {
        "editions.medium"
    }
    fn source_col(&self) -> &'static str {
        "editions.source"
    }
    fn audience_col(&self) -> &'static str {
        "works.audience"
    }
    fn target_age_lo_col(&self) -> &'static str {
        "works.target_age_lo"
    }
    fn target_age_hi_col(&self) -> &'static str {
        "works.target_age_hi"
    }
    fn fiction_col(&self) -> &'static str {
        "works.fiction"
    }
    fn appeal_col(&self) -> &'static str {
        "works.appeal"
    }
    fn quality_col(&self) -> &'static str {
        "works.quality"
    }
    fn random_col(&self) -> &'static str {
        "works.random"
    }
    fn last_update_col(&self) -> &'static str {
        "works.last_update_time"
    }
    fn open_access_col(&self) -> &'static str {
        "license_pools.open_access"
    }
    fn licenses_owned_col(&self) -> &'static str {
        "license_pools.licenses_owned"
    }
    fn licenses_available_col(&self) -> &'static str {
        "license_pools.licenses_available"
    }
    fn fulfillable_col(&self) -> &'static str {
        "license_pools.fulfillable"
    }
}

impl WorkView for SummaryView {
    fn from_clause(&self) -> &'static str {
        "work_summaries"
    }

    fn select_list(&self) -> &'static str {
        "work_summaries.work_guid AS guid, work_summaries.title AS title, \
         work_summaries.author AS author, work_summaries.sort_title AS sort_title, \
         work_summaries.sort_author AS sort_author, work_summaries.language AS language, \
         work_summaries.medium AS medium, work_summaries.source AS source, \
         work_summaries.audience AS audience, work_summaries.target_age_lo AS target_age_lo, \
         work_summaries.target_age_hi AS target_age_hi, work_summaries.fiction AS fiction, \
         work_summaries.appeal AS appeal, work_summaries.quality AS quality, \
         work_summaries.random AS random, \
         work_summaries.last_update_time AS last_update_time, \
         work_summaries.open_access AS open_access, \
         work_summaries.licenses_owned AS licenses_owned, \
         work_summaries.licenses_available AS licenses_available, \
         work_summaries.fulfillable AS fulfillable"
    }

    fn id_col(&self) -> &'static str {
        "work_summaries.work_guid"
    }
    fn title_col(&self) -> &'static str {
        "work_summaries.title"
    }
    fn author_col(&self) -> &'static str {
        "work_summaries.author"
    }
    fn sort_title_col(&self) -> &'static str {
        "work_summaries.sort_title"
    }
    fn sort_author_col(&self) -> &'static str {
        "work_summaries.sort_author"
    }
    fn language_col(&self) -> &'static str {
        "work_summaries.language"
    }
    fn medium_col(&self) -> &'static str {
        "work_summaries.medium"
    }
    fn source_col(&self) -> &'static str {
        "work_summaries.source"
    }
    fn audience_col(&self) -> &'static str {
        "work_summaries.audience"
    }
    fn target_age_lo_col(&self) -> &'static str {
        "work_summaries.target_age_lo"
    }
    fn target_age_hi_col(&self) -> &'static str {
        "work_summaries.target_age_hi"
    }
    fn fiction_col(&self) -> &'static str {
        "work_summaries.fiction"
    }
    fn appeal_col(&self) -> &'static str {
        "work_summaries.appeal"
    }
    fn quality_col(&self) -> &'static str {
        "work_summaries.quality"
    }
    fn random_col(&self) -> &'static str {
        "work_summaries.random"
    }
    fn last_update_col(&self) -> &'static str {
        "work_summaries.last_update_time"
    }
    fn open_access_col(&self) -> &'static str {
        "work_summaries.open_access"
    }
    fn licenses_owned_col(&self) -> &'static str {
        "work_summaries.licenses_owned"
    }
    fn licenses_available_col(&self) -> &'static str {
        "work_summaries.licenses_available"
    }
    fn fulfillable_col(&self) -> &'static str {
        "work_summaries.fulfillable"
    }
}

impl WorkView for GenreSummaryView {
    fn from_clause(&self) -> &'static str {
        "work_genre_summaries"
    }

    // The genre column stays out of the select list: a work matching on
    // several genres must collapse to one result row.
    fn select_list(&self) -> &'static str {
        "work_genre_summaries.work_guid AS guid, work_genre_summaries.title AS title, \
         work_genre_summaries.author AS author, work_genre_summaries.sort_title AS sort_title, \
         work_genre_summaries.sort_author AS sort_author, \
         work_genre_summaries.language AS language, work_genre_summaries.medium AS medium, \
         work_genre_summaries.source AS source, work_genre_summaries.audience AS audience, \
         work_genre_summaries.target_age_lo AS target_age_lo, \
         work_genre_summaries.target_age_hi AS target_age_hi, \
         work_genre_summaries.fiction AS fiction, work_genre_summaries.appeal AS appeal, \
         work_genre_summaries.quality AS quality, work_genre_summaries.random AS random, \
         work_genre_summaries.last_update_time AS last_update_time, \
         work_genre_summaries.open_access AS open_access, \
         work_genre_summaries.licenses_owned AS licenses_owned, \
         work_genre_summaries.licenses_available AS licenses_available, \
         work_genre_summaries.fulfillable AS fulfillable"
    }

    fn distinct(&self) -> bool {
        true
    }

    fn count_expr(&self) -> &'static str {
        "COUNT(DISTINCT work_genre_summaries.work_guid)"
    }

    fn genre_col(&self) -> Option<&'static str> {
        Some("work_genre_summaries.genre")
    }

    fn id_col(&self) -> &'static str {
        "work_genre_summaries.work_guid"
    }
    fn title_col(&self) -> &'static str {
        "work_genre_summaries.title"
    }
    fn author_col(&self) -> &'static str {
        "work_genre_summaries.author"
    }
    fn sort_title_col(&self) -> &'static str {
        "work_genre_summaries.sort_title"
    }
    fn sort_author_col(&self) -> &'static str {
        "work_genre_summaries.sort_author"
    }
    fn language_col(&self) -> &'static str {
        "work_genre_summaries.language"
    }
    fn medium_col(&self) -> &'static str {
        "work_genre_summaries.medium"
    }
    fn source_col(&self) -> &'static str {
        "work_genre_summaries.source"
    }
    fn audience_col(&self) -> &'static str {
        "work_genre_summaries.audience"
    }
    fn target_age_lo_col(&self) -> &'static str {
        "work_genre_summaries.target_age_lo"
    }
    fn target_age_hi_col(&self) -> &'static str {
        "work_genre_summaries.target_age_hi"
    }
    fn fiction_col(&self) -> &'static str {
        "work_genre_summaries.fiction"
    }
    fn appeal_col(&self) -> &'static str {
        "work_genre_summaries.appeal"
    }
    fn quality_col(&self) -> &'static str {
        "work_genre_summaries.quality"
    }
    fn random_col(&self) -> &'static str {
        "work_genre_summaries.random"
    }
    fn last_update_col(&self) -> &'static str {
        "work_genre_summaries.last_update_time"
    }
    fn open_access_col(&self) -> &'static str {
        "work_genre_summaries.open_access"
    }
    fn licenses_owned_col(&self) -> &'static str {
        "work_genre_summaries.licenses_owned"
    }
    fn licenses_available_col(&self) -> &'static str {
        "work_genre_summaries.licenses_available"
    }
    fn fulfillable_col(&self) -> &'static str {
        "work_genre_summaries.fulfillable"
    }
}

/// A browse query under construction
#[derive(Debug, Clone)]
pub struct WorkQuery {
    view: &'static dyn WorkView,
    clauses: Vec<Clause>,
    order_by: Vec<SortKey>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl WorkQuery {
    pub fn new(view: &'static dyn WorkView) -> Self {
        let mut query = WorkQuery {
            view,
            clauses: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        };
        if let Some(base) = view.base_clause() {
            query.clauses.push(base);
        }
        query
    }

    pub fn view(&self) -> &'static dyn WorkView {
        self.view
    }

    /// Add a restriction; all restrictions are ANDed together
    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Replace the ordering
    pub fn order_by(&mut self, keys: Vec<SortKey>) {
        self.order_by = keys;
    }

    pub fn set_limit(&mut self, limit: i64) {
        self.limit = Some(limit);
    }

    pub fn set_window(&mut self, offset: i64, limit: i64) {
        self.offset = Some(offset);
        self.limit = Some(limit);
    }

    /// Render the row-fetching statement
    pub fn select_sql(&self) -> (String, Vec<Arg>) {
        let distinct = if self.view.distinct() { "DISTINCT " } else { "" };
        let mut sql = format!(
            "SELECT {}{} FROM {}",
            distinct,
            self.view.select_list(),
            self.view.from_clause()
        );
        let binds = self.render_where(&mut sql);

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|key| {
                    format!(
                        "{} {}",
                        key.column,
                        if key.ascending { "ASC" } else { "DESC" }
                    )
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite needs a LIMIT to accept an OFFSET; -1 means unbounded
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        (sql, binds)
    }

    /// Render the matching COUNT statement (no ordering, no window)
    pub fn count_sql(&self) -> (String, Vec<Arg>) {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.view.count_expr(),
            self.view.from_clause()
        );
        let binds = self.render_where(&mut sql);
        (sql, binds)
    }

    fn render_where(&self, sql: &mut String) -> Vec<Arg> {
        let mut binds = Vec::new();
        if !self.clauses.is_empty() {
            let parts: Vec<String> = self
                .clauses
                .iter()
                .map(|clause| format!("({})", clause.sql))
                .collect();
            sql.push_str(&format!(" WHERE {}", parts.join(" AND ")));
            for clause in &self.clauses {
                binds.extend(clause.binds.iter().cloned());
            }
        }
        binds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIFIED_ALIASES: [&str; 20] = [
        "guid",
        "title",
        "author",
        "sort_title",
        "sort_author",
        "language",
        "medium",
        "source",
        "audience",
        "target_age_lo",
        "target_age_hi",
        "fiction",
        "appeal",
        "quality",
        "random",
        "last_update_time",
        "open_access",
        "licenses_owned",
        "licenses_available",
        "fulfillable",
    ];

    #[test]
    fn test_every_view_exposes_unified_aliases() {
        let views: [&'static dyn WorkView; 3] = [&NORMALIZED, &SUMMARY, &GENRE_SUMMARY];
        for view in views {
            for alias in UNIFIED_ALIASES {
                assert!(
                    view.select_list().contains(&format!("AS {}", alias)),
                    "{} missing alias {}",
                    view.from_clause(),
                    alias
                );
            }
        }
    }

    #[test]
    fn test_in_texts() {
        let clause = Clause::in_texts("editions.language", ["eng", "fre"]);
        assert_eq!(clause.sql, "editions.language IN (?, ?)");
        assert_eq!(
            clause.binds,
            vec![Arg::Text("eng".to_string()), Arg::Text("fre".to_string())]
        );
    }

    #[test]
    fn test_in_texts_empty_matches_nothing() {
        let clause = Clause::in_texts("editions.language", Vec::<String>::new());
        assert_eq!(clause.sql, "0");
        assert!(clause.binds.is_empty());
    }

    #[test]
    fn test_any_interleaves_binds() {
        let clause = Clause::any([
            Clause::new("license_pools.open_access = 1"),
            Clause::with("works.quality >= ?", vec![Arg::Real(0.3)]),
        ]);
        assert_eq!(
            clause.sql,
            "(license_pools.open_access = 1) OR (works.quality >= ?)"
        );
        assert_eq!(clause.binds, vec![Arg::Real(0.3)]);
    }

    #[test]
    fn test_empty_combinators() {
        assert_eq!(Clause::all(Vec::new()).sql, "1");
        assert_eq!(Clause::any(Vec::new()).sql, "0");
    }

    #[test]
    fn test_normalized_carries_base_clause() {
        let query = WorkQuery::new(&NORMALIZED);
        let (sql, _) = query.select_sql();
        assert!(sql.contains("works.presentation_ready = 1"));
        assert!(sql.contains("works.superseded_by IS NULL"));
    }

    #[test]
    fn test_summary_views_carry_no_base_clause() {
        for view in [&SUMMARY as &'static dyn WorkView, &GENRE_SUMMARY] {
            let query = WorkQuery::new(view);
            let (sql, _) = query.select_sql();
            assert!(!sql.contains("presentation_ready"));
        }
    }

    #[test]
    fn test_genre_summary_deduplicates() {
        let query = WorkQuery::new(&GENRE_SUMMARY);
        let (sql, _) = query.select_sql();
        assert!(sql.starts_with("SELECT DISTINCT "));

        let (count_sql, _) = query.count_sql();
        assert!(count_sql.contains("COUNT(DISTINCT work_genre_summaries.work_guid)"));
    }

    #[test]
    fn test_order_and_window_rendering() {
        let mut query = WorkQuery::new(&SUMMARY);
        query.order_by(vec![
            SortKey {
                column: "work_summaries.sort_title",
                ascending: true,
            },
            SortKey {
                column: "work_summaries.work_guid",
                ascending: false,
            },
        ]);
        query.set_window(20, 10);

        let (sql, _) = query.select_sql();
        assert!(sql.ends_with(
            "ORDER BY work_summaries.sort_title ASC, work_summaries.work_guid DESC LIMIT 10 OFFSET 20"
        ));
    }

    #[test]
    fn test_count_ignores_window() {
        let mut query = WorkQuery::new(&SUMMARY);
        query.set_window(20, 10);
        let (sql, _) = query.count_sql();
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let build = || {
            let mut query = WorkQuery::new(&SUMMARY);
            query.push(Clause::in_texts("work_summaries.language", ["eng"]));
            query.push(Clause::with(
                "work_summaries.quality >= ?",
                vec![Arg::Real(0.65)],
            ));
            query.set_window(0, 50);
            query
        };
        assert_eq!(build().select_sql(), build().select_sql());
        assert_eq!(build().count_sql(), build().count_sql());
    }
}
