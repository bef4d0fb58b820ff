//! Faceted refinement of browse queries
//!
//! A `Facets` value narrows a lane's result set along two axes and fixes
//! the ordering:
//! - Collection: how curated the set is (everything / quality-gated main
//!   collection / featured-quality only)
//! - Availability: how available a title must be (now / any licensed /
//!   open access only)
//!
//! Site hold policy is applied once, at construction: a site that hides
//! unavailable titles never sees an `All` availability query.

use crate::query::{Arg, Clause, SortKey, WorkQuery, WorkView};
use serde::{Deserialize, Serialize};
use stacks_common::{BrowsePolicy, HoldPolicy};

/// Quality floor a non-open-access title must meet for the main collection
pub const MAIN_COLLECTION_QUALITY_FLOOR: f64 = 0.3;

/// How curated the browsed collection is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Everything in the catalog
    Full,
    /// Open-access titles plus licensed titles of reasonable quality
    #[default]
    Main,
    /// Titles good enough to showcase
    Featured,
}

impl Collection {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full" => Some(Collection::Full),
            "main" => Some(Collection::Main),
            "featured" => Some(Collection::Featured),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Full => "full",
            Collection::Main => "main",
            Collection::Featured => "featured",
        }
    }

    pub fn all_variants() -> &'static [Collection] {
        &[Collection::Full, Collection::Main, Collection::Featured]
    }
}

/// How available a title must be to appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// At least one copy free right now, or open access
    Now,
    /// Owned in any quantity, or open access
    #[default]
    All,
    /// Open access only
    OpenAccess,
}

impl Availability {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "now" => Some(Availability::Now),
            "all" => Some(Availability::All),
            "open_access" => Some(Availability::OpenAccess),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Now => "now",
            Availability::All => "all",
            Availability::OpenAccess => "open_access",
        }
    }

    pub fn all_variants() -> &'static [Availability] {
        &[Availability::Now, Availability::All, Availability::OpenAccess]
    }
}

/// Primary sort order of a browse query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    Title,
    #[default]
    Author,
    LastUpdate,
    WorkId,
    /// Stable shuffle over the precomputed per-work random value
    Random,
}

impl Order {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "title" => Some(Order::Title),
            "author" => Some(Order::Author),
            "last_update" => Some(Order::LastUpdate),
            "work_id" => Some(Order::WorkId),
            "random" => Some(Order::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Title => "title",
            Order::Author => "author",
            Order::LastUpdate => "last_update",
            Order::WorkId => "work_id",
            Order::Random => "random",
        }
    }

    pub fn all_variants() -> &'static [Order] {
        &[
            Order::Title,
            Order::Author,
            Order::LastUpdate,
            Order::WorkId,
            Order::Random,
        ]
    }

    /// The column this facet sorts by under the given view
    pub fn column(&self, view: &dyn WorkView) -> &'static str {
        match self {
            Order::Title => view.sort_title_col(),
            Order::Author => view.sort_author_col(),
            Order::LastUpdate => view.last_update_col(),
            Order::WorkId => view.id_col(),
            Order::Random => view.random_col(),
        }
    }

    /// Inverse of `column` for the same view
    pub fn from_column(view: &dyn WorkView, column: &str) -> Option<Order> {
        Order::all_variants()
            .iter()
            .copied()
            .find(|order| order.column(view) == column)
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully resolved facet selection
#[derive(Debug, Clone)]
pub struct Facets {
    collection: Collection,
    availability: Availability,
    order: Order,
    ascending: bool,
    minimum_featured_quality: f64,
}

impl Facets {
    pub fn new(
        collection: Collection,
        availability: Availability,
        order: Order,
        ascending: bool,
        policy: &BrowsePolicy,
    ) -> Self {
        // A hide-unavailable site never browses titles it would have to
        // put on hold; the substitution happens here so every later reader
        // of `availability` sees the effective value.
        let availability = if policy.hold_policy == HoldPolicy::Hide
            && availability == Availability::All
        {
            Availability::Now
        } else {
            availability
        };
        Facets {
            collection,
            availability,
            order,
            ascending,
            minimum_featured_quality: policy.minimum_featured_quality,
        }
    }

    /// The default patron-facing facets
    pub fn default_for(policy: &BrowsePolicy) -> Self {
        Facets::new(
            Collection::default(),
            Availability::default(),
            Order::default(),
            true,
            policy,
        )
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    /// Restriction imposed by the availability facet
    pub fn availability_clause(&self, view: &dyn WorkView) -> Clause {
        match self.availability {
            Availability::Now => Clause::any([
                Clause::new(format!("{} = 1", view.open_access_col())),
                Clause::new(format!("{} > 0", view.licenses_available_col())),
            ]),
            Availability::All => Clause::any([
                Clause::new(format!("{} = 1", view.open_access_col())),
                Clause::new(format!("{} > 0", view.licenses_owned_col())),
            ]),
            Availability::OpenAccess => Clause::new(format!("{} = 1", view.open_access_col())),
        }
    }

    /// Restriction imposed by the collection facet, when it imposes one
    pub fn collection_clause(&self, view: &dyn WorkView) -> Option<Clause> {
        match self.collection {
            Collection::Full => None,
            // Licensed titles stay regardless of quality; open-access
            // titles must clear the floor.
            Collection::Main => Some(Clause::any([
                Clause::new(format!("{} = 0", view.open_access_col())),
                Clause::with(
                    format!("{} >= ?", view.quality_col()),
                    vec![Arg::Real(MAIN_COLLECTION_QUALITY_FLOOR)],
                ),
            ])),
            Collection::Featured => Some(Clause::with(
                format!("{} >= ?", view.quality_col()),
                vec![Arg::Real(self.minimum_featured_quality)],
            )),
        }
    }

    /// Full ordering: the facet's field first, then title, author, and id
    /// tie-breaks, skipping whichever of those the facet already used. All
    /// terms share the facet's direction.
    pub fn sort_keys(&self, view: &dyn WorkView) -> Vec<SortKey> {
        let primary = self.order.column(view);
        let mut columns = vec![primary];
        for tie_break in [view.sort_title_col(), view.sort_author_col(), view.id_col()] {
            if tie_break != primary {
                columns.push(tie_break);
            }
        }
        columns
            .into_iter()
            .map(|column| SortKey {
                column,
                ascending: self.ascending,
            })
            .collect()
    }

    /// Push this facet selection onto a query
    pub fn apply(&self, query: &mut WorkQuery) {
        let view = query.view();
        query.push(self.availability_clause(view));
        if let Some(clause) = self.collection_clause(view) {
            query.push(clause);
        }
        query.order_by(self.sort_keys(view));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{GENRE_SUMMARY, NORMALIZED, SUMMARY};
    use stacks_common::HoldPolicy;

    fn show_policy() -> BrowsePolicy {
        BrowsePolicy::default()
    }

    fn hide_policy() -> BrowsePolicy {
        BrowsePolicy {
            hold_policy: HoldPolicy::Hide,
            ..BrowsePolicy::default()
        }
    }

    #[test]
    fn test_hide_policy_narrows_all_to_now() {
        let facets = Facets::new(
            Collection::Main,
            Availability::All,
            Order::Title,
            true,
            &hide_policy(),
        );
        assert_eq!(facets.availability(), Availability::Now);
    }

    #[test]
    fn test_hide_policy_leaves_other_availabilities() {
        for availability in [Availability::Now, Availability::OpenAccess] {
            let facets = Facets::new(
                Collection::Main,
                availability,
                Order::Title,
                true,
                &hide_policy(),
            );
            assert_eq!(facets.availability(), availability);
        }
    }

    #[test]
    fn test_show_policy_keeps_all() {
        let facets = Facets::new(
            Collection::Main,
            Availability::All,
            Order::Title,
            true,
            &show_policy(),
        );
        assert_eq!(facets.availability(), Availability::All);
    }

    #[test]
    fn test_availability_clauses() {
        let policy = show_policy();
        let now = Facets::new(Collection::Full, Availability::Now, Order::Title, true, &policy);
        assert_eq!(
            now.availability_clause(&SUMMARY).sql,
            "(work_summaries.open_access = 1) OR (work_summaries.licenses_available > 0)"
        );

        let all = Facets::new(Collection::Full, Availability::All, Order::Title, true, &policy);
        assert_eq!(
            all.availability_clause(&SUMMARY).sql,
            "(work_summaries.open_access = 1) OR (work_summaries.licenses_owned > 0)"
        );

        let open = Facets::new(
            Collection::Full,
            Availability::OpenAccess,
            Order::Title,
            true,
            &policy,
        );
        assert_eq!(
            open.availability_clause(&SUMMARY).sql,
            "work_summaries.open_access = 1"
        );
    }

    #[test]
    fn test_collection_clauses() {
        let policy = show_policy();
        let full = Facets::new(Collection::Full, Availability::All, Order::Title, true, &policy);
        assert!(full.collection_clause(&SUMMARY).is_none());

        let main = Facets::new(Collection::Main, Availability::All, Order::Title, true, &policy);
        let clause = main.collection_clause(&SUMMARY).unwrap();
        assert_eq!(
            clause.sql,
            "(work_summaries.open_access = 0) OR (work_summaries.quality >= ?)"
        );
        assert_eq!(clause.binds, vec![Arg::Real(MAIN_COLLECTION_QUALITY_FLOOR)]);

        let featured = Facets::new(
            Collection::Featured,
            Availability::All,
            Order::Title,
            true,
            &policy,
        );
        let clause = featured.collection_clause(&SUMMARY).unwrap();
        assert_eq!(clause.sql, "work_summaries.quality >= ?");
        assert_eq!(clause.binds, vec![Arg::Real(0.65)]);
    }

    #[test]
    fn test_featured_floor_follows_policy() {
        let mut policy = show_policy();
        policy.minimum_featured_quality = 0.9;
        let featured = Facets::new(
            Collection::Featured,
            Availability::All,
            Order::Title,
            true,
            &policy,
        );
        let clause = featured.collection_clause(&SUMMARY).unwrap();
        assert_eq!(clause.binds, vec![Arg::Real(0.9)]);
    }

    #[test]
    fn test_sort_keys_skip_duplicate_tie_breaks() {
        let policy = show_policy();
        let by_title = Facets::new(Collection::Full, Availability::All, Order::Title, true, &policy);
        let columns: Vec<&str> = by_title
            .sort_keys(&SUMMARY)
            .iter()
            .map(|key| key.column)
            .collect();
        assert_eq!(
            columns,
            vec![
                "work_summaries.sort_title",
                "work_summaries.sort_author",
                "work_summaries.work_guid"
            ]
        );

        let by_random = Facets::new(
            Collection::Full,
            Availability::All,
            Order::Random,
            true,
            &policy,
        );
        let columns: Vec<&str> = by_random
            .sort_keys(&SUMMARY)
            .iter()
            .map(|key| key.column)
            .collect();
        assert_eq!(
            columns,
            vec![
                "work_summaries.random",
                "work_summaries.sort_title",
                "work_summaries.sort_author",
                "work_summaries.work_guid"
            ]
        );
    }

    #[test]
    fn test_direction_applies_to_every_key() {
        let policy = show_policy();
        let facets = Facets::new(
            Collection::Full,
            Availability::All,
            Order::Author,
            false,
            &policy,
        );
        assert!(facets.sort_keys(&NORMALIZED).iter().all(|key| !key.ascending));
    }

    #[test]
    fn test_order_column_round_trip_for_every_view() {
        let views: [&'static dyn WorkView; 3] = [&NORMALIZED, &SUMMARY, &GENRE_SUMMARY];
        for view in views {
            for order in Order::all_variants() {
                let column = order.column(view);
                assert_eq!(Order::from_column(view, column), Some(*order));
            }
        }
    }

    #[test]
    fn test_id_column_differs_across_views() {
        assert_eq!(Order::WorkId.column(&NORMALIZED), "works.guid");
        assert_eq!(Order::WorkId.column(&SUMMARY), "work_summaries.work_guid");
    }

    #[test]
    fn test_apply_pushes_clauses_and_order() {
        let policy = show_policy();
        let facets = Facets::new(
            Collection::Featured,
            Availability::Now,
            Order::Random,
            true,
            &policy,
        );
        let mut query = WorkQuery::new(&SUMMARY);
        facets.apply(&mut query);

        let (sql, binds) = query.select_sql();
        assert!(sql.contains("work_summaries.licenses_available > 0"));
        assert!(sql.contains("work_summaries.quality >= ?"));
        assert!(sql.contains("ORDER BY work_summaries.random ASC"));
        assert_eq!(binds, vec![Arg::Real(0.65)]);
    }

    #[test]
    fn test_facet_string_round_trips() {
        for collection in Collection::all_variants() {
            assert_eq!(Collection::from_str(collection.as_str()), Some(*collection));
        }
        for availability in Availability::all_variants() {
            assert_eq!(
                Availability::from_str(availability.as_str()),
                Some(*availability)
            );
        }
        for order in Order::all_variants() {
            assert_eq!(Order::from_str(order.as_str()), Some(*order));
        }
    }
}
