//! Featured-title selection
//!
//! A featured shelf wants `size` good, available titles, but a thin lane
//! cannot always provide them. Selection walks a ladder of facet
//! combinations from strictest to loosest and stops at the first rung that
//! can fill the shelf. The last rung is desperate: it returns whatever the
//! lane holds rather than an empty shelf.
//!
//! Each rung reads a random window of the lane under random order, so
//! repeated visits see different titles without any per-patron state.

use crate::facets::{Availability, Collection, Facets, Order};
use crate::lane::Lane;
use crate::store;
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::SqlitePool;
use stacks_common::db::models::WorkRecord;
use stacks_common::{BrowsePolicy, Error};
use tracing::debug;

/// Facet combinations tried in order when assembling a featured shelf.
/// The final rung takes whatever the lane has.
const FEATURED_LADDER: [(Collection, Availability); 5] = [
    (Collection::Featured, Availability::Now),
    (Collection::Featured, Availability::All),
    (Collection::Main, Availability::Now),
    (Collection::Main, Availability::All),
    (Collection::Full, Availability::All),
];

impl Lane {
    /// Assemble a featured shelf of up to `size` works for this lane.
    ///
    /// Works are returned shuffled. Fewer than `size` works come back only
    /// when the whole lane holds fewer.
    pub async fn featured_works(
        &self,
        pool: &SqlitePool,
        policy: &BrowsePolicy,
        size: i64,
    ) -> Result<Vec<WorkRecord>, Error> {
        let last = FEATURED_LADDER.len() - 1;
        for (rung, (collection, availability)) in FEATURED_LADDER.iter().enumerate() {
            let desperate = rung == last;
            let facets = Facets::new(*collection, *availability, Order::Random, true, policy);
            let works = self
                .featured_for_facets(pool, policy, &facets, size, desperate)
                .await?;
            if !works.is_empty() {
                return Ok(works);
            }
        }
        Ok(Vec::new())
    }

    /// One rung of the ladder: a random window of `size` works under the
    /// given facets, shuffled. A lane too short to fill the window yields
    /// nothing unless `desperate`.
    pub async fn featured_for_facets(
        &self,
        pool: &SqlitePool,
        policy: &BrowsePolicy,
        facets: &Facets,
        size: i64,
        desperate: bool,
    ) -> Result<Vec<WorkRecord>, Error> {
        let mut query = self.summary_query(policy);
        facets.apply(&mut query);

        let total = store::count(pool, &query).await?;
        if total < size && !desperate {
            debug!(
                "Lane {} holds {} of {} wanted at {}/{}; trying the next rung",
                self.name(),
                total,
                size,
                facets.collection().as_str(),
                facets.availability().as_str()
            );
            return Ok(Vec::new());
        }

        let offset = if total >= size {
            rand::thread_rng().gen_range(0..=total - size)
        } else {
            0
        };
        query.set_window(offset, size);
        let mut works = store::fetch(pool, &query).await?;
        works.shuffle(&mut rand::thread_rng());
        Ok(works)
    }
}
