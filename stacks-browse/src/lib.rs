//! # Stacks Browse Library
//!
//! Lane-based catalog browsing:
//! - Genre taxonomy with fiction defaults and subgenre closure
//! - Lane construction from configuration, with inheritance and
//!   generated subgenre sublanes
//! - Faceted, ordered, paginated queries over the catalog's normalized
//!   and precomputed representations
//! - Featured-shelf assembly and ranked title search with a database
//!   fallback

pub mod facets;
pub mod featured;
pub mod lane;
pub mod pagination;
pub mod query;
pub mod search;
pub mod store;
pub mod taxonomy;

pub use facets::{Availability, Collection, Facets, Order};
pub use lane::{Lane, LaneConfig, LaneError, LaneInput, LaneList};
pub use pagination::Pagination;
pub use search::{SearchError, SearchIndex, SearchRequest};
pub use taxonomy::Taxonomy;
