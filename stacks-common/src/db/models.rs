//! Catalog data models shared across the Stacks crates

use serde::Serialize;
use uuid::Uuid;

/// Medium of an edition's content
pub const MEDIUM_BOOK: &str = "Book";
pub const MEDIUM_PERIODICAL: &str = "Periodical";
pub const MEDIUM_AUDIO: &str = "Audio";
pub const MEDIUM_VIDEO: &str = "Video";

/// Delivery format of an edition
pub const FORMAT_ELECTRONIC: &str = "Electronic";
pub const FORMAT_CODEX: &str = "Codex";

/// Audience classification strings as stored in the database
pub const AUDIENCE_ADULT: &str = "Adult";
pub const AUDIENCE_ADULTS_ONLY: &str = "Adults Only";
pub const AUDIENCE_YOUNG_ADULT: &str = "Young Adult";
pub const AUDIENCE_CHILDREN: &str = "Children";

/// One catalog title, hydrated identically from either representation.
///
/// `fiction` is `None` for works the classifier could not call either way.
/// `target_age_lo`/`target_age_hi` bound the intended reader age when the
/// source supplied one.
#[derive(Debug, Clone, Serialize)]
pub struct WorkRecord {
    pub guid: Uuid,
    pub title: String,
    pub author: String,
    pub sort_title: String,
    pub sort_author: String,
    pub language: Option<String>,
    pub medium: String,
    pub source: String,
    pub audience: String,
    pub target_age_lo: Option<i64>,
    pub target_age_hi: Option<i64>,
    pub fiction: Option<bool>,
    pub appeal: Option<String>,
    pub quality: f64,
    pub random: f64,
    pub last_update_time: Option<String>,
    pub open_access: bool,
    pub licenses_owned: i64,
    pub licenses_available: i64,
    pub fulfillable: bool,
}
