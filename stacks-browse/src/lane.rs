//! Lane construction and filtering
//!
//! A lane is one browsable slice of the catalog: "Mystery", "Young Adult
//! Fiction", "Staff Picks". Lanes form a tree. A lane resolves its
//! restrictions at construction time, value by value: a restriction the
//! configuration supplies wins, an unsupplied one is taken from the parent,
//! and a handful of fields fall back to root defaults (media to Book,
//! delivery format to Electronic). An empty list counts as unsupplied.
//!
//! Construction is where all classification policy runs:
//! - the supplied genres expand to their full subgenre closure, minus the
//!   closure of any excluded genres
//! - the fiction mode is inferred from the matched genres, or widened to
//!   span both when a fixed mode contradicts them
//! - a locally supplied age range broadens the audience list, and the
//!   resolved combination is checked for consistency
//! - one sublane per immediate subgenre is generated unless the lane keeps
//!   its subgenres in place or declares sublanes of its own
//!
//! After construction a lane is immutable. Query assembly (`works_query`,
//! `summary_query`) renders the resolved restrictions against either
//! catalog representation through `query::WorkView`.

use crate::query::{Arg, Clause, WorkQuery, GENRE_SUMMARY, NORMALIZED, SUMMARY};
use crate::taxonomy::{
    Audience, FictionDefault, GenreId, Taxonomy, ADULT_AGE_CUTOFF, YOUNG_ADULT_AGE_CUTOFF,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Deserializer};
use stacks_common::db::models::{FORMAT_ELECTRONIC, MEDIUM_BOOK};
use stacks_common::BrowsePolicy;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// How long a title remains on a best-seller lane after it was last seen
/// on the backing list, in days.
pub const BEST_SELLER_LIST_DURATION_DAYS: i64 = 730;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaneError {
    #[error("unknown genre: {0}")]
    UnknownGenre(String),

    #[error("lane {lane}: genres {genres} carry contradictory fiction defaults")]
    ContradictoryFiction { lane: String, genres: String },

    #[error(
        "lane {lane}: an explicit sublane list was provided, but {generated} subgenre sublanes were also generated"
    )]
    SublaneConflict { lane: String, generated: usize },

    #[error("lane {0} specifies an age range but its audiences include neither children nor young adults")]
    AgeRangeWithoutJuvenileAudience(String),

    #[error("duplicate lane: {0}")]
    DuplicateLane(String),
}

/// What to do with subgenres of the lane's genres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubgenrePolicy {
    /// Generate one sublane per immediate subgenre
    #[default]
    Separate,
    /// Keep subgenre titles in this lane, with no generated sublanes
    Collapse,
}

/// The fiction restriction as configured, before resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FictionPolicy {
    Fiction,
    Nonfiction,
    Both,
    Unclassified,
    /// Infer the restriction from the defaults of the matched genres
    #[default]
    DefaultForGenre,
}

impl<'de> Deserialize<'de> for FictionPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Keyword(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(FictionPolicy::Fiction),
            Raw::Flag(false) => Ok(FictionPolicy::Nonfiction),
            Raw::Keyword(keyword) => match keyword.as_str() {
                "fiction" => Ok(FictionPolicy::Fiction),
                "nonfiction" => Ok(FictionPolicy::Nonfiction),
                "both" => Ok(FictionPolicy::Both),
                "unclassified" => Ok(FictionPolicy::Unclassified),
                "default" => Ok(FictionPolicy::DefaultForGenre),
                other => Err(serde::de::Error::custom(format!(
                    "unknown fiction mode: {}",
                    other
                ))),
            },
        }
    }
}

/// The fiction restriction a lane actually enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FictionMode {
    Fiction,
    Nonfiction,
    /// No restriction
    Both,
    /// Only works the classifier could not call either way
    Unclassified,
}

impl FictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FictionMode::Fiction => "fiction",
            FictionMode::Nonfiction => "nonfiction",
            FictionMode::Both => "both",
            FictionMode::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for FictionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An intended reader age range, inclusive on both ends.
///
/// A single age is the range `[age, age]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub lower: i64,
    pub upper: i64,
}

/// Age range as configured: a single age or a list of ages
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AgeRangeSpec {
    Single(i64),
    Range(Vec<i64>),
}

impl AgeRangeSpec {
    /// An empty list counts as unsupplied.
    fn to_range(&self) -> Option<AgeRange> {
        match self {
            AgeRangeSpec::Single(age) => Some(AgeRange {
                lower: *age,
                upper: *age,
            }),
            AgeRangeSpec::Range(values) => {
                let lower = *values.iter().min()?;
                let upper = *values.iter().max()?;
                Some(AgeRange { lower, upper })
            }
        }
    }
}

/// A genre descriptor in a lane configuration.
///
/// The longer forms carry subgenre and audience members kept for older
/// configurations; only the genre name is honored.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GenreSpec {
    Name(String),
    WithSubgenres(String, Vec<String>),
    WithAudience(String, Vec<String>, String),
}

impl GenreSpec {
    pub fn name(&self) -> &str {
        match self {
            GenreSpec::Name(name)
            | GenreSpec::WithSubgenres(name, _)
            | GenreSpec::WithAudience(name, _, _) => name,
        }
    }
}

/// One entry in a sublane list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LaneInput {
    /// A bare genre name: a lane named after the genre, restricted to it
    Genre(String),
    /// A full lane configuration
    Config(Box<LaneConfig>),
    /// An already-built lane, adopted under the new parent as-is
    #[serde(skip)]
    Built(Box<Lane>),
}

/// Lane configuration as read from a lanes file.
///
/// Every field except `name` may be omitted. Omitted (or empty) values are
/// inherited during construction; see the module documentation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaneConfig {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub genres: Vec<GenreSpec>,
    #[serde(default)]
    pub exclude_genres: Vec<GenreSpec>,
    #[serde(default)]
    pub subgenre_policy: Option<SubgenrePolicy>,
    #[serde(default)]
    pub fiction: FictionPolicy,
    #[serde(default)]
    pub audiences: Vec<Audience>,
    #[serde(default)]
    pub age_range: Option<AgeRangeSpec>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub appeals: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub languages: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub media: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub list_source: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub list_identifiers: Vec<String>,
    #[serde(default)]
    pub list_seen_in_previous_days: Option<i64>,
    #[serde(default)]
    pub suppress_lane: bool,
    #[serde(default)]
    pub sublanes: Vec<LaneInput>,
}

/// Accept a bare string where a list of strings is expected.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::One(value) => vec![value],
        Raw::Many(values) => values,
    })
}

/// One browsable slice of the catalog, with all restrictions resolved
#[derive(Debug, Clone)]
pub struct Lane {
    pub(crate) name: String,
    pub(crate) display_name: String,
    pub(crate) parent: Option<String>,
    /// Full matched genre set; empty means no genre restriction
    pub(crate) genres: BTreeSet<String>,
    pub(crate) fiction: FictionMode,
    /// Empty means no audience restriction
    pub(crate) audiences: BTreeSet<Audience>,
    pub(crate) age_range: Option<AgeRange>,
    pub(crate) appeals: Option<Vec<String>>,
    pub(crate) languages: Option<Vec<String>>,
    pub(crate) media: Vec<String>,
    pub(crate) formats: Vec<String>,
    pub(crate) list_source: Option<String>,
    pub(crate) list_identifiers: Vec<String>,
    pub(crate) list_seen_in_previous_days: Option<i64>,
    pub(crate) subgenre_policy: SubgenrePolicy,
    pub(crate) sublanes: LaneList,
}

impl Lane {
    /// Build a lane (and its subtree) from a configuration.
    ///
    /// Restrictions resolve against `parent` as described in the module
    /// documentation. Fails when a genre is unknown, when genre defaults
    /// contradict an inferred fiction mode, when explicit and generated
    /// sublanes collide, or when the resolved age range and audiences are
    /// inconsistent.
    pub fn from_config(
        taxonomy: &Taxonomy,
        parent: Option<&Lane>,
        config: LaneConfig,
    ) -> Result<Lane, LaneError> {
        let name = config.name;
        let display_name = config.display_name.unwrap_or_else(|| name.clone());

        let supplied_age_range = config.age_range.as_ref().and_then(AgeRangeSpec::to_range);
        let age_range = supplied_age_range.or_else(|| parent.and_then(|p| p.age_range));

        // Only a locally supplied range broadens the audience list. An
        // inherited range was already accounted for on the parent.
        let supplied_audiences: BTreeSet<Audience> = config.audiences.into_iter().collect();
        let base_audiences = if supplied_audiences.is_empty() {
            parent.map(|p| p.audiences.clone()).unwrap_or_default()
        } else {
            supplied_audiences
        };
        let audiences = broaden_audiences(base_audiences, supplied_age_range);

        let languages = inherit_optional(config.languages, parent.map(|p| &p.languages));
        let appeals = inherit_optional(config.appeals, parent.map(|p| &p.appeals));
        let media = inherit_with_default(config.media, parent.map(|p| &p.media), MEDIUM_BOOK);
        let formats = inherit_with_default(
            config.formats,
            parent.map(|p| &p.formats),
            FORMAT_ELECTRONIC,
        );

        // List restrictions belong to the lane that declares them; only
        // the recency cutoff is inherited.
        let list_source = config.list_source;
        let list_identifiers = config.list_identifiers;
        let list_seen_in_previous_days = config
            .list_seen_in_previous_days
            .or_else(|| parent.and_then(|p| p.list_seen_in_previous_days));

        let subgenre_policy = config
            .subgenre_policy
            .or_else(|| parent.map(|p| p.subgenre_policy))
            .unwrap_or_default();

        let supplied_ids = resolve_genres(taxonomy, &config.genres)?;
        let excluded = exclusion_closure(taxonomy, &config.exclude_genres)?;

        let mut matched_ids: BTreeSet<GenreId> = BTreeSet::new();
        for &id in &supplied_ids {
            matched_ids.extend(taxonomy.self_and_subgenres(id));
        }
        matched_ids.retain(|id| !excluded.contains(id));

        let fiction = resolve_fiction(taxonomy, &name, config.fiction, &matched_ids)?;

        let genres: BTreeSet<String> = matched_ids
            .iter()
            .map(|&id| taxonomy.name(id).to_string())
            .collect();

        let mut lane = Lane {
            name,
            display_name,
            parent: parent.map(|p| p.name.clone()),
            genres,
            fiction,
            audiences,
            age_range,
            appeals,
            languages,
            media,
            formats,
            list_source,
            list_identifiers,
            list_seen_in_previous_days,
            subgenre_policy,
            sublanes: LaneList::default(),
        };

        // One sublane per immediate subgenre of each supplied genre,
        // unless that subgenre was excluded.
        let mut generated = Vec::new();
        if lane.subgenre_policy == SubgenrePolicy::Separate {
            for &genre_id in &supplied_ids {
                for &subgenre in taxonomy.children(genre_id) {
                    if excluded.contains(&subgenre) {
                        continue;
                    }
                    let child = LaneConfig {
                        name: taxonomy.name(subgenre).to_string(),
                        genres: vec![GenreSpec::Name(taxonomy.name(subgenre).to_string())],
                        subgenre_policy: Some(SubgenrePolicy::Separate),
                        ..LaneConfig::default()
                    };
                    generated.push(Lane::from_config(taxonomy, Some(&lane), child)?);
                }
            }
        }

        if !config.sublanes.is_empty() && !generated.is_empty() {
            return Err(LaneError::SublaneConflict {
                lane: lane.name,
                generated: generated.len(),
            });
        }

        lane.sublanes = if !generated.is_empty() {
            let mut list = LaneList::with_parent(Some(lane.name.clone()));
            for sublane in generated {
                list.add(Arc::new(sublane))?;
            }
            list
        } else {
            LaneList::build(taxonomy, Some(&lane), config.sublanes)?
        };

        // The check runs on the resolved values, so an inherited range can
        // clash with audiences supplied here.
        if lane.age_range.is_some()
            && !lane.audiences.contains(&Audience::Children)
            && !lane.audiences.contains(&Audience::YoungAdult)
        {
            return Err(LaneError::AgeRangeWithoutJuvenileAudience(lane.name));
        }

        Ok(lane)
    }

    /// A lane named after a single genre and restricted to it
    pub fn from_genre(
        taxonomy: &Taxonomy,
        parent: Option<&Lane>,
        genre_name: &str,
    ) -> Result<Lane, LaneError> {
        let id = taxonomy
            .resolve(genre_name)
            .ok_or_else(|| LaneError::UnknownGenre(genre_name.to_string()))?;
        let canonical = taxonomy.name(id).to_string();
        let config = LaneConfig {
            name: canonical.clone(),
            genres: vec![GenreSpec::Name(canonical)],
            ..LaneConfig::default()
        };
        Lane::from_config(taxonomy, parent, config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// The lane name in a form safe for a URL path segment
    pub fn url_name(&self) -> String {
        self.name.replace('/', "__")
    }

    pub fn genres(&self) -> &BTreeSet<String> {
        &self.genres
    }

    pub fn fiction(&self) -> FictionMode {
        self.fiction
    }

    pub fn audiences(&self) -> &BTreeSet<Audience> {
        &self.audiences
    }

    pub fn age_range(&self) -> Option<AgeRange> {
        self.age_range
    }

    pub fn languages(&self) -> Option<&[String]> {
        self.languages.as_deref()
    }

    pub fn appeals(&self) -> Option<&[String]> {
        self.appeals.as_deref()
    }

    pub fn media(&self) -> &[String] {
        &self.media
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    pub fn sublanes(&self) -> &LaneList {
        &self.sublanes
    }

    /// Query over the normalized representation, restricted to this lane
    pub fn works_query(&self, policy: &BrowsePolicy) -> WorkQuery {
        let mut query = WorkQuery::new(&NORMALIZED);
        if !self.genres.is_empty() {
            let placeholders = vec!["?"; self.genres.len()].join(", ");
            let binds = self.genres.iter().map(|g| Arg::Text(g.clone())).collect();
            query.push(Clause::with(
                format!(
                    "EXISTS (SELECT 1 FROM work_genres \
                     WHERE work_genres.work_guid = works.guid \
                     AND work_genres.genre IN ({}))",
                    placeholders
                ),
                binds,
            ));
        }
        self.apply_filters(&mut query, policy);
        query
    }

    /// Query over the precomputed representation, restricted to this lane.
    ///
    /// Genre-restricted lanes read the per-(work, genre) table; the rest
    /// read the per-work table. Results are identical to `works_query`
    /// over the same catalog.
    pub fn summary_query(&self, policy: &BrowsePolicy) -> WorkQuery {
        let mut query = if self.genres.is_empty() {
            WorkQuery::new(&SUMMARY)
        } else {
            let mut query = WorkQuery::new(&GENRE_SUMMARY);
            if let Some(genre_col) = query.view().genre_col() {
                query.push(Clause::in_texts(genre_col, self.genres.iter().cloned()));
            }
            query
        };
        self.apply_filters(&mut query, policy);
        query
    }

    /// Add this lane's restrictions to a query, except the genre match.
    pub fn apply_filters(&self, query: &mut WorkQuery, policy: &BrowsePolicy) {
        let view = query.view();

        if let Some(languages) = &self.languages {
            query.push(Clause::in_texts(view.language_col(), languages.iter().cloned()));
        }

        if !self.audiences.is_empty() {
            query.push(Clause::in_texts(
                view.audience_col(),
                self.audiences.iter().map(|a| a.to_db_string()),
            ));
            // Sources whose classifications are too coarse to trust for
            // juvenile audiences are excluded from juvenile lanes.
            let juvenile = self.audiences.contains(&Audience::Children)
                || self.audiences.contains(&Audience::YoungAdult);
            if juvenile && !policy.juvenile_source_exclusions.is_empty() {
                let placeholders = vec!["?"; policy.juvenile_source_exclusions.len()].join(", ");
                let binds = policy
                    .juvenile_source_exclusions
                    .iter()
                    .map(|s| Arg::Text(s.clone()))
                    .collect();
                query.push(Clause::with(
                    format!("{} NOT IN ({})", view.source_col(), placeholders),
                    binds,
                ));
            }
        }

        if let Some(appeals) = &self.appeals {
            query.push(Clause::in_texts(view.appeal_col(), appeals.iter().cloned()));
        }

        if let Some(range) = self.age_range {
            let lo = view.target_age_lo_col();
            let hi = view.target_age_hi_col();
            let overlap = Clause::with(
                format!(
                    "{lo} IS NOT NULL AND {hi} IS NOT NULL AND {lo} <= ? AND {hi} >= ?",
                    lo = lo,
                    hi = hi
                ),
                vec![Arg::Int(range.upper), Arg::Int(range.lower)],
            );
            let adult_in_scope = self.audiences.contains(&Audience::Adult)
                || self.audiences.contains(&Audience::AdultsOnly);
            if adult_in_scope {
                // Adult titles routinely carry no target age; they stay in.
                let untargeted = Clause::new(format!("{} IS NULL AND {} IS NULL", lo, hi));
                query.push(Clause::any([overlap, untargeted]));
            } else {
                query.push(overlap);
            }
        }

        match self.fiction {
            FictionMode::Both => {}
            FictionMode::Unclassified => {
                query.push(Clause::new(format!("{} IS NULL", view.fiction_col())));
            }
            FictionMode::Fiction => {
                query.push(Clause::new(format!("{} = 1", view.fiction_col())));
            }
            FictionMode::Nonfiction => {
                query.push(Clause::new(format!("{} = 0", view.fiction_col())));
            }
        }

        if !self.media.is_empty() {
            query.push(Clause::in_texts(view.medium_col(), self.media.iter().cloned()));
        }

        // TODO: filter on formats once delivery formats are modeled on
        // license pools.

        // Only offer titles the default client can open.
        query.push(Clause::new(format!("{} = 1", view.fulfillable_col())));

        if self.list_source.is_some() || !self.list_identifiers.is_empty() {
            query.push(self.list_clause(view.id_col()));
        }
    }

    /// Membership restriction for lanes backed by curated lists
    fn list_clause(&self, id_col: &str) -> Clause {
        let mut sql = format!(
            "EXISTS (SELECT 1 FROM custom_list_entries \
             JOIN custom_lists ON custom_lists.identifier = custom_list_entries.list_identifier \
             WHERE custom_list_entries.work_guid = {}",
            id_col
        );
        let mut binds = Vec::new();
        if let Some(source) = &self.list_source {
            sql.push_str(" AND custom_lists.source = ?");
            binds.push(Arg::Text(source.clone()));
        }
        if !self.list_identifiers.is_empty() {
            let placeholders = vec!["?"; self.list_identifiers.len()].join(", ");
            sql.push_str(&format!(
                " AND custom_list_entries.list_identifier IN ({})",
                placeholders
            ));
            binds.extend(self.list_identifiers.iter().map(|id| Arg::Text(id.clone())));
        }
        if let Some(days) = self.list_seen_in_previous_days {
            let cutoff = Utc::now() - Duration::days(days);
            sql.push_str(" AND custom_list_entries.most_recent_appearance >= ?");
            binds.push(Arg::Text(cutoff.format("%Y-%m-%d %H:%M:%S").to_string()));
        }
        sql.push(')');
        Clause::with(sql, binds)
    }
}

fn resolve_genres(taxonomy: &Taxonomy, specs: &[GenreSpec]) -> Result<Vec<GenreId>, LaneError> {
    specs
        .iter()
        .map(|spec| {
            taxonomy
                .resolve(spec.name())
                .ok_or_else(|| LaneError::UnknownGenre(spec.name().to_string()))
        })
        .collect()
}

/// Excluding a genre excludes its whole subtree.
fn exclusion_closure(
    taxonomy: &Taxonomy,
    specs: &[GenreSpec],
) -> Result<BTreeSet<GenreId>, LaneError> {
    let mut closure = BTreeSet::new();
    for &id in &resolve_genres(taxonomy, specs)? {
        closure.extend(taxonomy.self_and_subgenres(id));
    }
    Ok(closure)
}

/// Widen the audience list to match a locally supplied age range.
///
/// A range reaching 18 includes adult readers; a range starting below 14
/// includes children; one starting at 14 or above includes young adults.
fn broaden_audiences(
    mut audiences: BTreeSet<Audience>,
    age_range: Option<AgeRange>,
) -> BTreeSet<Audience> {
    let Some(range) = age_range else {
        return audiences;
    };
    if range.upper >= ADULT_AGE_CUTOFF {
        audiences.insert(Audience::Adult);
    }
    if range.lower < YOUNG_ADULT_AGE_CUTOFF {
        audiences.insert(Audience::Children);
    }
    if range.lower >= YOUNG_ADULT_AGE_CUTOFF {
        audiences.insert(Audience::YoungAdult);
    }
    audiences
}

fn inherit_optional(
    supplied: Vec<String>,
    parent: Option<&Option<Vec<String>>>,
) -> Option<Vec<String>> {
    if !supplied.is_empty() {
        return Some(supplied);
    }
    parent.and_then(|value| value.clone())
}

fn inherit_with_default(
    supplied: Vec<String>,
    parent: Option<&Vec<String>>,
    default: &str,
) -> Vec<String> {
    if !supplied.is_empty() {
        return supplied;
    }
    match parent {
        Some(value) => value.clone(),
        None => vec![default.to_string()],
    }
}

/// Resolve the fiction restriction against the matched genres.
fn resolve_fiction(
    taxonomy: &Taxonomy,
    lane_name: &str,
    policy: FictionPolicy,
    genres: &BTreeSet<GenreId>,
) -> Result<FictionMode, LaneError> {
    let explicit = match policy {
        FictionPolicy::DefaultForGenre => None,
        FictionPolicy::Fiction => Some(FictionMode::Fiction),
        FictionPolicy::Nonfiction => Some(FictionMode::Nonfiction),
        FictionPolicy::Both => Some(FictionMode::Both),
        FictionPolicy::Unclassified => Some(FictionMode::Unclassified),
    };

    if let Some(mut mode) = explicit {
        // A fixed mode that disagrees with any matched genre's default
        // widens to span both, rather than exclude every title.
        for &id in genres {
            let agrees = matches!(
                (mode, taxonomy.default_fiction(id)),
                (FictionMode::Fiction, FictionDefault::Fiction)
                    | (FictionMode::Nonfiction, FictionDefault::Nonfiction)
            );
            if !agrees {
                mode = FictionMode::Both;
                break;
            }
        }
        return Ok(mode);
    }

    // Infer one consistent default from the matched genres. Genres with no
    // default express no opinion; two that disagree are an error.
    let mut inferred: Option<FictionMode> = None;
    for &id in genres {
        let vote = match taxonomy.default_fiction(id) {
            FictionDefault::Fiction => FictionMode::Fiction,
            FictionDefault::Nonfiction => FictionMode::Nonfiction,
            FictionDefault::Unset => continue,
        };
        match inferred {
            None => inferred = Some(vote),
            Some(current) if current != vote => {
                let names: Vec<&str> = genres.iter().map(|&id| taxonomy.name(id)).collect();
                return Err(LaneError::ContradictoryFiction {
                    lane: lane_name.to_string(),
                    genres: names.join(", "),
                });
            }
            Some(_) => {}
        }
    }
    Ok(inferred.unwrap_or(FictionMode::Both))
}

/// An ordered list of lanes, with a flat name registry of the whole
/// subtree beneath it.
///
/// `lanes` holds only the direct children of this list's parent;
/// `get` also finds every descendant by name.
#[derive(Debug, Clone, Default)]
pub struct LaneList {
    parent: Option<String>,
    lanes: Vec<Arc<Lane>>,
    by_name: HashMap<String, Arc<Lane>>,
}

impl LaneList {
    fn with_parent(parent: Option<String>) -> Self {
        LaneList {
            parent,
            lanes: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Build the lanes described by `inputs` under `parent`.
    ///
    /// Inputs build in order; declaration order is preserved. Configured
    /// lanes marked `suppress_lane` are skipped, subtree and all. A name
    /// appearing twice anywhere in the subtree is an error.
    pub fn build(
        taxonomy: &Taxonomy,
        parent: Option<&Lane>,
        inputs: Vec<LaneInput>,
    ) -> Result<LaneList, LaneError> {
        let mut list = LaneList::with_parent(parent.map(|p| p.name.clone()));
        for input in inputs {
            let lane = match input {
                LaneInput::Genre(name) => Some(Lane::from_genre(taxonomy, parent, &name)?),
                LaneInput::Config(config) => {
                    if config.suppress_lane {
                        None
                    } else {
                        Some(Lane::from_config(taxonomy, parent, *config)?)
                    }
                }
                LaneInput::Built(built) => {
                    let mut lane = *built;
                    lane.parent = parent.map(|p| p.name.clone());
                    Some(lane)
                }
            };
            if let Some(lane) = lane {
                list.add_recursively(Arc::new(lane))?;
            }
        }
        Ok(list)
    }

    fn add_recursively(&mut self, lane: Arc<Lane>) -> Result<(), LaneError> {
        self.add(lane.clone())?;
        for sublane in lane.sublanes.lanes() {
            self.add_recursively(sublane.clone())?;
        }
        Ok(())
    }

    fn add(&mut self, lane: Arc<Lane>) -> Result<(), LaneError> {
        if lane.parent.as_deref() == self.parent.as_deref() {
            self.lanes.push(lane.clone());
        }
        if let Some(existing) = self.by_name.get(lane.name()) {
            if !Arc::ptr_eq(existing, &lane) {
                return Err(LaneError::DuplicateLane(lane.name().to_string()));
            }
        }
        self.by_name.insert(lane.name().to_string(), lane);
        Ok(())
    }

    /// Direct children, in declaration order
    pub fn lanes(&self) -> &[Arc<Lane>] {
        &self.lanes
    }

    /// Look up any lane in the subtree by name
    pub fn get(&self, name: &str) -> Option<&Arc<Lane>> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Lane>> {
        self.lanes.iter()
    }
}
