//! Genre taxonomy and audience classification
//!
//! Provides the immutable genre tree the browse layer consults:
//! - Name resolution to genre ids
//! - Parent/child traversal and self-and-subgenres expansion
//! - Per-genre fiction defaults (fiction / nonfiction / unset)
//! - Audience classifications and reader age cutoffs

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Readers at or above this age are assumed to be young adults rather
/// than children when only an age range is known.
pub const YOUNG_ADULT_AGE_CUTOFF: i64 = 14;

/// Age ranges reaching this value include adult readers.
pub const ADULT_AGE_CUTOFF: i64 = 18;

/// Audience classifications as assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Audience {
    #[serde(rename = "Adult")]
    Adult,
    #[serde(rename = "Adults Only")]
    AdultsOnly,
    #[serde(rename = "Young Adult")]
    YoungAdult,
    #[serde(rename = "Children")]
    Children,
}

impl Audience {
    /// Parse an audience from its database string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "adult" => Some(Audience::Adult),
            "adults only" => Some(Audience::AdultsOnly),
            "young adult" => Some(Audience::YoungAdult),
            "children" => Some(Audience::Children),
            _ => None,
        }
    }

    /// Convert to database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Audience::Adult => "Adult",
            Audience::AdultsOnly => "Adults Only",
            Audience::YoungAdult => "Young Adult",
            Audience::Children => "Children",
        }
    }

    /// Get all audience variants
    pub fn all_variants() -> &'static [Audience] {
        &[
            Audience::Adult,
            Audience::AdultsOnly,
            Audience::YoungAdult,
            Audience::Children,
        ]
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Whether works classified under a genre default to fiction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FictionDefault {
    Fiction,
    Nonfiction,
    /// Genres like Humor or Classics that span both
    Unset,
}

/// Handle to a genre inside a `Taxonomy`; only meaningful for the
/// taxonomy that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenreId(usize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("duplicate genre name: {0}")]
    DuplicateGenre(String),
}

#[derive(Debug)]
struct Genre {
    name: String,
    parent: Option<GenreId>,
    fiction: FictionDefault,
    children: Vec<GenreId>,
}

/// The genre tree. Immutable once built; shared freely across threads.
#[derive(Debug)]
pub struct Taxonomy {
    genres: Vec<Genre>,
    by_name: HashMap<String, GenreId>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Taxonomy {
            genres: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a genre under an optional parent
    pub fn add(
        &mut self,
        name: &str,
        parent: Option<GenreId>,
        fiction: FictionDefault,
    ) -> Result<GenreId, TaxonomyError> {
        if self.by_name.contains_key(name) {
            return Err(TaxonomyError::DuplicateGenre(name.to_string()));
        }
        let id = GenreId(self.genres.len());
        self.genres.push(Genre {
            name: name.to_string(),
            parent,
            fiction,
            children: Vec::new(),
        });
        if let Some(parent_id) = parent {
            self.genres[parent_id.0].children.push(id);
        }
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Look up a genre by name
    pub fn resolve(&self, name: &str) -> Option<GenreId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: GenreId) -> &str {
        &self.genres[id.0].name
    }

    pub fn parent(&self, id: GenreId) -> Option<GenreId> {
        self.genres[id.0].parent
    }

    /// Immediate subgenres, in registration order
    pub fn children(&self, id: GenreId) -> &[GenreId] {
        &self.genres[id.0].children
    }

    pub fn default_fiction(&self, id: GenreId) -> FictionDefault {
        self.genres[id.0].fiction
    }

    /// The genre plus every descendant, transitively
    pub fn self_and_subgenres(&self, id: GenreId) -> BTreeSet<GenreId> {
        let mut out = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if out.insert(current) {
                stack.extend(self.genres[current.0].children.iter().copied());
            }
        }
        out
    }

    /// The built-in genre tree used when no site-specific taxonomy is
    /// supplied. Mirrors the classifier's genre list.
    pub fn builtin() -> &'static Taxonomy {
        static BUILTIN: Lazy<Taxonomy> =
            Lazy::new(|| build_builtin().expect("builtin taxonomy is well-formed"));
        &BUILTIN
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Taxonomy::new()
    }
}

fn build_builtin() -> Result<Taxonomy, TaxonomyError> {
    use FictionDefault::{Fiction, Nonfiction, Unset};

    let mut t = Taxonomy::new();

    // Fiction genres
    t.add("Adventure", None, Fiction)?;
    t.add("Comics & Graphic Novels", None, Fiction)?;
    t.add("Erotica", None, Fiction)?;
    let fantasy = t.add("Fantasy", None, Fiction)?;
    t.add("Epic Fantasy", Some(fantasy), Fiction)?;
    t.add("Historical Fantasy", Some(fantasy), Fiction)?;
    t.add("Urban Fantasy", Some(fantasy), Fiction)?;
    t.add("Folklore", None, Fiction)?;
    t.add("Historical Fiction", None, Fiction)?;
    t.add("Horror", None, Fiction)?;
    t.add("Literary Fiction", None, Fiction)?;
    let mystery = t.add("Mystery", None, Fiction)?;
    t.add("Cozy Mystery", Some(mystery), Fiction)?;
    t.add("Hard-Boiled Mystery", Some(mystery), Fiction)?;
    t.add("Police Procedural", Some(mystery), Fiction)?;
    t.add("Religious Fiction", None, Fiction)?;
    let romance = t.add("Romance", None, Fiction)?;
    t.add("Contemporary Romance", Some(romance), Fiction)?;
    t.add("Historical Romance", Some(romance), Fiction)?;
    t.add("Paranormal Romance", Some(romance), Fiction)?;
    let science_fiction = t.add("Science Fiction", None, Fiction)?;
    t.add("Cyberpunk", Some(science_fiction), Fiction)?;
    t.add("Dystopian SF", Some(science_fiction), Fiction)?;
    t.add("Space Opera", Some(science_fiction), Fiction)?;
    t.add("Short Stories", None, Fiction)?;
    let thriller = t.add("Suspense/Thriller", None, Fiction)?;
    t.add("Espionage", Some(thriller), Fiction)?;
    t.add("Legal Thriller", Some(thriller), Fiction)?;
    t.add("Urban Fiction", None, Fiction)?;
    t.add("Westerns", None, Fiction)?;
    t.add("Women's Fiction", None, Fiction)?;

    // Genres that span fiction and nonfiction
    t.add("Classics", None, Unset)?;
    t.add("Drama", None, Unset)?;
    let humor = t.add("Humor", None, Unset)?;
    t.add("Humorous Fiction", Some(humor), Fiction)?;
    t.add("Humorous Nonfiction", Some(humor), Nonfiction)?;
    t.add("Periodicals", None, Unset)?;
    t.add("Poetry", None, Unset)?;

    // Nonfiction genres
    t.add("Art & Design", None, Nonfiction)?;
    t.add("Biography & Memoir", None, Nonfiction)?;
    t.add("Business", None, Nonfiction)?;
    t.add("Computers", None, Nonfiction)?;
    t.add("Cooking", None, Nonfiction)?;
    t.add("Crafts & Hobbies", None, Nonfiction)?;
    t.add("Education", None, Nonfiction)?;
    t.add("Entertainment", None, Nonfiction)?;
    t.add("Health & Diet", None, Nonfiction)?;
    let history = t.add("History", None, Nonfiction)?;
    t.add("African History", Some(history), Nonfiction)?;
    t.add("American History", Some(history), Nonfiction)?;
    t.add("Ancient History", Some(history), Nonfiction)?;
    t.add("European History", Some(history), Nonfiction)?;
    t.add("Military History", Some(history), Nonfiction)?;
    t.add("Law", None, Nonfiction)?;
    t.add("Nature", None, Nonfiction)?;
    t.add("Parenting & Family", None, Nonfiction)?;
    t.add("Personal Finance & Investing", None, Nonfiction)?;
    t.add("Pets", None, Nonfiction)?;
    t.add("Philosophy", None, Nonfiction)?;
    t.add("Political Science", None, Nonfiction)?;
    t.add("Psychology", None, Nonfiction)?;
    t.add("Reference & Study Aids", None, Nonfiction)?;
    t.add("Religion & Spirituality", None, Nonfiction)?;
    t.add("Science", None, Nonfiction)?;
    t.add("Self-Help", None, Nonfiction)?;
    t.add("Social Sciences", None, Nonfiction)?;
    t.add("Sports", None, Nonfiction)?;
    t.add("Technology", None, Nonfiction)?;
    t.add("Travel", None, Nonfiction)?;
    t.add("True Crime", None, Nonfiction)?;

    Ok(t)
}
