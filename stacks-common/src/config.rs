//! Site policy and configuration file resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do with titles that have no available copies.
///
/// Under `Hide`, browse queries that would accept any licensed title are
/// narrowed to titles with at least one copy available right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HoldPolicy {
    /// Show titles a patron would have to place a hold on
    #[default]
    Show,
    /// Only show titles that can be checked out immediately
    Hide,
}

/// Site-wide browse policy, passed explicitly into the decision layer.
///
/// Loaded from the `[policy]` table of the site config file; every field
/// has a compiled default so an absent table yields a working policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowsePolicy {
    /// Availability treatment for titles with no free copies
    pub hold_policy: HoldPolicy,
    /// Minimum quality score for the FEATURED collection
    pub minimum_featured_quality: f64,
    /// Data sources whose titles are dropped from juvenile audiences.
    /// Large public-domain sources misclassify older children's books
    /// badly enough that they drown out curated juvenile material.
    pub juvenile_source_exclusions: Vec<String>,
}

impl Default for BrowsePolicy {
    fn default() -> Self {
        BrowsePolicy {
            hold_policy: HoldPolicy::Show,
            minimum_featured_quality: 0.65,
            juvenile_source_exclusions: vec!["Gutenberg".to_string()],
        }
    }
}

/// Config file resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config directory (~/.config/stacks/config.toml, then /etc/stacks/config.toml on Linux)
pub fn resolve_config_file(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: Platform config directory
    default_config_file()
}

/// Get default configuration file path for the platform
fn default_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/stacks/config.toml first, then /etc/stacks/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("stacks").join("config.toml"));
        let system_config = PathBuf::from("/etc/stacks/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("stacks").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Database path resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `database` key of the config file, when one was resolved
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: config file `database` key
    if let Some(config_path) = config_file {
        if let Ok(toml_content) = std::fs::read_to_string(config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(database) = config.get("database").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(database));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_database_path())
}

/// Get OS-dependent default database path
fn default_database_path() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("stacks").join("catalog.db"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/stacks/catalog.db"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("stacks").join("catalog.db"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/stacks/catalog.db"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("stacks").join("catalog.db"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\stacks\\catalog.db"))
    } else {
        PathBuf::from("./stacks_data/catalog.db")
    }
}

/// Load the `[policy]` table from a config file. Missing file or missing
/// table both yield the default policy.
pub fn load_policy(config_file: Option<&Path>) -> Result<BrowsePolicy> {
    let Some(path) = config_file else {
        return Ok(BrowsePolicy::default());
    };
    let toml_content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Ok(BrowsePolicy::default()),
    };
    let value: toml::Value = toml::from_str(&toml_content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    match value.get("policy") {
        Some(policy) => policy
            .clone()
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [policy] table: {}", e))),
        None => Ok(BrowsePolicy::default()),
    }
}
