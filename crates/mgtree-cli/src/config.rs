//! `mgtree.toml` plus command-line overrides.
//!
//! ```toml
//! [library]
//! paths = ["lib/platform", "lib/custom"]
//!
//! [hierarchy]
//! architecture = "alz"
//! parent_id = "tenant-root"
//! location = "westeurope"
//! unique_role_definitions = true
//!
//! [defaults]
//! log_analytics_workspace_id = "/subscriptions/.../workspaces/law"
//! ```
//!
//! Library paths in the file are relative to the file's directory.

use crate::cli::HierarchyArgs;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "mgtree.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("missing `{key}`: set it in mgtree.toml or pass --{flag}")]
    Missing { key: &'static str, flag: &'static str },

    #[error("invalid --default `{0}`: expected name=value")]
    InvalidDefault(String),

    #[error("default `{name}`: {message}")]
    DefaultValue { name: String, message: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default)]
    pub hierarchy: HierarchySection,
    #[serde(default)]
    pub defaults: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibrarySection {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HierarchySection {
    pub architecture: Option<String>,
    pub parent_id: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub unique_role_definitions: bool,
}

/// Fully resolved inputs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub libraries: Vec<PathBuf>,
    pub architecture: String,
    pub parent_id: String,
    pub location: String,
    pub unique_role_definitions: bool,
    pub defaults: BTreeMap<String, Value>,
}

impl ConfigFile {
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut file = Self::parse(path, &text)?;
        if let Some(base) = path.parent() {
            for library in &mut file.library.paths {
                if library.is_relative() {
                    *library = base.join(&*library);
                }
            }
        }
        Ok(file)
    }
}

/// Read the config file named by `--config`, or `mgtree.toml` when it
/// exists, and merge the flags over it.
pub fn resolve(args: &HierarchyArgs) -> Result<Settings, ConfigError> {
    let file = match &args.config {
        Some(path) => ConfigFile::load(Path::new(path))?,
        None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
            ConfigFile::load(Path::new(DEFAULT_CONFIG_PATH))?
        }
        None => ConfigFile::default(),
    };
    merge(file, args)
}

pub fn merge(file: ConfigFile, args: &HierarchyArgs) -> Result<Settings, ConfigError> {
    let libraries = if args.libraries.is_empty() {
        file.library.paths
    } else {
        args.libraries.iter().map(PathBuf::from).collect()
    };
    if libraries.is_empty() {
        return Err(ConfigError::Missing {
            key: "library.paths",
            flag: "library",
        });
    }

    let hierarchy = file.hierarchy;
    let architecture = args
        .architecture
        .clone()
        .or(hierarchy.architecture)
        .ok_or(ConfigError::Missing {
            key: "hierarchy.architecture",
            flag: "architecture",
        })?;
    let parent_id = args
        .parent_id
        .clone()
        .or(hierarchy.parent_id)
        .ok_or(ConfigError::Missing {
            key: "hierarchy.parent_id",
            flag: "parent-id",
        })?;
    let location = args
        .location
        .clone()
        .or(hierarchy.location)
        .ok_or(ConfigError::Missing {
            key: "hierarchy.location",
            flag: "location",
        })?;

    let mut defaults = BTreeMap::new();
    for (name, value) in file.defaults {
        let value = serde_json::to_value(&value).map_err(|e| ConfigError::DefaultValue {
            name: name.clone(),
            message: e.to_string(),
        })?;
        defaults.insert(name, value);
    }
    for raw in &args.defaults {
        let (name, value) = parse_default(raw)?;
        defaults.insert(name, value);
    }

    Ok(Settings {
        libraries,
        architecture,
        parent_id,
        location,
        unique_role_definitions: args.unique_role_definitions || hierarchy.unique_role_definitions,
        defaults,
    })
}

/// `name=value`; the value is JSON when it parses as JSON, a string otherwise.
fn parse_default(raw: &str) -> Result<(String, Value), ConfigError> {
    let (name, value) = raw
        .split_once('=')
        .filter(|(name, _)| !name.trim().is_empty())
        .ok_or_else(|| ConfigError::InvalidDefault(raw.to_string()))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}
