//! Library directories: one JSON file per asset or building block.
//!
//! Files are recognised by suffix and loaded in sorted path order, so the
//! resulting catalog is independent of directory iteration order. Several
//! directories may be layered; names must stay unique across all of them.

use crate::architecture::{Architecture, ArchitectureDefinition};
use crate::catalog::{CatalogError, MemoryCatalog};
use crate::default_values::DefaultValueFile;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

pub const POLICY_DEFINITION_SUFFIX: &str = ".policy_definition.json";
pub const POLICY_SET_DEFINITION_SUFFIX: &str = ".policy_set_definition.json";
pub const POLICY_ASSIGNMENT_SUFFIX: &str = ".policy_assignment.json";
pub const ROLE_DEFINITION_SUFFIX: &str = ".role_definition.json";
pub const ARCHETYPE_SUFFIX: &str = ".archetype_definition.json";
pub const ARCHETYPE_OVERRIDE_SUFFIX: &str = ".archetype_override.json";
pub const ARCHITECTURE_SUFFIX: &str = ".architecture_definition.json";
pub const DEFAULT_VALUES_SUFFIX: &str = ".policy_default_values.json";

/// Errors raised while loading library directories.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("io error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },

    #[error(transparent)]
    Resolve(#[from] CatalogError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    PolicyDefinition,
    PolicySetDefinition,
    PolicyAssignment,
    RoleDefinition,
    Archetype,
    ArchetypeOverride,
    Architecture,
    DefaultValues,
}

impl FileKind {
    fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        [
            (POLICY_DEFINITION_SUFFIX, FileKind::PolicyDefinition),
            (POLICY_SET_DEFINITION_SUFFIX, FileKind::PolicySetDefinition),
            (POLICY_ASSIGNMENT_SUFFIX, FileKind::PolicyAssignment),
            (ROLE_DEFINITION_SUFFIX, FileKind::RoleDefinition),
            (ARCHETYPE_SUFFIX, FileKind::Archetype),
            (ARCHETYPE_OVERRIDE_SUFFIX, FileKind::ArchetypeOverride),
            (ARCHITECTURE_SUFFIX, FileKind::Architecture),
            (DEFAULT_VALUES_SUFFIX, FileKind::DefaultValues),
        ]
        .into_iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, kind)| kind)
    }
}

/// Load one or more library directories into a fresh catalog.
pub fn load_library<P: AsRef<Path>>(dirs: &[P]) -> Result<MemoryCatalog, LibraryError> {
    let mut catalog = MemoryCatalog::new();
    for dir in dirs {
        load_library_into(&mut catalog, dir.as_ref())?;
    }
    catalog.resolve_overrides()?;
    Ok(catalog)
}

/// Load one directory into an existing catalog.
///
/// Archetype overrides stay pending until `MemoryCatalog::resolve_overrides`.
pub fn load_library_into(catalog: &mut MemoryCatalog, dir: &Path) -> Result<(), LibraryError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut loaded = 0usize;
    for path in files {
        let Some(kind) = FileKind::from_path(&path) else {
            continue;
        };
        load_file(catalog, &path, kind)?;
        loaded += 1;
    }
    tracing::debug!(dir = %dir.display(), files = loaded, "loaded library directory");
    Ok(())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), LibraryError> {
    let entries = fs::read_dir(dir).map_err(|e| LibraryError::Io {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| LibraryError::Io {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LibraryError> {
    let bytes = fs::read(path).map_err(|e| LibraryError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| LibraryError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn load_file(catalog: &mut MemoryCatalog, path: &Path, kind: FileKind) -> Result<(), LibraryError> {
    let at = |source: CatalogError| LibraryError::Catalog {
        path: path.to_path_buf(),
        source,
    };
    match kind {
        FileKind::PolicyDefinition => catalog.add_policy_definition(read_json(path)?).map_err(at),
        FileKind::PolicySetDefinition => {
            catalog.add_policy_set_definition(read_json(path)?).map_err(at)
        }
        FileKind::PolicyAssignment => catalog.add_policy_assignment(read_json(path)?).map_err(at),
        FileKind::RoleDefinition => catalog.add_role_definition(read_json(path)?).map_err(at),
        FileKind::Archetype => catalog.add_archetype(read_json(path)?).map_err(at),
        FileKind::ArchetypeOverride => catalog.add_archetype_override(read_json(path)?).map_err(at),
        FileKind::Architecture => {
            let definition: ArchitectureDefinition = read_json(path)?;
            let architecture =
                Architecture::from_definition(&definition).map_err(|e| at(e.into()))?;
            catalog.add_architecture(architecture).map_err(at)
        }
        FileKind::DefaultValues => {
            let file: DefaultValueFile = read_json(path)?;
            for mapping in file.mappings() {
                catalog.add_default_value_mapping(mapping).map_err(at)?;
            }
            Ok(())
        }
    }
}
