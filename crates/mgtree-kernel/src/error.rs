//! Error types for hierarchy operations.

use mgtree_library::{CatalogError, ReferenceError};
use std::fmt;
use std::path::PathBuf;

/// The four asset kinds a management group carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    PolicyDefinition,
    PolicySetDefinition,
    PolicyAssignment,
    RoleDefinition,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssetKind::PolicyDefinition => "policy definition",
            AssetKind::PolicySetDefinition => "policy set definition",
            AssetKind::PolicyAssignment => "policy assignment",
            AssetKind::RoleDefinition => "role definition",
        })
    }
}

/// Errors raised while building or querying a hierarchy.
///
/// Every variant names enough context (management group, asset, parameter)
/// to locate the offending library content.
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    // ── Structural ──
    #[error("management group `{0}` already exists")]
    DuplicateManagementGroup(String),

    #[error("management group `{id}`: external parent `{parent_id}` is a management group in this hierarchy")]
    ExternalParentIsManagementGroup { id: String, parent_id: String },

    #[error("management group `{id}`: `{existing}` already has an external parent; only one root is allowed")]
    MultipleRoots { id: String, existing: String },

    #[error("management group `{id}`: parent `{parent_id}` not found")]
    ParentNotFound { id: String, parent_id: String },

    // ── Asset resolution ──
    #[error("management group `{management_group}`: archetype `{archetype}` not found")]
    ArchetypeNotFound {
        management_group: String,
        archetype: String,
    },

    #[error("architecture `{0}` not found")]
    ArchitectureNotFound(String),

    #[error("management group `{management_group}`: {kind} `{name}`{} not found", archetype_suffix(.archetype))]
    AssetNotFound {
        management_group: String,
        kind: AssetKind,
        name: String,
        archetype: Option<String>,
    },

    #[error(
        "management group `{management_group}`: policy assignment `{assignment}` uses set definition `{set_definition}` whose reference `{reference}` passes parameter `{parameter}` that policy definition `{definition}` does not declare"
    )]
    ParameterMismatch {
        management_group: String,
        assignment: String,
        set_definition: String,
        reference: String,
        parameter: String,
        definition: String,
    },

    #[error(
        "management group `{management_group}`: policy assignment `{assignment}` sets parameter `{parameter}` that `{definition}` does not declare"
    )]
    UnknownAssignmentParameter {
        management_group: String,
        assignment: String,
        parameter: String,
        definition: String,
    },

    #[error("default value `{0}` not found")]
    DefaultValueNotFound(String),

    #[error("management group `{0}` not found")]
    ManagementGroupNotFound(String),

    #[error("management group `{management_group}`: policy assignment `{assignment}` not found")]
    PolicyAssignmentNotFound {
        management_group: String,
        assignment: String,
    },

    // ── Rewrite topology ──
    #[error(
        "management group `{management_group}`: {kind} `{asset}` references `{definition}` (via `{reference}`), which is deployed only at [{}], none of which is this management group or an ancestor",
        .owners.join(", ")
    )]
    UnreachableDefinition {
        management_group: String,
        kind: AssetKind,
        asset: String,
        reference: String,
        definition: String,
        owners: Vec<String>,
    },

    #[error("management group `{management_group}`: {kind} `{asset}`: {source}")]
    InvalidReference {
        management_group: String,
        kind: AssetKind,
        asset: String,
        #[source]
        source: ReferenceError,
    },

    // ── Role assignment derivation (hard) ──
    #[error(
        "management group `{management_group}`: policy assignment `{assignment}` has an identity but `{definition}` requires no role definitions"
    )]
    NoRoleDefinitions {
        management_group: String,
        assignment: String,
        definition: String,
    },

    #[error(
        "management group `{management_group}`: policy assignment `{assignment}` has no value for required parameter `{parameter}`{}",
        reference_suffix(.reference)
    )]
    UnresolvedPermissionParameter {
        management_group: String,
        assignment: String,
        parameter: String,
        reference: Option<String>,
    },

    // ── Operational ──
    #[error("architecture `{architecture}`: failed to add management group `{management_group}`: {source}")]
    Architecture {
        architecture: String,
        management_group: String,
        #[source]
        source: Box<HierarchyError>,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("export failed at {path}: {message}")]
    Export { path: PathBuf, message: String },
}

fn archetype_suffix(archetype: &Option<String>) -> String {
    match archetype {
        Some(archetype) => format!(" (named by archetype `{archetype}`)"),
        None => String::new(),
    }
}

fn reference_suffix(reference: &Option<String>) -> String {
    match reference {
        Some(reference) => format!(" of set member `{reference}`"),
        None => String::new(),
    }
}

/// Which class of failure an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Tree shape violations: duplicate nodes, missing parents, many roots.
    Structural,
    /// A named asset or building block is absent or inconsistent.
    AssetResolution,
    /// A reference exists but is not reachable from where it is used.
    RewriteTopology,
    /// Role-assignment derivation could not be trusted.
    RoleAssignmentDerivation,
    /// Catalog, cancellation and export failures.
    Operational,
}

impl HierarchyError {
    pub fn class(&self) -> ErrorClass {
        match self {
            HierarchyError::DuplicateManagementGroup(_)
            | HierarchyError::ExternalParentIsManagementGroup { .. }
            | HierarchyError::MultipleRoots { .. }
            | HierarchyError::ParentNotFound { .. } => ErrorClass::Structural,
            HierarchyError::ArchetypeNotFound { .. }
            | HierarchyError::ArchitectureNotFound(_)
            | HierarchyError::AssetNotFound { .. }
            | HierarchyError::ParameterMismatch { .. }
            | HierarchyError::UnknownAssignmentParameter { .. }
            | HierarchyError::DefaultValueNotFound(_)
            | HierarchyError::ManagementGroupNotFound(_)
            | HierarchyError::PolicyAssignmentNotFound { .. } => ErrorClass::AssetResolution,
            HierarchyError::UnreachableDefinition { .. }
            | HierarchyError::InvalidReference { .. } => ErrorClass::RewriteTopology,
            HierarchyError::NoRoleDefinitions { .. }
            | HierarchyError::UnresolvedPermissionParameter { .. } => {
                ErrorClass::RoleAssignmentDerivation
            }
            HierarchyError::Architecture { source, .. } => source.class(),
            HierarchyError::Catalog(_)
            | HierarchyError::Cancelled
            | HierarchyError::Export { .. } => ErrorClass::Operational,
        }
    }
}
