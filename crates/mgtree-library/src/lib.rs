//! # mgtree-library
//!
//! Asset library layer for governance hierarchies.
//!
//! This crate provides:
//! - typed policy definitions, policy set definitions, policy assignments
//!   and role definitions (the assets)
//! - archetypes, archetype overrides, architectures and default-value
//!   mappings (the building blocks that name assets)
//! - the fixed resource identifier scheme and a resource id parser
//! - the `AssetCatalog` lookup trait with an in-memory implementation and
//!   a directory loader
//!
//! It intentionally does not build hierarchies. That lives in
//! `mgtree-kernel`.
//!
//! ## Data model
//!
//! ```text
//! library directories (one JSON file per asset / building block)
//!     ↓  load_library
//! MemoryCatalog (deterministic, name-keyed)
//!     ↓  AssetCatalog lookups (owned copies)
//! mgtree-kernel Hierarchy
//! ```

pub mod archetype;
pub mod architecture;
pub mod catalog;
pub mod default_values;
pub mod loader;
pub mod policy;
pub mod resource_id;
pub mod role;

pub use archetype::{Archetype, ArchetypeOverride};
pub use architecture::{
    Architecture, ArchitectureDefinition, ArchitectureError, ArchitectureManagementGroup,
    ArchitectureNode,
};
pub use catalog::{AssetCatalog, CatalogError, MemoryCatalog};
pub use default_values::{
    DefaultValueEntry, DefaultValueFile, DefaultValueMapping, DefaultValueTarget,
};
pub use loader::{LibraryError, load_library, load_library_into};
pub use policy::{
    AssignmentIdentity, EnforcementMode, IdentityType, NonComplianceMessage, ParameterDefinition,
    ParameterMetadata, ParameterValue, PolicyAssignment, PolicyAssignmentProperties,
    PolicyDefinition, PolicyDefinitionProperties, PolicyDefinitionReference, PolicySetDefinition,
    PolicySetDefinitionProperties, ReferenceError, ReferencedDefinition,
};
pub use resource_id::{ResourceId, ResourceIdError};
pub use role::{Permission, RoleDefinition, RoleDefinitionProperties};
