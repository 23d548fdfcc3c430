//! # mgtree kernel
//!
//! Builds a deployable governance hierarchy: a tree of management groups,
//! each holding its own copies of the policy definitions, policy set
//! definitions, policy assignments and role definitions its archetypes
//! name, with every identifier and cross-reference scoped to the node that
//! deploys it.
//!
//! Assets come from an `AssetCatalog` (see `mgtree-library`). The kernel
//! never reads files.
//!
//! ## Architecture
//!
//! ```text
//! AssetCatalog          ← named assets, archetypes, architectures, defaults
//!     │
//! Hierarchy             ← id-keyed node registry behind one RwLock
//!     │  add_management_group / from_architecture
//! ManagementGroup       ← asset copies + update() rewrite pass
//!     │
//! policy_role_assignments   ← identity-bearing assignments → RBAC needs
//! add_default_policy_assignment_value / modify_policy_assignment
//!     │
//! view / export_hierarchy   ← JSON projection, one file per asset
//! ```
//!
//! References to custom definitions resolve to the nearest node on the
//! referencing node's parent chain (self first) that deploys a copy.
//! Names not deployed anywhere in the hierarchy are treated as built-ins
//! and left untouched.

pub mod cancel;
mod defaults;
pub mod error;
pub mod export;
pub mod expression;
pub mod hierarchy;
pub mod management_group;
pub mod modify;
pub mod role_assignment;
pub mod view;

pub use cancel::CancelToken;
pub use error::{AssetKind, ErrorClass, HierarchyError};
pub use export::export_hierarchy;
pub use expression::{Environment, ExpressionError};
pub use hierarchy::{AddManagementGroupRequest, Hierarchy, HierarchyOptions};
pub use management_group::{ManagementGroup, OwnerIndex, unique_role_name};
pub use modify::PolicyAssignmentModification;
pub use role_assignment::{PolicyRoleAssignment, RoleAssignmentDerivationError, RoleAssignmentReport};
pub use view::{HierarchyView, ManagementGroupView};
