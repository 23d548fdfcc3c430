//! Filesystem export: one JSON file per asset per management group.
//!
//! Layout: `{out}/{mg}/{asset}.{suffix}` where suffix is one of
//! `policy_definition.json`, `policy_set_definition.json`,
//! `policy_assignment.json` or `role_definition.json`. The file body is
//! the asset as it appears in the node's serialization view.

use crate::error::HierarchyError;
use crate::hierarchy::Hierarchy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const POLICY_DEFINITION_EXPORT_SUFFIX: &str = "policy_definition.json";
pub const POLICY_SET_DEFINITION_EXPORT_SUFFIX: &str = "policy_set_definition.json";
pub const POLICY_ASSIGNMENT_EXPORT_SUFFIX: &str = "policy_assignment.json";
pub const ROLE_DEFINITION_EXPORT_SUFFIX: &str = "role_definition.json";

/// Write every node's assets under `out_dir` and return the written paths
/// in write order.
pub fn export_hierarchy(
    hierarchy: &Hierarchy,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, HierarchyError> {
    let out_dir = out_dir.as_ref();
    let view = hierarchy.view();
    let mut written = Vec::new();

    for (mg, node) in &view.management_groups {
        let dir = out_dir.join(mg);
        fs::create_dir_all(&dir).map_err(|e| HierarchyError::Export {
            path: dir.clone(),
            message: e.to_string(),
        })?;
        write_assets(&dir, &node.policy_definitions, POLICY_DEFINITION_EXPORT_SUFFIX, &mut written)?;
        write_assets(
            &dir,
            &node.policy_set_definitions,
            POLICY_SET_DEFINITION_EXPORT_SUFFIX,
            &mut written,
        )?;
        write_assets(&dir, &node.policy_assignments, POLICY_ASSIGNMENT_EXPORT_SUFFIX, &mut written)?;
        write_assets(&dir, &node.role_definitions, ROLE_DEFINITION_EXPORT_SUFFIX, &mut written)?;
    }

    tracing::info!(
        out_dir = %out_dir.display(),
        management_groups = view.management_groups.len(),
        files = written.len(),
        "exported hierarchy"
    );
    Ok(written)
}

fn write_assets<T: Serialize>(
    dir: &Path,
    assets: &BTreeMap<String, T>,
    suffix: &str,
    written: &mut Vec<PathBuf>,
) -> Result<(), HierarchyError> {
    for (name, asset) in assets {
        let path = dir.join(format!("{name}.{suffix}"));
        let mut bytes = serde_json::to_vec_pretty(asset).map_err(|e| HierarchyError::Export {
            path: path.clone(),
            message: e.to_string(),
        })?;
        bytes.push(b'\n');
        fs::write(&path, bytes).map_err(|e| HierarchyError::Export {
            path: path.clone(),
            message: e.to_string(),
        })?;
        written.push(path);
    }
    Ok(())
}
