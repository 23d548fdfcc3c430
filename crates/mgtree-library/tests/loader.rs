//! Loader integration tests over throwaway library directories.

use mgtree_library::{
    AssetCatalog, CatalogError, LibraryError, MemoryCatalog, load_library, load_library_into,
};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

fn write(dir: &Path, file: &str, value: Value) {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(&path, serde_json::to_vec_pretty(&value).expect("serialize fixture"))
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
}

fn policy_definition(name: &str, version: Option<&str>) -> Value {
    let mut value = json!({
        "name": name,
        "properties": {
            "mode": "All",
            "policyRule": { "if": { "field": "type", "equals": "x" }, "then": { "effect": "audit" } }
        }
    });
    if let Some(version) = version {
        value["properties"]["version"] = json!(version);
    }
    value
}

fn platform_library(dir: &Path) {
    write(dir, "audit-vm.policy_definition.json", policy_definition("audit-vm", None));
    write(
        dir,
        "nested/roles/reader.role_definition.json",
        json!({
            "name": "reader",
            "properties": { "roleName": "Reader", "assignableScopes": ["/"] }
        }),
    );
    write(
        dir,
        "platform.archetype_definition.json",
        json!({
            "name": "platform",
            "policy_definitions": ["audit-vm"],
            "role_definitions": ["reader"]
        }),
    );
    write(
        dir,
        "platform.architecture_definition.json",
        json!({
            "name": "platform",
            "management_groups": [
                { "id": "root", "display_name": "Root", "parent_id": null, "archetypes": ["platform"] },
                { "id": "landing", "display_name": "Landing zones", "parent_id": "root", "archetypes": [] },
                { "id": "corp", "display_name": "Corp", "parent_id": "landing" }
            ]
        }),
    );
    write(dir, "README.md", json!("ignored"));
}

#[test]
fn loads_nested_directories_and_builds_architecture() {
    let dir = tempfile::tempdir().expect("tempdir");
    platform_library(dir.path());

    let catalog = load_library(&[dir.path()]).expect("library loads");
    assert!(catalog.policy_definition("audit-vm", None).expect("lookup").is_some());
    assert!(catalog.role_definition("reader").expect("lookup").is_some());

    let architecture = catalog
        .architecture("platform")
        .expect("lookup")
        .expect("architecture present");
    assert_eq!(architecture.len(), 3);
    assert_eq!(architecture.roots[0].id, "root");
    assert_eq!(architecture.roots[0].children[0].children[0].id, "corp");
}

#[test]
fn overrides_resolve_across_layered_directories() {
    let base = tempfile::tempdir().expect("tempdir");
    let overlay = tempfile::tempdir().expect("tempdir");
    platform_library(base.path());
    write(
        overlay.path(),
        "platform-lite.archetype_override.json",
        json!({
            "name": "platform-lite",
            "base_archetype": "platform",
            "policy_definitions_to_remove": ["audit-vm"],
            "policy_assignments_to_add": ["deploy-diag"]
        }),
    );

    let catalog = load_library(&[base.path(), overlay.path()]).expect("layers load");
    let lite = catalog
        .archetype("platform-lite")
        .expect("lookup")
        .expect("override resolved");
    assert!(lite.policy_definitions.is_empty());
    assert!(lite.role_definitions.contains("reader"));
    assert!(lite.policy_assignments.contains("deploy-diag"));
}

#[test]
fn override_with_unknown_base_fails_on_resolve() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "orphan.archetype_override.json",
        json!({ "name": "orphan", "base_archetype": "nowhere" }),
    );

    let mut catalog = MemoryCatalog::new();
    load_library_into(&mut catalog, dir.path()).expect("override stays pending");
    let err = catalog.resolve_overrides().expect_err("unknown base");
    assert!(matches!(err, CatalogError::UnknownBaseArchetype { ref base, .. } if base == "nowhere"));
}

#[test]
fn duplicate_names_across_directories_name_the_file() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    platform_library(first.path());
    write(second.path(), "again.policy_definition.json", policy_definition("audit-vm", None));

    let err = load_library(&[first.path(), second.path()]).expect_err("duplicate definition");
    match err {
        LibraryError::Catalog { path, source } => {
            assert!(path.ends_with("again.policy_definition.json"));
            assert!(matches!(source, CatalogError::Duplicate { ref name, .. } if name == "audit-vm"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn versions_of_one_definition_coexist() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "audit.v1.policy_definition.json", policy_definition("audit", Some("1.0.0")));
    write(dir.path(), "audit.v2.policy_definition.json", policy_definition("audit", Some("2.1.0")));

    let catalog = load_library(&[dir.path()]).expect("library loads");
    let latest = catalog
        .policy_definition("audit", None)
        .expect("lookup")
        .expect("present");
    assert_eq!(latest.properties.version.as_deref(), Some("2.1.0"));
    let pinned = catalog
        .policy_definition("audit", Some("1.0.0"))
        .expect("lookup")
        .expect("present");
    assert_eq!(pinned.properties.version.as_deref(), Some("1.0.0"));
}

#[test]
fn malformed_file_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.role_definition.json");
    fs::write(&path, "{ not json").expect("write");

    let err = load_library(&[dir.path()]).expect_err("parse failure");
    assert!(matches!(err, LibraryError::Parse { path: ref p, .. } if p == &path));
}

#[test]
fn default_values_fold_into_mappings() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "alz.policy_default_values.json",
        json!({
            "defaults": [{
                "default_name": "log_analytics_workspace_id",
                "description": "Central workspace",
                "policy_assignments": [
                    { "policy_assignment_name": "deploy-diag", "parameter_names": ["logAnalytics"] },
                    { "policy_assignment_name": "deploy-diag", "parameter_names": ["workspaceId"] },
                    { "policy_assignment_name": "deploy-vm-monitoring", "parameter_names": ["logAnalytics_1"] }
                ]
            }]
        }),
    );

    let catalog = load_library(&[dir.path()]).expect("library loads");
    let mapping = catalog
        .default_value_mapping("log_analytics_workspace_id")
        .expect("lookup")
        .expect("mapping present");
    assert_eq!(mapping.assignments.len(), 2);
    assert_eq!(mapping.assignments["deploy-diag"].len(), 2);
}

#[test]
fn missing_directory_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_library(&[dir.path().join("absent")]).expect_err("missing dir");
    assert!(matches!(err, LibraryError::Io { .. }));
}
