use crate::cli::HierarchyArgs;
use crate::config::{self, Settings};
use mgtree_kernel::{CancelToken, Hierarchy, HierarchyOptions};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

pub fn exit_with(message: impl Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn settings_or_exit(args: &HierarchyArgs) -> Settings {
    config::resolve(args).unwrap_or_else(|e| exit_with(e))
}

/// Load the libraries, materialize the architecture and apply defaults.
pub fn build_hierarchy_or_exit(settings: &Settings) -> Hierarchy {
    let catalog = mgtree_library::load_library(settings.libraries.as_slice())
        .unwrap_or_else(|e| exit_with(e));
    let hierarchy = Hierarchy::with_options(
        Arc::new(catalog),
        HierarchyOptions {
            unique_role_definitions: settings.unique_role_definitions,
        },
    );

    let cancel = CancelToken::new();
    hierarchy
        .from_architecture(
            &settings.architecture,
            &settings.parent_id,
            &settings.location,
            &cancel,
        )
        .unwrap_or_else(|e| exit_with(e));

    for (name, value) in &settings.defaults {
        let written = hierarchy
            .add_default_policy_assignment_value(name, value.clone(), &cancel)
            .unwrap_or_else(|e| exit_with(e));
        tracing::info!(default = %name, parameters = written, "applied default value");
    }
    hierarchy
}

pub fn hierarchy_or_exit(args: &HierarchyArgs) -> Hierarchy {
    build_hierarchy_or_exit(&settings_or_exit(args))
}

pub fn print_json<T: Serialize>(value: &T) {
    let text = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| exit_with(format!("json serialization: {e}")));
    println!("{text}");
}
