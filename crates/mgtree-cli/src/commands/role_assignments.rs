use crate::cli::HierarchyArgs;
use crate::support::{exit_with, hierarchy_or_exit, print_json};
use mgtree_kernel::CancelToken;

pub fn run(args: HierarchyArgs, warn_on_derivation_errors: bool, json_output: bool) {
    let hierarchy = hierarchy_or_exit(&args);
    let report = hierarchy
        .policy_role_assignments(&CancelToken::new())
        .unwrap_or_else(|e| exit_with(e));

    if !report.is_complete() && !warn_on_derivation_errors {
        for error in &report.errors {
            eprintln!("error: {error}");
        }
        exit_with(format!(
            "{} role assignment derivation error(s); pass --warn-on-derivation-errors to continue",
            report.errors.len()
        ));
    }

    if json_output {
        print_json(&report);
        return;
    }

    println!("Role assignments: {}", report.assignments.len());
    for assignment in &report.assignments {
        println!(
            "  {} {} -> {} at {}",
            assignment.management_group_id,
            assignment.assignment_name,
            assignment.role_definition_id,
            assignment.scope
        );
    }
    for error in &report.errors {
        eprintln!("warning: {error}");
    }
}
