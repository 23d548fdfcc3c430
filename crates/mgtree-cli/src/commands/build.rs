use crate::cli::HierarchyArgs;
use crate::support::{build_hierarchy_or_exit, print_json, settings_or_exit};
use mgtree_kernel::Hierarchy;

pub fn run(args: HierarchyArgs, json_output: bool) {
    let settings = settings_or_exit(&args);
    let hierarchy = build_hierarchy_or_exit(&settings);

    if json_output {
        print_json(&hierarchy.view());
        return;
    }

    println!(
        "mgtree build {} --parent-id {}",
        settings.architecture, settings.parent_id
    );
    println!("  Management groups: {}", hierarchy.len());
    for root in hierarchy.management_groups_at_level(0) {
        print_subtree(&hierarchy, &root, 1);
    }
}

fn print_subtree(hierarchy: &Hierarchy, id: &str, depth: usize) {
    let Some(node) = hierarchy.management_group(id) else {
        return;
    };
    println!(
        "{}{id}: {} definitions, {} sets, {} assignments, {} roles",
        "  ".repeat(depth),
        node.policy_definitions().len(),
        node.policy_set_definitions().len(),
        node.policy_assignments().len(),
        node.role_definitions().len(),
    );
    for child in node.children() {
        print_subtree(hierarchy, child, depth + 1);
    }
}
