use crate::cli::HierarchyArgs;
use crate::support::{exit_with, hierarchy_or_exit, print_json};

pub fn run(id: String, args: HierarchyArgs) {
    let hierarchy = hierarchy_or_exit(&args);
    match hierarchy.management_group_view(&id) {
        Some(view) => print_json(&view),
        None => exit_with(format!("management group `{id}` not found")),
    }
}
