use crate::cli::HierarchyArgs;
use crate::support::{exit_with, hierarchy_or_exit};
use mgtree_kernel::export_hierarchy;

pub fn run(args: HierarchyArgs, out: String) {
    let hierarchy = hierarchy_or_exit(&args);
    let written = export_hierarchy(&hierarchy, &out).unwrap_or_else(|e| exit_with(e));
    println!(
        "Exported {} files for {} management groups to {out}",
        written.len(),
        hierarchy.len()
    );
}
