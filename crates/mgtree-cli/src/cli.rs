use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mgtree",
    about = "mgtree: materialize management group hierarchies from archetype libraries",
    version
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. `info`, `mgtree_kernel=debug`)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every subcommand. Flags override `mgtree.toml`.
#[derive(Args, Debug, Clone, Default)]
pub struct HierarchyArgs {
    /// Config file (defaults to ./mgtree.toml when present)
    #[arg(long)]
    pub config: Option<String>,

    /// Library directory (repeatable; later directories may use earlier ones)
    #[arg(long = "library")]
    pub libraries: Vec<String>,

    /// Architecture to materialize
    #[arg(long)]
    pub architecture: Option<String>,

    /// External parent of the architecture's root
    #[arg(long)]
    pub parent_id: Option<String>,

    /// Location stamped on every policy assignment
    #[arg(long)]
    pub location: Option<String>,

    /// Default value as `name=value` (repeatable; value parsed as JSON when possible)
    #[arg(long = "default")]
    pub defaults: Vec<String>,

    /// Give every role definition a per-management-group unique name
    #[arg(long)]
    pub unique_role_definitions: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Materialize the hierarchy and print a summary
    Build {
        #[command(flatten)]
        hierarchy: HierarchyArgs,

        /// Print the full hierarchy view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one management group's view as JSON
    Show {
        /// Management group id
        id: String,

        #[command(flatten)]
        hierarchy: HierarchyArgs,
    },

    /// Derive the role assignments policy assignment identities need
    RoleAssignments {
        #[command(flatten)]
        hierarchy: HierarchyArgs,

        /// Print derivation errors as warnings and exit 0
        #[arg(long)]
        warn_on_derivation_errors: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write one JSON file per asset per management group
    Export {
        #[command(flatten)]
        hierarchy: HierarchyArgs,

        /// Output directory
        #[arg(long)]
        out: String,
    },
}
