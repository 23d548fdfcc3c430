//! mgtree CLI: the `mgtree` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Build { hierarchy, json } => commands::build::run(hierarchy, json),

        Commands::Show { id, hierarchy } => commands::show::run(id, hierarchy),

        Commands::RoleAssignments {
            hierarchy,
            warn_on_derivation_errors,
            json,
        } => commands::role_assignments::run(hierarchy, warn_on_derivation_errors, json),

        Commands::Export { hierarchy, out } => commands::export::run(hierarchy, out),
    }
}

/// Logs go to stderr so JSON output on stdout stays parseable.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|e| support::exit_with(format!("invalid --log-level `{level}`: {e}")));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
