//! Opswatch: scheduled operational checks.
//!
//! # Usage
//!
//! ```text
//! opswatch role-sync --cx-url <url> --cx-user <u> --cx-password <p>
//!                    --es-url <url> --es-user <u> --es-password <p>
//!                    [--teams <name>...] [--create-roles] [--dry-run]
//! opswatch version-watch [--target sonatype|elasticsearch|nginx]
//!                        [--enable-email] [--enable-slack] [--dry-run]
//! ```
//!
//! Every flag can also come from the environment or a `.env` file in the
//! working directory (parent directories are not searched); explicit flags
//! win. Usage errors exit with status 1, like every other failure.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

use commands::{role_sync::RoleSyncArgs, version_watch::VersionWatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "opswatch",
    version,
    about = "Sync Checkmarx teams into Elasticsearch role mappings and watch vendor releases",
    long_about = None,
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror Checkmarx team membership into Elasticsearch role mappings.
    RoleSync(RoleSyncArgs),

    /// Check a release page for a new version and notify on change.
    VersionWatch(VersionWatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    // Before parsing, so `.env` values feed clap's `env` fallbacks. Variables
    // already in the environment are left alone.
    let dotenv = dotenvy::from_path(".env");

    let (cli, matches) = match parse_cli() {
        Ok(parsed) => parsed,
        Err(err) => {
            let _ = err.print();
            return Ok(match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            });
        }
    };
    opswatch_core::logging::init(cli.verbose);

    match dotenv {
        Ok(()) => tracing::debug!("loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "ignoring unreadable .env file"),
    }

    match cli.command {
        Commands::RoleSync(args) => args.run(),
        Commands::VersionWatch(mut args) => {
            if let Some(sub) = matches.subcommand_matches("version-watch") {
                args.note_command_line(sub);
            }
            args.run()
        }
    }
}

/// Parse argv, keeping the raw matches so commands can tell a flag typed on
/// the command line from one filled in by the environment.
fn parse_cli() -> Result<(Cli, clap::ArgMatches), clap::Error> {
    let matches = Cli::command().try_get_matches()?;
    let cli = Cli::from_arg_matches(&matches)?;
    Ok((cli, matches))
}
