//! Command-line interface for jetscout.
//!
//! This module provides the CLI structure for the `jetscout` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_field_assignment, ConfigCommand, ExportCommand, FieldAssignment, ListCommand,
    ListScope, OutputFormat, StatusCommand, SubmitCommand, WatchCommand,
};

/// jetscout - Scout robotics matches from the stands
///
/// Fill in a match-scouting form, submit it to a shared store, and review
/// or export everything your team has collected.
#[derive(Debug, Parser)]
#[command(name = "jetscout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Act as this signed-in user (overrides `identity.user`)
    #[arg(short, long, global = true, value_name = "NAME")]
    pub user: Option<String>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fill in and submit one scouting record
    Submit(SubmitCommand),

    /// Print the blank form as JSON
    Defaults,

    /// List submitted records
    List(ListCommand),

    /// Write records to a dated CSV file
    Export(ExportCommand),

    /// Follow new submissions as they arrive
    Watch(WatchCommand),

    /// Show database statistics
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "jetscout");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(
            parse(&["jetscout", "-q", "defaults"]).verbosity(),
            crate::logging::Verbosity::Quiet
        );
        assert_eq!(
            parse(&["jetscout", "defaults"]).verbosity(),
            crate::logging::Verbosity::Normal
        );
        assert_eq!(
            parse(&["jetscout", "-v", "defaults"]).verbosity(),
            crate::logging::Verbosity::Verbose
        );
        assert_eq!(
            parse(&["jetscout", "-vv", "defaults"]).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_parse_submit_with_fields() {
        let cli = parse(&[
            "jetscout",
            "--user",
            "alice",
            "submit",
            "--set",
            "scouter_initials=AB",
            "-s",
            "team_number=1234",
        ]);
        assert_eq!(cli.user.as_deref(), Some("alice"));
        let Command::Submit(cmd) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(cmd.fields.len(), 2);
        assert_eq!(cmd.fields[1].field, "team_number");
        assert_eq!(cmd.fields[1].value, "1234");
        assert!(!cmd.time_auto);
    }

    #[test]
    fn test_parse_submit_rejects_bad_assignment() {
        assert!(Cli::try_parse_from(["jetscout", "submit", "--set", "oops"]).is_err());
    }

    #[test]
    fn test_parse_list_scope() {
        let cli = parse(&["jetscout", "list", "--match", "12", "-o", "json"]);
        let Command::List(cmd) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(cmd.scope(), ListScope::Match(12));
        assert_eq!(cmd.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_list_scopes_conflict() {
        assert!(Cli::try_parse_from(["jetscout", "list", "--mine", "--team", "5"]).is_err());
    }

    #[test]
    fn test_parse_export() {
        let cli = parse(&["jetscout", "export", "--filter", "118", "-o", "/tmp/out"]);
        let Command::Export(cmd) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(cmd.filter.as_deref(), Some("118"));
        assert_eq!(cmd.output_dir, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_parse_watch_and_status() {
        assert!(matches!(
            parse(&["jetscout", "watch", "--rows", "5"]).command,
            Command::Watch(WatchCommand { rows: Some(5), .. })
        ));
        assert!(matches!(
            parse(&["jetscout", "status", "--json"]).command,
            Command::Status(StatusCommand { json: true })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["jetscout", "-c", "/custom/config.toml", "config", "path"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
    }
}
