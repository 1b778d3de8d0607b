//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};

/// Submit command arguments.
#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// Set a form field, e.g. `--set team_number=1234` (repeatable)
    #[arg(short = 's', long = "set", value_name = "FIELD=VALUE", value_parser = parse_field_assignment)]
    pub fields: Vec<FieldAssignment>,

    /// JSON object of field values, applied before any `--set`
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Time the autonomous period interactively before submitting
    #[arg(long)]
    pub time_auto: bool,
}

/// List command arguments.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("scope").args(["mine", "match_number", "team"])))]
pub struct ListCommand {
    /// Only records you submitted
    #[arg(long)]
    pub mine: bool,

    /// Only records for this match
    #[arg(long = "match", value_name = "N")]
    pub match_number: Option<u32>,

    /// Only records for this team
    #[arg(long, value_name = "N")]
    pub team: Option<u32>,

    /// Keep records whose team or match number contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Maximum number of table rows
    #[arg(short, long, default_value = "50")]
    pub limit: usize,
}

/// Which read a `list` performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Every record.
    All,
    /// The caller's own records.
    Mine,
    /// One match.
    Match(u32),
    /// One team.
    Team(u32),
}

impl ListCommand {
    /// The read selected by the scope flags.
    #[must_use]
    pub fn scope(&self) -> ListScope {
        if self.mine {
            ListScope::Mine
        } else if let Some(n) = self.match_number {
            ListScope::Match(n)
        } else if let Some(n) = self.team {
            ListScope::Team(n)
        } else {
            ListScope::All
        }
    }
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Keep records whose team or match number contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Directory to write the CSV file into
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Keep records whose team or match number contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Rows to print per update (overrides `view.watch_rows`)
    #[arg(short, long)]
    pub rows: Option<usize>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
    /// CSV, same columns as `export`
    Csv,
}

/// One `FIELD=VALUE` pair from `--set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    /// Record field name.
    pub field: String,
    /// Raw value text.
    pub value: String,
}

/// Parse `FIELD=VALUE`. The value may itself contain `=`.
///
/// # Errors
///
/// Returns a message if there is no `=` or the field name is empty.
pub fn parse_field_assignment(raw: &str) -> Result<FieldAssignment, String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    Ok(FieldAssignment {
        field: field.to_string(),
        value: value.to_string(),
    })
}
