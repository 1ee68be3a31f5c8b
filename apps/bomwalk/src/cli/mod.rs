//! # bomwalk CLI Module
//!
//! This module implements the CLI interface for bomwalk.
//!
//! ## Available Commands
//!
//! - `init` - Create an empty catalog database
//! - `import` - Load a JSON catalog snapshot
//! - `export` - Write the workspace as a JSON catalog snapshot
//! - `status` - Show catalog counts
//! - `resolve` - Resolve a product structure under a policy
//! - `baseline` - Capture, list and show baselines
//! - `effectivity` - Attach, list and remove effectivities

mod commands;

use crate::config::Settings;
use bomwalk_core::BomError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// bomwalk - product structure resolver
///
/// Walks a versioned bill of materials under a configuration policy and
/// reports every ambiguity it meets on the way.
#[derive(Parser, Debug)]
#[command(name = "bomwalk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the catalog database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to the TOML configuration file (default: ./bomwalk.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace holding the parts
    #[arg(short = 'w', long, global = true)]
    pub workspace: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty catalog database
    Init {
        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Import a catalog snapshot (JSON)
    Import {
        /// Path to the snapshot file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Export the workspace as a catalog snapshot (JSON)
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show catalog status
    Status,

    /// Resolve a product structure
    Resolve(ResolveArgs),

    /// Manage baselines
    Baseline {
        #[command(subcommand)]
        action: BaselineCommand,
    },

    /// Manage effectivities
    Effectivity {
        #[command(subcommand)]
        action: EffectivityCommand,
    },
}

/// Configuration policy used by `resolve`.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Last checked-in iteration of the last revision
    #[default]
    Latest,
    /// Last iteration of the last released revision
    Released,
    /// Revisions and substitutes whose effectivities match --date/--serial/--lot
    Effective,
    /// The configuration frozen in --baseline
    Baseline,
}

/// Arguments of `resolve`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Root part number
    #[arg(short, long, conflicts_with = "ci")]
    pub part: Option<String>,

    /// Configuration item id; its design item is the root
    #[arg(long)]
    pub ci: Option<String>,

    /// Configuration policy
    #[arg(long, value_enum, default_value_t = Policy::Latest)]
    pub policy: Policy,

    /// Effective date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub date: Option<String>,

    /// Effective serial number
    #[arg(long)]
    pub serial: Option<String>,

    /// Effective lot id
    #[arg(long)]
    pub lot: Option<String>,

    /// Baseline name (with --policy baseline)
    #[arg(long)]
    pub baseline: Option<String>,

    /// Resolve only below this path (e.g. -1-u12)
    #[arg(long, allow_hyphen_values = true)]
    pub path: Option<String>,

    /// Maximum depth of the walk
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Also take every substitute link (latest and released policies)
    #[arg(long)]
    pub diverge: bool,
}

/// `baseline` subcommands.
#[derive(Subcommand, Debug)]
pub enum BaselineCommand {
    /// Capture a baseline of a configuration item
    Create {
        /// Configuration item id
        #[arg(long)]
        ci: String,

        /// Baseline name, unique per configuration item
        #[arg(short, long)]
        name: String,

        /// Iterations to freeze: latest or released
        #[arg(short = 't', long, default_value = "latest")]
        kind: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Path ending with a substitute link to take (repeatable)
        #[arg(long = "substitute", allow_hyphen_values = true)]
        substitutes: Vec<String>,

        /// Path ending with an optional usage link to keep (repeatable)
        #[arg(long = "optional", allow_hyphen_values = true)]
        optionals: Vec<String>,
    },

    /// List the baselines of a configuration item
    List {
        #[arg(long)]
        ci: String,
    },

    /// Show one baseline
    Show {
        #[arg(long)]
        ci: String,

        #[arg(short, long)]
        name: String,
    },
}

/// `effectivity` subcommands.
#[derive(Subcommand, Debug)]
pub enum EffectivityCommand {
    /// Attach a serial-number effectivity to a revision
    AddSerial {
        #[command(flatten)]
        target: RevisionArgs,
        #[command(flatten)]
        label: LabelArgs,
        /// Configuration item id (mandatory)
        #[arg(long)]
        ci: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
    },

    /// Attach a date effectivity to a revision
    AddDate {
        #[command(flatten)]
        target: RevisionArgs,
        #[command(flatten)]
        label: LabelArgs,
        /// Configuration item id (optional)
        #[arg(long)]
        ci: Option<String>,
        /// YYYY-MM-DD or RFC 3339
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
    },

    /// Attach a lot effectivity to a revision
    AddLot {
        #[command(flatten)]
        target: RevisionArgs,
        #[command(flatten)]
        label: LabelArgs,
        /// Configuration item id (mandatory)
        #[arg(long)]
        ci: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
    },

    /// List the effectivities of a revision
    List {
        #[command(flatten)]
        target: RevisionArgs,
    },

    /// Remove an effectivity from a revision
    Remove {
        #[command(flatten)]
        target: RevisionArgs,
        /// Effectivity id
        #[arg(long)]
        id: u64,
    },
}

/// Part revision addressed by an effectivity command.
#[derive(clap::Args, Debug, Clone)]
pub struct RevisionArgs {
    /// Part number
    #[arg(short, long)]
    pub part: String,

    /// Revision version
    #[arg(short = 'r', long)]
    pub version: String,
}

/// Name and description of a new effectivity.
#[derive(clap::Args, Debug, Clone)]
pub struct LabelArgs {
    #[arg(short, long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and resolved settings.
pub fn execute(command: Option<Commands>, settings: &Settings) -> Result<(), BomError> {
    match command {
        Some(Commands::Init { force }) => cmd_init(settings, force),
        Some(Commands::Import { file }) => cmd_import(settings, &file),
        Some(Commands::Export { output }) => cmd_export(settings, &output),
        Some(Commands::Status) => cmd_status(settings),
        Some(Commands::Resolve(args)) => cmd_resolve(settings, &args),
        Some(Commands::Baseline { action }) => cmd_baseline(settings, action),
        Some(Commands::Effectivity { action }) => cmd_effectivity(settings, action),
        None => {
            // No subcommand - show status by default
            cmd_status(settings)
        }
    }
}
