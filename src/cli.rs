use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "authpol")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile declared authentication policies with a remote control plane", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Policy declarations file (default: <config dir>/policies.toml)
    #[arg(short, long, global = true, env = "AUTHPOL_POLICIES")]
    pub file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Refresh tracked state and show what apply would change
    Plan,

    /// Create, update, replace and delete policies to match declarations
    Apply(ApplyArgs),

    /// Re-read every tracked policy from the remote system
    Refresh,

    /// Start tracking an existing policy under a declaration label
    Import {
        /// Declaration label to track the policy under
        label: String,

        /// Identifier token, e.g. SALES|PUBLIC|MFA_POLICY
        id: String,
    },

    /// Drop tracked policies from the remote system
    Destroy {
        /// Only destroy this label
        label: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show tracked state
    Show {
        /// Only show this label
        label: Option<String>,
    },

    /// Encode or decode identifier tokens
    #[command(subcommand)]
    Id(IdCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// Show what would change without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of policies to apply in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,
}

// ============================================================================
// Identifier Commands
// ============================================================================

#[derive(Subcommand)]
pub enum IdCommand {
    /// Build a token from its three parts
    Encode {
        database: String,
        schema: String,
        name: String,
    },

    /// Split a token into its three parts
    Decode {
        /// Token, e.g. SALES|PUBLIC|MFA_POLICY
        token: String,
    },
}
