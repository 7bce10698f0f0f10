use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Track income, expenses, and savings from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to the local data directory
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Quick capture: tally 12.50 "coffee with friends"
    #[arg(trailing_var_arg = true)]
    pub entry: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a transaction
    #[command(alias = "new")]
    Add {
        /// Amount (always positive; use --income for income)
        amount: String,
        /// Description
        description: Vec<String>,
        /// Category name (created on first use)
        #[arg(short, long, default_value = "Uncategorized")]
        category: String,
        /// Record as income instead of expense
        #[arg(long)]
        income: bool,
        /// Booking date (YYYY-MM-DD, defaults to today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
    /// List recent transactions
    List {
        /// Number of transactions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Manage savings goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Flush the offline queue against the remote store
    Sync,
    /// Show sync status and pending offline operations
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category
    Add {
        /// Category name
        name: String,
        /// Income category instead of expense
        #[arg(long)]
        income: bool,
    },
    /// List categories
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a savings goal
    Add {
        /// Goal name
        name: String,
        /// Target amount
        target: String,
        /// Optional deadline (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        deadline: Option<String>,
    },
    /// List savings goals with progress
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Deposit into a savings goal
    Deposit {
        /// Goal name or unique id prefix
        goal: String,
        /// Amount to deposit
        amount: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
