//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Tally - Import bank statements and see where the money went
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted bank statement tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides config file and TALLY_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default: ~/.config/tally/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User the command acts as
    #[arg(long, env = "TALLY_USER", default_value = "local-dev", global = true)]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed currencies, categories and rules
    Init,

    /// Import a CSV, Excel or PDF statement into a bank
    Import {
        /// Statement file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Bank name
        #[arg(short, long)]
        bank: String,

        /// Create the bank if it does not exist
        #[arg(long)]
        create: bool,

        /// Currency for a newly created bank (default: your default currency)
        #[arg(long, requires = "create")]
        currency: Option<String>,

        /// Day/month order for ambiguous dates: month_first or day_first
        #[arg(long)]
        date_order: Option<String>,

        /// Skip keyword/rule categorization of imported transactions
        #[arg(long)]
        no_categorize: bool,
    },

    /// Re-run keyword and rule categorization
    Categorize {
        /// Which transactions: all, uncategorized
        #[arg(short, long, default_value = "all")]
        scope: String,

        /// Only transactions from this import
        #[arg(long, conflicts_with = "scope")]
        import: Option<i64>,
    },

    /// Ask Claude to suggest categories for uncategorized transactions
    ///
    /// Requires ANTHROPIC_API_KEY (or [ai] api_key in the config file).
    Suggest {
        /// Maximum uncategorized transactions to examine
        #[arg(short, long, default_value = "200")]
        limit: i64,

        /// Write accepted suggestions (otherwise only print them)
        #[arg(long)]
        apply: bool,

        /// Discard suggestions below this confidence (0.0-1.0)
        #[arg(long, default_value = "0.6")]
        min_confidence: f64,
    },

    /// Manage banks (list, add, delete)
    Banks {
        #[command(subcommand)]
        action: Option<BanksAction>,
    },

    /// Manage categories (list, add, delete)
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage your keywords (list, add, delete)
    Keywords {
        #[command(subcommand)]
        action: Option<KeywordsAction>,
    },

    /// Manage global category rules (list, add, delete, test)
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },

    /// Manage currencies (list, add, delete)
    Currencies {
        #[command(subcommand)]
        action: Option<CurrenciesAction>,
    },

    /// List transactions or set a transaction's category
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Import history (list, show, delete)
    Imports {
        #[command(subcommand)]
        action: Option<ImportsAction>,
    },

    /// Generate reports
    Report {
        #[command(subcommand)]
        report_type: ReportType,
    },

    /// Start the web server
    Serve {
        /// Port to listen on (default: config, else 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default: config, else 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// Every request acts as the local-dev user with admin rights.
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum BanksAction {
    /// List your banks
    List,

    /// Add a bank
    Add {
        /// Bank name
        name: String,

        /// Statement currency (default: your default currency)
        #[arg(short, long)]
        currency: Option<String>,

        /// Explicit date format, e.g. "%d/%m/%Y" (inferred when omitted)
        #[arg(long)]
        date_format: Option<String>,

        /// Amount sign convention: normal or inverted
        #[arg(long, default_value = "normal")]
        amount_sign: String,
    },

    /// Delete a bank
    Delete {
        /// Bank ID
        id: i64,

        /// Also delete the bank's transactions
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List global and custom categories
    List,

    /// Add a custom category
    Add {
        /// Category name
        name: String,

        /// Kind: expense, income, transfer
        #[arg(short, long, default_value = "expense")]
        kind: String,

        /// Display color (e.g., "#10b981")
        #[arg(short, long)]
        color: Option<String>,
    },

    /// Delete a custom category (its transactions become uncategorized)
    Delete {
        /// Category ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum KeywordsAction {
    /// List your keywords
    List,

    /// Add a keyword
    Add {
        /// Text to look for in descriptions
        keyword: String,

        /// Category name
        #[arg(short, long)]
        category: String,
    },

    /// Delete a keyword
    Delete {
        /// Keyword ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List global rules in evaluation order
    List,

    /// Add a global rule
    Add {
        /// Global category name
        #[arg(short, long)]
        category: String,

        /// Pattern to match
        #[arg(short, long)]
        pattern: String,

        /// Pattern type: contains, starts_with, exact, regex
        #[arg(short = 't', long, default_value = "contains")]
        pattern_type: String,

        /// Priority (higher = checked first)
        #[arg(long, default_value = "0")]
        priority: i32,
    },

    /// Delete a rule
    Delete {
        /// Rule ID
        id: i64,
    },

    /// Show which keyword or rule would categorize a description
    Test {
        /// Transaction description to test
        description: String,
    },
}

#[derive(Subcommand)]
pub enum CurrenciesAction {
    /// List known currencies
    List,

    /// Add a currency
    Add {
        /// Three-letter ISO code
        code: String,

        /// Display name
        name: String,

        /// Symbol (e.g., "€")
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Delete an unused currency
    Delete {
        /// Three-letter ISO code
        code: String,
    },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List recent transactions
    List {
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Only this bank (name)
        #[arg(short, long)]
        bank: Option<String>,

        /// Only this category (name)
        #[arg(short, long)]
        category: Option<String>,

        /// Only uncategorized transactions
        #[arg(long, conflicts_with = "category")]
        uncategorized: bool,

        /// Search descriptions
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Set or clear a transaction's category
    SetCategory {
        /// Transaction ID
        id: i64,

        /// Category name (omit to clear the manual assignment)
        category: Option<String>,

        /// Also remember the description as a keyword for this category
        #[arg(long, requires = "category")]
        remember: bool,
    },
}

#[derive(Subcommand)]
pub enum ImportsAction {
    /// List recent imports
    List {
        /// Number of imports to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show one import and its skipped rows
    Show {
        /// Import ID
        id: i64,
    },

    /// Delete an import and its transactions
    Delete {
        /// Import ID
        id: i64,
    },
}

/// Options shared by every report
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Start date (YYYY-MM-DD, default: 11 months before this month)
    #[arg(long)]
    pub from: Option<String>,

    /// End date (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub to: Option<String>,

    /// Restrict to one bank (name)
    #[arg(short, long)]
    pub bank: Option<String>,

    /// Report currency (default: the bank's, else yours)
    #[arg(short, long)]
    pub currency: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum ReportType {
    /// Category × month table
    Pivot(ReportArgs),

    /// Spending per category
    ByCategory(ReportArgs),

    /// Income and expenses per bank
    ByBank(ReportArgs),

    /// Income, expenses and savings rate
    Summary(ReportArgs),
}
