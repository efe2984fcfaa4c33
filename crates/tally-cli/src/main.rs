//! Tally CLI - Bank statement tracker
//!
//! Usage:
//!   tally init                                 Initialize database
//!   tally import --file jan.csv --bank Chase   Import a statement
//!   tally report pivot                         Category × month table
//!   tally serve --port 3000                    Start web server

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tally_core::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    // Config file < environment < flags
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }

    let user = cli.user.as_str();

    match cli.command {
        Commands::Init => commands::cmd_init(&config, user, cli.no_encrypt),
        Commands::Import {
            file,
            bank,
            create,
            currency,
            date_order,
            no_categorize,
        } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            commands::cmd_import(
                &db,
                user,
                &file,
                &bank,
                create,
                currency.as_deref(),
                date_order.as_deref(),
                !no_categorize,
            )
        }
        Commands::Categorize { scope, import } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            commands::cmd_categorize(&db, user, &scope, import)
        }
        Commands::Suggest {
            limit,
            apply,
            min_confidence,
        } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            let suggester = config.suggester().context(
                "AI suggestions are not configured. Set ANTHROPIC_API_KEY or [ai] api_key in the config file",
            )?;
            commands::cmd_suggest(&db, &suggester, user, limit, apply, min_confidence).await
        }
        Commands::Banks { action } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            match action {
                None | Some(BanksAction::List) => commands::cmd_banks_list(&db, user),
                Some(BanksAction::Add {
                    name,
                    currency,
                    date_format,
                    amount_sign,
                }) => commands::cmd_banks_add(
                    &db,
                    user,
                    &name,
                    currency.as_deref(),
                    date_format.as_deref(),
                    &amount_sign,
                ),
                Some(BanksAction::Delete { id, force }) => {
                    commands::cmd_banks_delete(&db, user, id, force)
                }
            }
        }
        Commands::Categories { action } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            match action {
                None | Some(CategoriesAction::List) => commands::cmd_categories_list(&db, user),
                Some(CategoriesAction::Add { name, kind, color }) => {
                    commands::cmd_categories_add(&db, user, &name, &kind, color.as_deref())
                }
                Some(CategoriesAction::Delete { id }) => {
                    commands::cmd_categories_delete(&db, user, id)
                }
            }
        }
        Commands::Keywords { action } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            match action {
                None | Some(KeywordsAction::List) => commands::cmd_keywords_list(&db, user),
                Some(KeywordsAction::Add { keyword, category }) => {
                    commands::cmd_keywords_add(&db, user, &keyword, &category)
                }
                Some(KeywordsAction::Delete { id }) => commands::cmd_keywords_delete(&db, user, id),
            }
        }
        Commands::Rules { action } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            match action {
                None | Some(RulesAction::List) => commands::cmd_rules_list(&db),
                Some(RulesAction::Add {
                    category,
                    pattern,
                    pattern_type,
                    priority,
                }) => commands::cmd_rules_add(&db, &category, &pattern, &pattern_type, priority),
                Some(RulesAction::Delete { id }) => commands::cmd_rules_delete(&db, id),
                Some(RulesAction::Test { description }) => {
                    commands::cmd_rules_test(&db, user, &description)
                }
            }
        }
        Commands::Currencies { action } => {
            let db = commands::open_db(&config, cli.no_encrypt)?;
            match action {
                None | Some(CurrenciesAction::List) => commands::cmd_currencies_list(&db),
                Some(CurrenciesAction::Add { code, name, symbol }) => {
                    commands::cmd_currencies_add(&db, &code, &name, symbol.as_deref())
                }
                Some(CurrenciesAction::Delete { code }) => {
                    commands::cmd_currencies_delete(&db, &code)
                }
            }
        }
        Commands::Transactions { action } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            match action {
                None => commands::cmd_transactions_list(
                    &db,
                    user,
                    &commands::TransactionListArgs::default(),
                ),
                Some(TransactionsAction::List {
                    limit,
                    bank,
                    category,
                    uncategorized,
                    search,
                }) => commands::cmd_transactions_list(
                    &db,
                    user,
                    &commands::TransactionListArgs {
                        limit,
                        bank,
                        category,
                        uncategorized,
                        search,
                    },
                ),
                Some(TransactionsAction::SetCategory {
                    id,
                    category,
                    remember,
                }) => commands::cmd_transactions_set_category(
                    &db,
                    user,
                    id,
                    category.as_deref(),
                    remember,
                ),
            }
        }
        Commands::Imports { action } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            match action {
                None => commands::cmd_imports_list(&db, user, 20),
                Some(ImportsAction::List { limit }) => commands::cmd_imports_list(&db, user, limit),
                Some(ImportsAction::Show { id }) => commands::cmd_imports_show(&db, user, id),
                Some(ImportsAction::Delete { id }) => commands::cmd_imports_delete(&db, user, id),
            }
        }
        Commands::Report { report_type } => {
            let db = commands::open_user_db(&config, user, cli.no_encrypt)?;
            match report_type {
                ReportType::Pivot(args) => {
                    let filter = commands::resolve_report_filter(&db, user, &args)?;
                    commands::cmd_report_pivot(&db, &filter, args.json)
                }
                ReportType::ByCategory(args) => {
                    let filter = commands::resolve_report_filter(&db, user, &args)?;
                    commands::cmd_report_by_category(&db, &filter, args.json)
                }
                ReportType::ByBank(args) => {
                    let filter = commands::resolve_report_filter(&db, user, &args)?;
                    commands::cmd_report_by_bank(&db, &filter, args.json)
                }
                ReportType::Summary(args) => {
                    let filter = commands::resolve_report_filter(&db, user, &args)?;
                    commands::cmd_report_summary(&db, &filter, args.json)
                }
            }
        }
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            commands::cmd_serve(&config, no_auth, cli.no_encrypt, static_dir.as_deref()).await
        }
    }
}
