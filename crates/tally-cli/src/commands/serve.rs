//! Server command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tally_core::ai::CategorySuggester;
use tally_core::config::Config;
use tally_server::ServerConfig;

use super::open_db;

pub async fn cmd_serve(
    config: &Config,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", config.db_path.display());
    println!("   Listening: http://{}:{}", config.host, config.port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let server_config = ServerConfig::from_config(config, !no_auth);

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        if server_config.jwt_secret.is_some() {
            println!("   🔐 Authentication: Supabase JWT (HS256)");
        } else {
            println!("   🔒 No JWT secret configured; set SUPABASE_JWT_SECRET for user logins");
        }
        if !server_config.api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured",
                server_config.api_keys.len()
            );
        }
    }

    let suggester: Option<Arc<dyn CategorySuggester>> = match config.suggester() {
        Some(s) => {
            println!("   🤖 AI suggestions: {}", s.model());
            Some(Arc::new(s))
        }
        None => {
            println!("   💡 Tip: Set ANTHROPIC_API_KEY to enable AI category suggestions");
            None
        }
    };

    let db = open_db(config, no_encrypt)?;
    db.seed_defaults().context("Failed to seed defaults")?;

    let static_dir = match static_dir {
        Some(dir) => Some(dir.to_str().context("Static directory path is not valid UTF-8")?),
        None => None,
    };

    tally_server::serve(
        db,
        &config.host,
        config.port,
        static_dir,
        server_config,
        suggester,
    )
    .await
}
