mod config;

use std::io::Write;
use std::sync::Arc;

use config::QueryChatConfig;
use querychat_core::context::window::create_counter;
use querychat_core::llm::LlmClient;
use querychat_core::sql::{load_schema_script, SqliteDatabase};
use querychat_core::SessionEngine;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env first so the filter and config defaults can see it
    dotenvy::dotenv().ok();

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,querychat_core=info,querychat=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cfg = QueryChatConfig::load();
    info!(target: "querychat", database = %cfg.database, model = %cfg.llm.model, "Starting QueryChat");

    let create_statements = load_schema_script(&cfg.schema_script).map_err(|e| {
        error!(target: "querychat", path = %cfg.schema_script.display(), error = %e, "Failed to read schema script");
        e
    })?;

    let limits = cfg.llm.limits();
    let model = Arc::new(LlmClient::new(cfg.llm.clone())?);
    let database = Arc::new(SqliteDatabase::new(cfg.database.clone()));
    let counter = create_counter(&cfg.token_counter);

    let mut session = SessionEngine::new(
        model,
        database,
        counter,
        limits,
        &create_statements,
        cfg.session.clone(),
    );

    println!("Ask a question about the database. Commands: /debug, /reset, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        match prompt {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                session.reset();
                println!("History cleared.");
                continue;
            }
            "/debug" => {
                let on = !session.debug();
                session.set_debug(on);
                println!("Debug {}.", if on { "on" } else { "off" });
                continue;
            }
            _ => {}
        }

        let answer = session.handle_turn(prompt).await;
        for warning in session.drain_warnings() {
            println!("{warning}");
        }
        println!("{answer}");
    }

    info!(target: "querychat", turns = session.history().len() / 2, "Bye");
    Ok(())
}
