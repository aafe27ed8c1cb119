use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use support_chat::client::HttpChatService;
use support_chat::config::Config;
use support_chat::routes;
use support_chat::session::{Dispatcher, SubmitOutcome, render_text};
use support_chat::state::AppState;

#[derive(Parser)]
#[command(name = "support-chat", about = "Customer support chat client and reference service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reference chat service
    Serve {
        /// Listen address (overrides CHAT_BIND_ADDR)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Chat with the service from the terminal
    Chat {
        /// Chat service URL (overrides CHAT_API_URL)
        #[arg(long)]
        url: Option<String>,
        /// User identity (overrides CHAT_USER_ID)
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind_addr.clone());
            serve(&config, bind).await
        }
        Command::Chat { url, user } => {
            let url = url.unwrap_or_else(|| config.api_url.clone());
            let user = user.unwrap_or_else(|| config.user_id.clone());
            chat(&config, url, user).await
        }
    }
}

async fn serve(config: &Config, bind: String) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.rate_limit_per_minute));
    let app = routes::create_router()
        .with_state(state)
        .layer(CorsLayer::very_permissive());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!(addr = %bind, "support chat service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat(config: &Config, url: String, user: String) -> anyhow::Result<()> {
    let service = HttpChatService::new(url, config.request_timeout)?;
    let dispatcher = Dispatcher::new(Arc::new(service))
        .echo_errors_inline(config.echo_errors_inline)
        .with_context("locale", "en");

    if let Err(e) = dispatcher.load_graph_structure().await {
        tracing::warn!(error = %e, "could not load workflow graph");
    }
    println!("{}", render_text(&dispatcher.view()));
    println!("Type a message, /reset to start over, /quit to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/reset" => {
                dispatcher.reset();
                if let Err(e) = dispatcher.load_graph_structure().await {
                    tracing::warn!(error = %e, "could not load workflow graph");
                }
            }
            input => {
                if let SubmitOutcome::Rejected(reason) = dispatcher.submit(input, &user).await {
                    tracing::debug!(%reason, "input ignored");
                    continue;
                }
            }
        }
        println!("\n{}\n", render_text(&dispatcher.view()));
    }
    Ok(())
}
