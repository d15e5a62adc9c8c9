use anyhow::{Context, Result};
use axum::Router;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, Polling, UpdateListener};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use castbot::api::{self, auth::StaticTokenAuthenticator, AppState};
use castbot::cli::{Cli, Commands};
use castbot::telegram::{create_bot, schema, setup_bot_commands, webhook_url, Bot, HandlerDeps, HandlerError, TelegramGateway};
use castcore::core::{config, init_logger, install_panic_hook};
use castcore::registration::RegistrationHandler;
use castcore::scheduler::start_scheduler;
use castcore::storage::stats::dashboard_stats;
use castcore::storage::{create_pool, get_connection, now, DbPool};
use castcore::{BroadcastDispatcher, DisabledGateway, MessagingGateway};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, database).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    install_panic_hook();

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { webhook }) => run_bot(webhook).await,
        Some(Commands::Migrate) => {
            open_ledger()?;
            log::info!("Database is up to date");
            Ok(())
        }
        Some(Commands::Stats) => print_stats(&*open_ledger()?),
        None => run_bot(false).await,
    }
}

/// Opens the pool; migrations run as part of it.
fn open_ledger() -> Result<Arc<DbPool>> {
    let path = config::DATABASE_PATH
        .clone()
        .context("Missing required environment variable: DATABASE_PATH")?;
    let pool = create_pool(&path).with_context(|| format!("Failed to open database {}", path))?;
    Ok(Arc::new(pool))
}

fn print_stats(pool: &DbPool) -> Result<()> {
    let conn = get_connection(pool)?;
    let stats = dashboard_stats(&conn, now())?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_bot(use_webhook: bool) -> Result<()> {
    log::info!("Starting castbot...");
    config::validate_required()?;
    let dashboard_token = config::DASHBOARD_TOKEN
        .clone()
        .context("Missing required environment variable: DASHBOARD_TOKEN")?;
    let pool = open_ledger()?;

    // A missing or broken bot only disables sending; the dashboard still runs.
    let bot = match create_bot() {
        Ok(bot) => {
            match bot.get_me().await {
                Ok(me) => log::info!("Bot @{} is online", me.username()),
                Err(e) => log::warn!("Bot API not reachable yet: {}", e),
            }
            Some(bot)
        }
        Err(e) => {
            log::error!("Bot initialization failed: {}. Running without a bot.", e);
            None
        }
    };
    let gateway: Arc<dyn MessagingGateway> = match &bot {
        Some(bot) => Arc::new(TelegramGateway::new(bot.clone())),
        None => Arc::new(DisabledGateway),
    };

    let dispatcher = BroadcastDispatcher::new(pool.clone(), gateway.clone());
    let scheduler = start_scheduler(pool.clone(), dispatcher.clone());

    let auth = Arc::new(StaticTokenAuthenticator::new(&dashboard_token));
    let mut app = api::router(AppState::new(pool.clone(), dispatcher.clone(), auth));
    let listener = api::bind(*config::WEB_PORT).await?;
    let shutdown = CancellationToken::new();

    let server = match bot {
        None => {
            let server = spawn_server(listener, app, shutdown.clone());
            if let Err(e) = signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
            server
        }
        Some(bot) => {
            if let Err(e) = setup_bot_commands(&bot).await {
                log::warn!("Failed to set bot commands: {}", e);
            }
            let registration = RegistrationHandler::new(pool.clone(), gateway.clone());
            let handler = schema(HandlerDeps::new(registration));

            if use_webhook {
                let base = config::WEBHOOK_URL
                    .clone()
                    .context("WEBHOOK_URL is required in webhook mode")?;
                let url = webhook_url(&base)?;
                log::info!("Starting bot in webhook mode at {}", url);

                let options = webhooks::Options::new(api::listen_addr(*config::WEB_PORT), url);
                let (updates, _stop_flag, webhook_router) = webhooks::axum_to_router(bot.clone(), options)
                    .await
                    .context("Failed to register webhook")?;
                app = app.merge(webhook_router);

                let server = spawn_server(listener, app, shutdown.clone());
                run_updates(bot, handler, updates).await;
                server
            } else {
                log::info!("Starting bot in long polling mode");
                let server = spawn_server(listener, app, shutdown.clone());
                let updates = Polling::builder(bot.clone()).drop_pending_updates().build();
                run_updates(bot, handler, updates).await;
                server
            }
        }
    };

    log::info!("Shutting down gracefully...");
    shutdown.cancel();
    scheduler.abort();
    if dispatcher.in_flight() > 0 {
        log::info!("Waiting for {} broadcast(s) in flight", dispatcher.in_flight());
    }
    dispatcher.shutdown().await;

    match server.await {
        Ok(result) => result,
        Err(e) => Err(anyhow::anyhow!("Dashboard server task failed: {}", e)),
    }
}

fn spawn_server(listener: TcpListener, app: Router, shutdown: CancellationToken) -> JoinHandle<Result<()>> {
    tokio::spawn(async move { api::serve(listener, app, async move { shutdown.cancelled().await }).await })
}

/// Runs the teloxide dispatcher until Ctrl-C.
async fn run_updates<L>(bot: Bot, handler: UpdateHandler<HandlerError>, updates: L)
where
    L: UpdateListener + Send,
    L::Err: std::fmt::Debug,
{
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            updates,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;
    log::info!("Dispatcher shutdown gracefully");
}
