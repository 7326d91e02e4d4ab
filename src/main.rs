use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lucky_draw_bot::application::errors::{BotError, ConfigError};
use lucky_draw_bot::application::messaging::{BotEvent, MessageDispatcher, MessageParser};
use lucky_draw_bot::application::services::{CommandService, DrawService, Renderer, Scheduler};
use lucky_draw_bot::domain::entities::User;
use lucky_draw_bot::domain::traits::Bot;
use lucky_draw_bot::infrastructure::adapters::discord::{DiscordAdapter, Gateway};
use lucky_draw_bot::infrastructure::adapters::ConsoleAdapter;
use lucky_draw_bot::infrastructure::config::{log_filter, Config};
use lucky_draw_bot::infrastructure::environment::{self, EnvironmentReport, Identity};
use lucky_draw_bot::infrastructure::storage::JsonStore;

/// Capacity of the adapter → dispatcher event channel
const EVENT_BUFFER: usize = 64;

/// Channel and user ids the console speaks as
const CONSOLE_CHANNEL: u64 = 1;
const CONSOLE_USER: u64 = 1;

#[derive(Parser)]
#[command(name = "lucky-draw-bot")]
#[command(about = "Discord giveaway bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, env = "LUCKY_DRAW_CONFIG", default_value = "config.yaml", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (default)
    Run,
    /// Start with the console adapter (dev mode)
    Console,
    /// Verify the runtime environment and exit
    CheckEnv,
    /// Generate default config
    InitConfig,
    /// Show version
    Version,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&cli.config, Mode::Discord),
        Commands::Console => run(&cli.config, Mode::Console),
        Commands::CheckEnv => check_env(&cli.config),
        Commands::InitConfig => init_config(),
        Commands::Version => {
            println!("lucky-draw-bot v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Discord,
    Console,
}

/// File config (when present) overlaid with the environment
fn load_config(path: &str) -> Result<Config, ConfigError> {
    let mut config = if Path::new(path).exists() {
        tracing::info!("Loading config from {}", path);
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn run(config_path: &str, mode: Mode) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(async {
        match mode {
            Mode::Discord => run_discord(config).await,
            Mode::Console => run_console(config).await,
        }
    });

    match result {
        Ok(()) => {
            tracing::info!("Bot stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn open_draws(config: &Config) -> Result<Arc<DrawService>, BotError> {
    let store = JsonStore::new(&config.runtime.data_dir, config.timezone()?);
    store.init().await?;
    let draws = Arc::new(DrawService::new(Arc::new(store)));
    let restored = draws.restore().await;
    tracing::info!("Loaded {} draws from {}", restored, config.runtime.data_dir.display());
    Ok(draws)
}

async fn run_discord(config: Config) -> Result<(), BotError> {
    environment::verify(&config, Identity::current())?;
    let token = match config.token() {
        Ok(token) => token.to_string(),
        Err(e) => {
            tracing::error!("DISCORD_BOT_TOKEN environment variable not set!");
            return Err(e.into());
        }
    };

    tracing::info!("Starting {}", config.bot.name);
    let draws = open_draws(&config).await?;

    let bot = Arc::new(DiscordAdapter::new(token.clone(), &config.discord));
    bot.start().await?;

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let gateway = Gateway::new(&config.discord.gateway_url, token, tx, shutdown.clone()).start();

    let requested = serve(bot, draws, &config, rx, shutdown).await?;
    let _ = gateway.await;

    if requested {
        Ok(())
    } else {
        Err(BotError::GatewayClosed("gateway stopped unexpectedly".to_string()))
    }
}

async fn run_console(config: Config) -> Result<(), BotError> {
    environment::provision_data_dir(&config.runtime.data_dir)?;
    let draws = open_draws(&config).await?;

    let bot = Arc::new(ConsoleAdapter::new());
    bot.start().await?;

    println!("\n=== lucky-draw-bot console mode ===");
    println!("Try: /抽獎 Steam 5 1, join 1, @7 join 1, /抽獎列表, /幫助. Ctrl+D to quit.\n");

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let _ = tx.send(BotEvent::Ready(bot.bot_info())).await;

    let parser = MessageParser::new(
        "/",
        CONSOLE_CHANNEL,
        User::new(CONSOLE_USER).with_username("console"),
    );
    let registry = lucky_draw_bot::application::services::command_service::default_registry();
    let input = ConsoleAdapter::spawn_input(parser, registry, tx, shutdown.clone());

    serve(bot, draws, &config, rx, shutdown).await?;
    input.abort();
    Ok(())
}

/// Run the dispatcher and scheduler until the event source closes or a
/// signal arrives, then save. Returns whether shutdown was requested.
async fn serve<B: Bot + 'static>(
    bot: Arc<B>,
    draws: Arc<DrawService>,
    config: &Config,
    events: mpsc::Receiver<BotEvent>,
    shutdown: CancellationToken,
) -> Result<bool, BotError> {
    let render = Renderer::new(config.timezone()?);
    let commands = Arc::new(CommandService::new(bot, draws.clone(), render));

    let scheduler = Scheduler::new(
        commands.clone(),
        draws.clone(),
        config.check_interval(),
        config.save_interval(),
        shutdown.clone(),
    )
    .start();

    let signals = tokio::spawn(wait_for_signal(shutdown.clone()));

    MessageDispatcher::new(commands).run(events, shutdown.clone()).await;

    let requested = shutdown.is_cancelled();
    shutdown.cancel();
    signals.abort();
    let _ = scheduler.await;

    let (total, _) = draws.counts().await;
    match draws.save_now().await {
        Ok(()) => tracing::info!("Saved {} draws before exit", total),
        Err(e) => {
            tracing::error!("Final save failed: {}", e);
            return Err(e.into());
        }
    }
    Ok(requested)
}

/// Cancel `shutdown` on SIGINT or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
                    _ = term.recv() => tracing::info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received Ctrl+C");
    }
    shutdown.cancel();
}

fn check_env(config_path: &str) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("[FAIL] config    {}", e);
            return ExitCode::FAILURE;
        }
    };
    let report = EnvironmentReport::inspect(&config, Identity::current());
    print!("{}", report);
    if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_config() -> ExitCode {
    let config = Config::default();
    match serde_yaml::to_string(&config) {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Failed to render config: {}", e);
            ExitCode::FAILURE
        }
    }
}
