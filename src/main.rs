//! Boltwatch CLI - Task completion notifications for Bolt
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use boltwatch::agent::build_prompt;
use boltwatch::scraper::{page_source_for, PageExtractor};
use boltwatch::{Config, ConfigStore, NotificationStatus, Pipeline, Settings, Trigger, Watcher};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "boltwatch")]
#[command(author, version, about = "Task completion notifications for Bolt", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a page (URL or HTML file) and notify on every completed task
    Watch {
        /// URL or path of the page to watch
        target: String,
    },
    /// Extract the page once and send a notification for it
    Process {
        /// URL or path of the page
        target: String,
    },
    /// Print the snapshot extracted from a page as JSON
    Extract {
        /// URL or path of the page
        target: String,
        /// Print the summarization prompt instead
        #[arg(long)]
        prompt: bool,
    },
    /// Send a test notification
    Test,
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current settings with keys masked
    Show,
    /// Set a setting, e.g. `config set apiProvider gemini`
    Set { key: String, value: String },
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("boltwatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::find_config_file);
    let store = ConfigStore::at(&config_path);

    match cli.command {
        Commands::Watch { target } => {
            let config = Config::load_from(&config_path)?;
            let extractor = PageExtractor::new(&config.selectors)?;
            let source = page_source_for(&target)?;
            let (mut watcher, mut status_rx) = Watcher::new(
                source,
                extractor,
                Pipeline::with_defaults()?,
                store,
                config.watch.clone(),
            );

            let printer = tokio::spawn(async move {
                while let Some(status) = status_rx.recv().await {
                    print_status(&status);
                }
            });

            println!("Watching: {}", target);
            tokio::select! {
                _ = watcher.run() => {}
                _ = tokio::signal::ctrl_c() => info!("shutting down"),
            }
            printer.abort();
        }
        Commands::Process { target } => {
            let config = Config::load_from(&config_path)?;
            let snapshot = extract(&target, &config).await?;
            let status = Pipeline::with_defaults()?
                .handle(Trigger::TaskCompleted(snapshot), &config.settings)
                .await;
            print_status(&status);
        }
        Commands::Extract { target, prompt } => {
            let config = Config::load_from(&config_path)?;
            let snapshot = extract(&target, &config).await?;
            if prompt {
                println!("{}", build_prompt(&snapshot));
            } else {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
        }
        Commands::Test => {
            let status = Pipeline::with_defaults()?
                .handle(Trigger::TestNotification, &store.read())
                .await;
            print_status(&status);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => print_settings(&store.read()),
            ConfigAction::Set { key, value } => {
                store.save_setting(&key, &value)?;
                println!("{} {} saved to {}", "✓".green(), key, config_path.display());
            }
            ConfigAction::Path => println!("{}", config_path.display()),
        },
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "boltwatch", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Fetch a page once and extract its snapshot
async fn extract(target: &str, config: &Config) -> anyhow::Result<boltwatch::Snapshot> {
    let extractor = PageExtractor::new(&config.selectors)?;
    let html = page_source_for(target)?.fetch().await?;
    Ok(extractor.extract_html(&html))
}

fn print_status(status: &NotificationStatus) {
    if status.success {
        println!("{} Notification sent", "✓".green());
    } else {
        let error = status.error.as_deref().unwrap_or("Unknown error");
        println!("{} {}", "✗".red(), error.red());
    }
}

fn print_settings(settings: &Settings) {
    let mask = |value: &str| {
        if value.is_empty() {
            "(not set)".dimmed().to_string()
        } else {
            let visible: String = value.chars().take(6).collect();
            format!("{visible}…")
        }
    };

    println!("apiProvider       {}", settings.api_provider);
    println!("anthropicApiKey   {}", mask(&settings.anthropic_api_key));
    println!("geminiApiKey      {}", mask(&settings.gemini_api_key));
    println!("openaiApiKey      {}", mask(&settings.openai_api_key));
    println!(
        "discordWebhookUrl {}",
        if settings.discord_webhook_url.is_empty() {
            "(not set)".dimmed().to_string()
        } else {
            settings.discord_webhook_url.clone()
        }
    );
    println!("autoDiscussMode   {}", settings.auto_discuss_mode);

    if settings.validate() {
        println!("\n{}", "Ready to send summaries".green());
    } else {
        println!("\n{}", "Webhook URL or selected provider key missing".yellow());
    }
}
