use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use toptweets::config::Config;
use toptweets::pipeline::Pipeline;
use toptweets::render::{render_json, render_text};
use toptweets::storage::{
    add_handle, remove_handle, Database, DatabaseError, HandleChange, Settings, SettingsUpdate,
    Store,
};
use toptweets::transport::{
    FallbackTransport, HttpTransport, ProxyTransport, DEFAULT_REQUEST_TIMEOUT,
};

/// Get the config directory path (~/.config/toptweets/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("toptweets");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(
    name = "toptweets",
    version,
    about = "Top recent posts from the handles you follow, ranked by engagement"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every tracked handle and show the top posts (default)
    Fetch {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Show how each score is made up
        #[arg(long)]
        explain: bool,
    },

    /// Track a handle (leading @ optional)
    Add { handle: String },

    /// Stop tracking a handle
    Remove { handle: String },

    /// List tracked handles, newest first
    Handles,

    /// Show or change saved settings
    Settings {
        /// Mirror base URL, e.g. https://nitter.net
        #[arg(long, value_name = "URL")]
        source_base: Option<String>,

        /// Entries kept from each handle's feed
        #[arg(long, value_name = "N")]
        per_handle: Option<usize>,

        /// Number of posts shown
        #[arg(long, value_name = "N")]
        top_n: Option<usize>,

        /// Forget saved settings and go back to the config file's values
        #[arg(long, conflicts_with_all = ["source_base", "per_handle", "top_n"])]
        reset: bool,
    },
}

fn print_settings(settings: &Settings) {
    println!("source_base      = {}", settings.source_base);
    println!("per_handle_limit = {}", settings.per_handle_limit);
    println!("top_n            = {}", settings.top_n);
}

async fn run_fetch(config: &Config, db: &Database, json: bool, explain: bool) -> Result<()> {
    let handles = db.get_handles().await.context("Failed to load handles")?;
    let settings = db.get_settings().await.context("Failed to load settings")?;

    let request_timeout = DEFAULT_REQUEST_TIMEOUT.min(Duration::from_secs(
        config.fetch_timeout_secs.max(1),
    ));
    let direct = HttpTransport::new(&config.user_agent, request_timeout)
        .context("Failed to build HTTP client")?;
    let fallback = config
        .fallback_prefix()
        .map(|prefix| ProxyTransport::new(direct.clone(), prefix));
    let transport = FallbackTransport::new(direct, fallback);

    let pipeline = Pipeline::new(transport, config.pipeline_options());
    let now = Utc::now();
    let outcome = pipeline
        .run_at(&handles, &settings, now)
        .await
        .context("Refresh failed")?;

    if json {
        println!(
            "{}",
            render_json(&outcome, now, explain).context("Failed to encode report")?
        );
    } else {
        print!("{}", render_text(&outcome, now, explain));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // SEC-007: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    // Open database
    let db_path = config_dir.join("toptweets.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db.with_defaults(config.settings_defaults()),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of toptweets appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    match args.command.unwrap_or(Command::Fetch {
        json: false,
        explain: false,
    }) {
        Command::Fetch { json, explain } => run_fetch(&config, &db, json, explain).await?,
        Command::Add { handle } => match add_handle(&db, &handle).await? {
            HandleChange::Applied(h) => println!("Added @{}", h),
            HandleChange::Unchanged(h) => println!("@{} is already tracked", h),
            HandleChange::Invalid => anyhow::bail!("Handle cannot be empty"),
        },
        Command::Remove { handle } => match remove_handle(&db, &handle).await? {
            HandleChange::Applied(h) => println!("Removed @{}", h),
            HandleChange::Unchanged(h) => println!("@{} was not tracked", h),
            HandleChange::Invalid => anyhow::bail!("Handle cannot be empty"),
        },
        Command::Handles => {
            let handles = db.get_handles().await.context("Failed to load handles")?;
            if handles.is_empty() {
                println!("No handles saved yet — add one to begin.");
            }
            for handle in handles {
                println!("@{}", handle);
            }
        }
        Command::Settings {
            source_base,
            per_handle,
            top_n,
            reset,
        } => {
            if reset {
                db.reset_settings()
                    .await
                    .context("Failed to reset settings")?;
            } else {
                let source_base = match source_base {
                    Some(base) => {
                        toptweets::feed::validate_source_base(&base)?;
                        Some(base.trim().to_string())
                    }
                    None => None,
                };
                let update = SettingsUpdate {
                    source_base,
                    per_handle_limit: per_handle.map(|n| n.max(1)),
                    top_n: top_n.map(|n| n.max(1)),
                };
                db.update_settings(&update)
                    .await
                    .context("Failed to save settings")?;
            }
            print_settings(&db.get_settings().await.context("Failed to load settings")?);
        }
    }

    Ok(())
}
