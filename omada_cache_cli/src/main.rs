use anyhow::{Context, Result};
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use omada_cache_cli::config::{AppConfig, ConfigManager};
use omada_cache_cli::output::{InvalidationSummary, OutputFormat, ReportFormatter, TtlAnswer};
use omada_cache_cli::terminal;
use omada_cache_core::{InvalidationScope, OmadaCache};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "omada-cache")]
#[command(author, version, about = "Inspect and maintain the Omada API response cache", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cache database file, overriding the configuration
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Output format (text on a terminal, JSON otherwise)
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show entry and hit statistics for every store
    Stats,

    /// List cached entries, newest first
    View {
        /// Maximum entries shown per store
        #[arg(short, long, default_value_t = 50)]
        limit: u32,

        /// Include entries whose TTL has passed
        #[arg(long)]
        include_expired: bool,
    },

    /// Show hit rate, utilization and recommendations
    Efficiency,

    /// Delete expired entries from every store
    Cleanup,

    /// Delete entries by endpoint, by request, or everything
    #[command(group(ArgGroup::new("target").required(true).args(["endpoint", "all"])))]
    Invalidate {
        /// Endpoint whose entries are removed
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Request parameters (JSON) selecting a single entry
        #[arg(short, long, requires = "endpoint")]
        params: Option<String>,

        /// Remove every entry in every store
        #[arg(long, conflicts_with_all = ["endpoint", "params"])]
        all: bool,
    },

    /// Look up a cached response
    Get {
        #[arg(short, long)]
        endpoint: String,

        /// Request parameters (JSON)
        #[arg(short, long, default_value = "{}")]
        params: String,
    },

    /// Look up a cached identity
    #[command(group(ArgGroup::new("key").required(true).args(["email", "uid"])))]
    Identity {
        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        uid: Option<String>,
    },

    /// Show the TTL the policy assigns to an operation
    Ttl {
        operation: String,

        /// Treat the operation as a write
        #[arg(long)]
        mutation: bool,
    },

    /// Run the expiry sweeper in the foreground until Ctrl-C
    Sweep,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// List all configuration values
    List,

    /// Get a configuration value
    Get {
        /// Configuration key (e.g., cache.default_ttl_seconds)
        key: String,
    },

    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .filter_module("omada_cache_core", log::LevelFilter::Debug)
            .filter_module("omada_cache_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    match cli.command {
        Commands::Config { command } => return config_command(&manager, command),
        Commands::Completions { shell } => {
            generate_completions(shell);
            return Ok(());
        }
        _ => {}
    }

    let mut config = manager.load()?;
    config.apply_cli_overrides(cli.db.clone());

    let format = OutputFormat::resolve(
        cli.format,
        config.output.default_format.as_deref(),
        terminal::is_interactive(),
    )?;
    let formatter = format.formatter(config.output.color_enabled && terminal::supports_color());

    if let Commands::Ttl {
        operation,
        mutation,
    } = &cli.command
    {
        let policy = config.cache.ttl_policy();
        let answer = TtlAnswer::new(operation, *mutation, policy.ttl_for(operation, *mutation));
        println!("{}", formatter.format_ttl(&answer)?);
        return Ok(());
    }

    let cache = open_cache(&config).await?;
    let result = run_command(&cache, cli.command, formatter.as_ref()).await;
    cache.close().await;
    result
}

/// Open the cache with the sweeper off; only `sweep` starts it
async fn open_cache(config: &AppConfig) -> Result<OmadaCache> {
    let mut cache_config = config.cache.clone();
    cache_config.auto_cleanup = false;
    let path = cache_config.resolved_database_path();

    OmadaCache::open(cache_config)
        .await
        .with_context(|| format!("Failed to open cache database {}", path.display()))
}

async fn run_command(
    cache: &OmadaCache,
    command: Commands,
    formatter: &dyn ReportFormatter,
) -> Result<()> {
    let rendered = match command {
        Commands::Stats => formatter.format_stats(
            &cache
                .stats()
                .await
                .context("Failed to read stats")?,
        )?,
        Commands::View {
            limit,
            include_expired,
        } => formatter.format_contents(
            &cache
                .view_contents(limit, include_expired)
                .await
                .context("Failed to read cache contents")?,
        )?,
        Commands::Efficiency => formatter.format_efficiency(
            &cache
                .efficiency()
                .await
                .context("Failed to compute efficiency")?,
        )?,
        Commands::Cleanup => formatter.format_cleanup(
            &cache
                .cleanup_expired()
                .await
                .context("Failed to clean up expired entries")?,
        )?,
        Commands::Invalidate {
            endpoint,
            params,
            all,
        } => {
            let params = params.as_deref().map(parse_params).transpose()?;
            let scope = if all {
                InvalidationScope::All
            } else {
                InvalidationScope::from_parts(endpoint.as_deref(), params.as_ref())?
            };
            let description = describe_scope(&scope);
            let removed = cache
                .invalidate(scope)
                .await
                .context("Failed to invalidate cache entries")?;
            formatter.format_invalidation(&InvalidationSummary {
                scope: description,
                removed,
            })?
        }
        Commands::Get { endpoint, params } => {
            let params = parse_params(&params)?;
            let hit = cache.get(&endpoint, &params).await;
            formatter.format_lookup(&endpoint, hit.as_ref())?
        }
        Commands::Identity { email, uid } => {
            let (what, hit) = match (email, uid) {
                (Some(email), _) => {
                    let hit = cache.get_identity_by_email(&email).await;
                    (format!("email {email}"), hit)
                }
                (None, Some(uid)) => {
                    let hit = cache.get_identity_by_uid(&uid).await;
                    (format!("uid {uid}"), hit)
                }
                (None, None) => anyhow::bail!("Either --email or --uid is required"),
            };
            formatter.format_lookup(&what, hit.as_ref())?
        }
        Commands::Sweep => return sweep_command(cache).await,
        Commands::Ttl { .. } | Commands::Config { .. } | Commands::Completions { .. } => {
            return Ok(());
        }
    };

    println!("{rendered}");
    Ok(())
}

async fn sweep_command(cache: &OmadaCache) -> Result<()> {
    let report = cache
        .cleanup_expired()
        .await
        .context("Failed to clean up expired entries")?;
    eprintln!("Removed {} expired entries", report.total());

    cache.start_sweeper().await;
    eprintln!(
        "{}",
        format!(
            "Sweeping every {}s; press Ctrl-C to stop",
            cache.sweep_interval().as_secs()
        )
        .bold()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    cache.stop_sweeper().await;
    eprintln!("Sweeper stopped");
    Ok(())
}

fn config_command(manager: &ConfigManager, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Get { key } => match manager.get(&key) {
            Ok(value) => {
                println!("{value}");
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::List => {
            let items = manager.list()?;
            eprintln!("{}", "Configuration:".bold().blue());
            eprintln!("Config file: {}", manager.get_config_path().display());
            eprintln!();
            for (key, value) in items {
                println!("{key} = {value}");
            }
        }
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
        }
    }
    Ok(())
}

fn parse_params(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Invalid --params JSON: {raw}"))
}

fn describe_scope(scope: &InvalidationScope) -> String {
    match scope {
        InvalidationScope::Entry { endpoint, .. } => format!("entry under {endpoint}"),
        InvalidationScope::Endpoint(endpoint) => format!("endpoint {endpoint}"),
        InvalidationScope::All => "all stores".to_string(),
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
