mod config;
mod generate_cmd;
mod requeue_cmd;
mod serve_cmd;
mod status_cmd;

use anyhow::Context;
use clap::{Parser, Subcommand};

use easel_db::pool;

use config::EaselConfig;

#[derive(Parser)]
#[command(name = "easel", about = "Prompt-generation orchestrator for AI render pipelines")]
struct Cli {
    /// Database URL (overrides EASEL_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write an easel config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/easel")]
        db_url: String,
        /// Base URL of the generation backend
        #[arg(long, default_value = "https://api.openai.com/v1")]
        backend_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the easel database (requires config file or env vars)
    DbInit,
    /// Compile a template, drive the generation backend, and enqueue render jobs
    Generate {
        /// Template with `::`-delimited sections (may contain {prompt})
        template: String,
        /// Original prompt text substituted for {prompt}
        prompt: String,
        /// Model identifier (append --thinking for extended reasoning)
        #[arg(long)]
        model: Option<String>,
        /// Answer count for sections without an explicit prefix
        #[arg(long, default_value_t = 4)]
        count: usize,
        /// Initial sampling temperature
        #[arg(long, default_value_t = 1.0)]
        temperature: f32,
        /// Deadline for the whole operation, in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// Print the combined prompts without enqueueing jobs
        #[arg(long)]
        dry_run: bool,
    },
    /// Show job counts by render status
    Status,
    /// Requeue a failed job (or all failed jobs with --all)
    Requeue {
        /// Job ID to requeue
        job_id: Option<String>,
        /// Requeue every failed job
        #[arg(long)]
        all: bool,
    },
    /// Serve the render-worker polling API
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port
        #[arg(long, default_value_t = 8943)]
        port: u16,
    },
}

/// Execute the `easel init` command: write config file.
fn cmd_init(db_url: &str, backend_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        backend: config::BackendSection {
            url: backend_url.to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  backend.url = {backend_url}");
    println!();
    println!("Set backend.api_key (or EASEL_BACKEND_API_KEY), then run `easel db-init`.");

    Ok(())
}

/// Execute the `easel db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = EaselConfig::resolve(cli_db_url)?;

    println!("Initializing easel database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;
    db_pool.close().await;

    println!("easel db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            backend_url,
            force,
        } => {
            cmd_init(&db_url, &backend_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Generate {
            template,
            prompt,
            model,
            count,
            temperature,
            timeout,
            dry_run,
        } => {
            let resolved = EaselConfig::resolve(cli.database_url.as_deref())?;
            let result = generate_cmd::run_generate(
                &resolved,
                generate_cmd::GenerateArgs {
                    template,
                    prompt,
                    model,
                    count,
                    temperature,
                    timeout_secs: timeout,
                    dry_run,
                },
            )
            .await;
            result?;
        }
        Commands::Status => {
            let resolved = EaselConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = status_cmd::run_status(&db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Requeue { job_id, all } => {
            let resolved = EaselConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = match (job_id, all) {
                (Some(id), false) => {
                    let id = uuid::Uuid::parse_str(&id)
                        .with_context(|| format!("invalid job ID: {id}"))?;
                    requeue_cmd::run_requeue_one(&db_pool, id).await
                }
                (None, true) => requeue_cmd::run_requeue_all(&db_pool).await,
                _ => Err(anyhow::anyhow!("pass a job ID or --all, not both")),
            };
            db_pool.close().await;
            result?;
        }
        Commands::Serve { bind, port } => {
            let resolved = EaselConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            serve_cmd::run_serve(db_pool, &bind, port).await?;
        }
    }

    Ok(())
}
