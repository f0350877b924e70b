//! The `easel generate` command: run the orchestration engine against a
//! template and commit the combined prompts to the render queue.

use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use easel_core::backend::openai::{DEFAULT_TIMEOUT, OpenAiBackend};
use easel_core::orchestrator::{self, GenerationRequest};
use easel_db::pool;

use crate::config::EaselConfig;

pub struct GenerateArgs {
    pub template: String,
    pub prompt: String,
    pub model: Option<String>,
    pub count: usize,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub dry_run: bool,
}

pub async fn run_generate(config: &EaselConfig, args: GenerateArgs) -> Result<()> {
    let model = args.model.unwrap_or_else(|| config.default_model.clone());

    let backend = OpenAiBackend::with_config(
        config.backend_url.clone(),
        config.backend_api_key.clone(),
        DEFAULT_TIMEOUT,
    )?;

    let mut request = GenerationRequest::new(args.template, args.prompt, model, args.count);
    request.initial_temperature = args.temperature;
    request.deadline = Duration::from_secs(args.timeout_secs);

    // Ctrl+C cancels in-flight segments instead of killing the process
    // mid-write.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    if args.dry_run {
        let prompts = orchestrator::generate_prompts(&backend, &request, &cancel).await?;
        println!("Would enqueue {} job(s):", prompts.len());
        for prompt in &prompts {
            println!("  {prompt}");
        }
        return Ok(());
    }

    let db_pool = pool::create_pool(&config.db_config).await?;
    let result = orchestrator::run_generation(&db_pool, &backend, &request, &cancel).await;
    db_pool.close().await;

    let jobs = result?;
    println!("Enqueued {} job(s):", jobs.len());
    for job in &jobs {
        println!("  {}  {}", job.id, job.prompt);
    }

    Ok(())
}
