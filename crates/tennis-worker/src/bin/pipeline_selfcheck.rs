//! Runs the scripted synthetic match through the executor and prints the
//! resulting match statistics as JSON.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tennis_models::JobState;
use tennis_worker::{
    metrics, JobExecutor, MatchPipeline, MemorySink, PipelineConfig, SyntheticMatch, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let prometheus = metrics::init_metrics()?;
    let worker_config = WorkerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env()?;
    info!("Worker config: {:?}", worker_config);

    let synthetic = SyntheticMatch::new("selfcheck");
    let sink = Arc::new(MemorySink::new());
    let pipeline = MatchPipeline::new(pipeline_config, synthetic.models.clone());
    let executor = JobExecutor::new(worker_config, pipeline, sink.clone());

    let handle = executor
        .submit(synthetic.job.clone(), Box::new(synthetic.source()))
        .await?;
    let state = handle.join().await;
    executor.shutdown_and_wait().await;

    if state != JobState::Completed {
        let reason = sink
            .failures()
            .first()
            .map(|f| f.message.clone())
            .unwrap_or_else(|| "no failure recorded".to_string());
        anyhow::bail!("pipeline-selfcheck: job ended {}: {}", state.as_str(), reason);
    }

    let result = sink
        .results()
        .pop()
        .ok_or_else(|| anyhow::anyhow!("pipeline-selfcheck: no result committed"))?;
    println!("{}", serde_json::to_string_pretty(&result.stats)?);

    if std::env::var("SELFCHECK_PRINT_METRICS").is_ok() {
        println!("{}", prometheus.render());
    }
    println!(
        "pipeline-selfcheck: ok ({} shots, {} points, {} degradations)",
        result.shots.len(),
        result.points.len(),
        result.degradations.len()
    );
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("tennis=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
