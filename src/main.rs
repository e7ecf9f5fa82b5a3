use anyhow::Context;
use tracing::{Instrument, debug, info};
use uuid::Uuid;

use pattern_dispatch::config::{CliArgs, PoolConfig};
use pattern_dispatch::error::ConfigError;
use pattern_dispatch::jobs::{DirectoryJobSource, JobSource, ReferenceSet, Verdict, verify};
use pattern_dispatch::pool::run_pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the per-test verdicts.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = match CliArgs::from_args(std::env::args()) {
        Ok(args) => args,
        Err(ConfigError::Usage(usage)) => {
            eprintln!("{usage}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let config = PoolConfig::from_env().context("Invalid pool configuration")?;
    config.validate().context("Invalid pool configuration")?;

    let span = tracing::info_span!("run", run_id = %Uuid::new_v4());
    run(args, config).instrument(span).await
}

async fn run(args: CliArgs, config: PoolConfig) -> anyhow::Result<()> {
    info!(
        dir = %args.tests_dir.display(),
        tests = args.test_count,
        participants = config.participants,
        kernel = %config.kernel,
        "Run started"
    );

    let jobs = DirectoryJobSource::new(args.tests_dir.clone(), args.test_count)
        .load()
        .await
        .with_context(|| format!("Failed to load jobs from {}", args.tests_dir.display()))?;
    let references = ReferenceSet::load(&args.tests_dir, args.test_count)
        .await
        .with_context(|| {
            format!(
                "Failed to load references from {}",
                args.tests_dir.display()
            )
        })?;

    let summary = run_pool(jobs, &config)
        .await
        .context("Pattern search aborted")?;
    for report in &summary.workers {
        debug!(worker = %report.worker, jobs = report.jobs_completed, "Worker report");
    }

    let mut failed = 0;
    for result in &summary.results {
        let reference = references
            .get(result.job_id)
            .with_context(|| format!("No reference for test {}", result.job_id))?;
        let verdict = verify(result, reference);
        println!("test {}: {}", result.job_id, verdict.label());
        if let Verdict::Failed(mismatch) = &verdict {
            eprintln!("test {}: {mismatch}", result.job_id);
            failed += 1;
        }
    }

    info!(
        tests = summary.results.len(),
        failed,
        "Run complete"
    );
    Ok(())
}
