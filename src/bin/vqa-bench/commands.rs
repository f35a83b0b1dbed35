use anyhow::Context;
use vqa_bench::{
    aggregate::{write_tables, Aggregator},
    backends::{build_judge, build_registry},
    config::BenchConfig,
    dataset::load_dataset,
    pool::ProviderPool,
    record::load_records,
    resilient::{MaxAttempts, RetryExecutor},
    run::RunManager,
};

use crate::args::{EvalArgs, RunArgs};

pub async fn run(config: &BenchConfig, args: RunArgs) -> anyhow::Result<()> {
    let trials = args.trials.unwrap_or(config.run.trials);
    let destination = args.output.unwrap_or_else(|| config.run.output_dir.clone());
    let image_root = args.image_root.or_else(|| config.run.image_root.clone());
    let require_answer_token = args.require_answer_token || config.run.require_answer_token;

    let mut resilience = config.retry.to_resilience();
    if let Some(max) = args.max_attempts {
        resilience = resilience.with_max_attempts(MaxAttempts::Finite(max.max(1)));
    }

    let entries = load_dataset(&args.dataset, image_root.as_deref())?;
    let selected = restrict_providers(config, &args.providers);
    let mut registry = build_registry(&selected)?;
    if !args.providers.is_empty() {
        registry = registry.select(&args.providers)?;
    }

    let pool = ProviderPool::new(registry, RetryExecutor::new(resilience))
        .require_answer_token(require_answer_token);
    let summary = RunManager::new(pool, trials, destination)
        .run(&entries)
        .await?;

    println!(
        "Run {} written to {}",
        summary.run_dir.name(),
        summary.run_dir.path().display()
    );
    for artifact in &summary.artifacts {
        println!("  {}", artifact.display());
    }
    if summary.failed_trials > 0 {
        println!(
            "{} trial(s) failed and were recorded with an error",
            summary.failed_trials
        );
    }
    Ok(())
}

pub async fn eval(config: &BenchConfig, args: EvalArgs) -> anyhow::Result<()> {
    let mut records = Vec::new();
    for input in &args.inputs {
        let loaded = load_records(&input.path, &input.name)
            .with_context(|| format!("loading results for {}", input.name))?;
        log::info!("{}: {} records from {}", input.name, loaded.len(), input.path.display());
        records.extend(loaded);
    }

    let mut judge_config = config.judge.clone();
    if let Some(choice) = args.judge {
        judge_config.kind = choice.into();
    }
    let judge = build_judge(
        &judge_config,
        RetryExecutor::new(config.retry.to_resilience()),
    )?;

    let evaluation = Aggregator::new(judge).evaluate(&records).await?;
    let paths = write_tables(&evaluation, &args.out_prefix)?;

    for model in &evaluation.models {
        println!("{:<24} {:.4}", model.model, model.avg_correctness);
    }
    if evaluation.judge_errors() > 0 {
        println!("{} verdict(s) could not be determined", evaluation.judge_errors());
    }
    println!("Per-question accuracy: {}", paths.per_question.display());
    println!("Per-run verdicts:      {}", paths.runs.display());
    println!("Per-model accuracy:    {}", paths.per_model.display());
    Ok(())
}

/// Drops configured providers that were not asked for, so that their
/// credentials are not required.
pub fn restrict_providers(config: &BenchConfig, names: &[String]) -> BenchConfig {
    let mut config = config.clone();
    if !names.is_empty() {
        config.providers.retain(|name, _| names.contains(name));
    }
    config
}
