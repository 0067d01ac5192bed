use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use artifact_store::{ArtifactStore, FsArtifactStore};
use clap::Args;
use script_executor::{ProcessScriptExecutor, ScriptExecutor};
use scry_cli::config::ScryConfig;
use scry_cli::job::{AttemptOutcome, TerminalResult};
use scry_cli::orchestrator::RepairOrchestrator;
use scry_cli::service::ScryService;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::compile::read_exploration;
use super::output::{print_json, OutputFormat};

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Exploration result (JSON)
    #[arg(value_name = "FILE")]
    pub exploration: PathBuf,

    /// Secret value as NAME=VALUE; repeatable
    #[arg(long = "secret", value_name = "NAME=VALUE")]
    pub secrets: Vec<String>,

    /// Override the configured repair budget
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

pub async fn cmd_run(args: RunArgs, config: &ScryConfig, output: OutputFormat) -> Result<()> {
    let mut config = config.clone();
    if let Some(max) = args.max_attempts {
        config.max_repair_attempts = max;
    }
    if args.headed {
        config.executor.headless = false;
    }
    config.validate()?;

    let secrets = parse_secrets(&args.secrets)?;
    let exploration = read_exploration(&args.exploration).await?;

    let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&config.artifacts_root));
    let executor: Arc<dyn ScriptExecutor> = Arc::new(
        ProcessScriptExecutor::new(config.executor.clone(), Arc::clone(&store))
            .with_secrets(secrets),
    );

    let cancel = CancellationToken::new();
    let orchestrator =
        RepairOrchestrator::new(&config, executor, store).with_cancellation(cancel.clone());
    let service = ScryService::new(orchestrator);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling after the current phase");
            cancel.cancel();
        }
    });

    let job_id = service
        .submit_plan(&exploration)
        .context("Invalid exploration result")?;
    info!(job_id = %job_id, "running repair loop");
    let result = service.run_repair_loop(&job_id).await?;

    match output {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_summary(&result, &config),
    }

    match &result.reason {
        None => Ok(()),
        Some(reason) => Err(anyhow!("job {} failed: {reason}", result.job_id)),
    }
}

fn parse_secrets(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut secrets = BTreeMap::new();
    for entry in raw {
        let Some((name, value)) = entry.split_once('=') else {
            bail!("invalid secret '{entry}', expected NAME=VALUE");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("secret name is empty in '{entry}'");
        }
        secrets.insert(name.to_string(), value.to_string());
    }
    Ok(secrets)
}

fn print_summary(result: &TerminalResult, config: &ScryConfig) {
    println!("Job {}", result.job_id);
    for attempt in &result.attempts {
        let outcome = match &attempt.outcome {
            AttemptOutcome::Success => "success".to_string(),
            AttemptOutcome::Failure {
                kind, step_index, ..
            } => match step_index {
                Some(step) => format!("{kind} at step {step}"),
                None => kind.to_string(),
            },
            AttemptOutcome::Aborted { message } => format!("aborted: {message}"),
        };
        println!(
            "  attempt {} ({} patches, {}ms): {outcome}",
            attempt.number,
            attempt.patches.len(),
            attempt.duration_ms
        );
        if let Some(diagnosis) = &attempt.diagnosis {
            println!("    diagnosis: {diagnosis}");
        }
    }
    match &result.reason {
        None => println!("Succeeded"),
        Some(reason) => println!("Failed: {reason}"),
    }
    if let Some(script) = &result.script_ref {
        println!(
            "Script: {}",
            config.artifacts_root.join(script.as_str()).display()
        );
    }
    if let Some(data) = &result.data {
        match serde_json::to_string_pretty(data) {
            Ok(pretty) => println!("{pretty}"),
            Err(err) => warn!(error = %err, "failed to render extracted data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_parse_name_value_pairs() {
        let parsed = parse_secrets(&["password=hunter2=x".into(), " user =bob".into()]).unwrap();
        assert_eq!(parsed.get("password").map(String::as_str), Some("hunter2=x"));
        assert_eq!(parsed.get("user").map(String::as_str), Some("bob"));
        assert!(parse_secrets(&["novalue".into()]).is_err());
        assert!(parse_secrets(&["=x".into()]).is_err());
    }
}
