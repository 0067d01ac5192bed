use std::sync::Arc;

use anyhow::Result;
use artifact_store::{ArtifactStore, FsArtifactStore};
use clap::Args;
use scry_cli::config::ScryConfig;
use scry_cli::service::collect_job_artifacts;
use scry_core_types::{ArtifactRef, JobId};

use super::output::{print_json, OutputFormat};

#[derive(Args, Clone)]
pub struct ArtifactsArgs {
    /// Job identifier printed by `scry run`
    #[arg(long)]
    pub job_id: String,
}

pub async fn cmd_artifacts(
    args: ArtifactsArgs,
    config: &ScryConfig,
    output: OutputFormat,
) -> Result<()> {
    let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&config.artifacts_root));
    let job_id = JobId::from(args.job_id.as_str());
    let artifacts = collect_job_artifacts(store.as_ref(), &job_id).await?;

    match output {
        OutputFormat::Json => print_json(&artifacts)?,
        OutputFormat::Text => {
            if artifacts.is_empty() {
                println!("No artifacts stored for job {job_id}");
                return Ok(());
            }
            println!("Job {job_id}");
            match &artifacts.script {
                Some(script) => println!("  script: {script}"),
                None => println!("  script: -"),
            }
            print_group("screenshots", &artifacts.screenshots);
            print_group("html", &artifacts.html_snapshots);
            print_group("data", &artifacts.data);
        }
    }
    Ok(())
}

fn print_group(label: &str, refs: &[ArtifactRef]) {
    println!("  {label} ({})", refs.len());
    for artifact in refs {
        println!("    {artifact}");
    }
}
