use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use plan_ir::{build_plan, ExplorationResult};
use plan_optimizer::Optimizer;
use script_codegen::CodeGenerator;
use scry_cli::config::ScryConfig;
use scry_core_types::PatchSet;
use tokio::fs;
use tracing::info;

#[derive(Args, Clone)]
pub struct CompileArgs {
    /// Exploration result (JSON)
    #[arg(value_name = "FILE")]
    pub exploration: PathBuf,

    /// Write the script here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

pub async fn cmd_compile(args: CompileArgs, config: &ScryConfig) -> Result<()> {
    let exploration = read_exploration(&args.exploration).await?;
    let plan = build_plan(&exploration).context("Invalid exploration result")?;
    let optimized = Optimizer::new(config.optimizer.clone())
        .optimize(&plan, None)
        .context("Plan optimization failed")?;
    let script = CodeGenerator::new()
        .generate(&optimized, &PatchSet::new())
        .context("Script generation failed")?;

    info!(
        steps = optimized.len(),
        digest = %script.digest,
        "script compiled"
    );
    match args.out {
        Some(path) => {
            fs::write(&path, script.source.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        None => print!("{}", script.source),
    }
    Ok(())
}

pub async fn read_exploration(path: &Path) -> Result<ExplorationResult> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read exploration file {}", path.display()))?;
    ExplorationResult::from_json(&raw)
        .with_context(|| format!("Failed to parse exploration file {}", path.display()))
}
