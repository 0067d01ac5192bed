use clap::Subcommand;

use super::artifacts::ArtifactsArgs;
use super::compile::CompileArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Compile an exploration result and run the repair loop
    Run(RunArgs),

    /// Generate the initial script without executing it
    Compile(CompileArgs),

    /// List the stored artifacts of a job
    Artifacts(ArtifactsArgs),
}
