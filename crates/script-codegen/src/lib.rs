//! Script code generation
//!
//! Compiles an optimized plan plus the job's patch set into a Playwright
//! Python script. Output depends only on those two inputs; run-specific
//! values (output directory, headless mode, step timeout, secrets) are read
//! by the script at runtime.

pub mod errors;
pub mod generator;
mod python;
mod template;
pub mod types;

pub use errors::CodegenError;
pub use generator::CodeGenerator;
pub use types::{GeneratedScript, ScriptLanguage};

/// Environment variable carrying the headless flag ("0" disables)
pub const ENV_HEADLESS: &str = "SCRY_HEADLESS";
/// Environment variable carrying the per-step timeout in milliseconds
pub const ENV_STEP_TIMEOUT_MS: &str = "SCRY_STEP_TIMEOUT_MS";
/// Exit code of a script stopped by a critical step failure
pub const EXIT_CRITICAL_FAILURE: i32 = 3;
