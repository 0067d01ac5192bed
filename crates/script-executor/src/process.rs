//! Child-process executor

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use artifact_store::layout::{data_key, page_html_key, screenshot_key, script_key};
use artifact_store::{ArtifactKind, ArtifactStore};
use async_trait::async_trait;
use plan_ir::FillValue;
use scry_core_types::{ArtifactRef, FailureKind, FailureReport};
use script_codegen::{ENV_HEADLESS, ENV_STEP_TIMEOUT_MS};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::errors::ExecutorError;
use crate::events::EventLog;
use crate::types::{ExecutionOutcome, ExecutionReport, ExecutionRequest, ScriptExecutor};

const STDERR_TAIL_BYTES: usize = 2_000;
const OUTPUT_DIR: &str = "out";
/// How long stderr may stay open after the process group was killed
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Runs scripts as `interpreter script.py out_dir` in a fresh scratch directory
pub struct ProcessScriptExecutor {
    config: ExecutorConfig,
    store: Arc<dyn ArtifactStore>,
    secrets: BTreeMap<String, String>,
}

impl ProcessScriptExecutor {
    pub fn new(config: ExecutorConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            config,
            store,
            secrets: BTreeMap::new(),
        }
    }

    /// Secret values by name; exposed to the child only through its environment
    pub fn with_secrets(mut self, secrets: BTreeMap<String, String>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    async fn persist_outputs(
        &self,
        request: &ExecutionRequest,
        out_dir: &Path,
    ) -> Result<(Vec<ArtifactRef>, Option<ArtifactRef>), ExecutorError> {
        let mut stored = Vec::new();

        let screenshots_dir = out_dir.join("screenshots");
        let mut names = Vec::new();
        if let Ok(mut entries) = tokio::fs::read_dir(&screenshots_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.ends_with(".png") {
                    names.push(name);
                }
            }
        }
        names.sort_by_key(|name| screenshot_order(name));
        for name in names {
            let bytes = match tokio::fs::read(screenshots_dir.join(&name)).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(file = %name, error = %err, "unreadable screenshot skipped");
                    continue;
                }
            };
            let key = screenshot_key(&request.job_id, request.attempt, &name);
            stored.push(self.store.put(&key, bytes).await?);
        }

        let mut html_ref = None;
        if let Ok(html) = tokio::fs::read(out_dir.join("page.html")).await {
            let key = page_html_key(&request.job_id, request.attempt);
            let artifact = self.store.put(&key, html).await?;
            html_ref = Some(artifact.clone());
            stored.push(artifact);
        }

        Ok((stored, html_ref))
    }
}

/// Orders `step-10.png` after `step-9.png`
fn screenshot_order(name: &str) -> (usize, String) {
    let index = name
        .strip_prefix("step-")
        .and_then(|rest| rest.strip_suffix(".png"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX);
    (index, name.to_string())
}

/// Kills every process in the child's group, including browser and driver
/// processes the interpreter started.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this child.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn stderr_tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

#[async_trait]
impl ScriptExecutor for ProcessScriptExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport, ExecutorError> {
        let started = Instant::now();
        let script_ref = self
            .store
            .put(
                &script_key(&request.job_id, request.attempt),
                request.script.source.clone().into_bytes(),
            )
            .await?;

        let scratch = tempfile::tempdir().map_err(|err| ExecutorError::Spawn(err.to_string()))?;
        let script_path = scratch.path().join(request.script.language.file_name());
        let out_dir = scratch.path().join(OUTPUT_DIR);
        tokio::fs::write(&script_path, request.script.source.as_bytes())
            .await
            .map_err(|err| ExecutorError::Spawn(err.to_string()))?;
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|err| ExecutorError::Spawn(err.to_string()))?;

        let mut command = Command::new(&self.config.interpreter);
        command
            .arg(&script_path)
            .arg(&out_dir)
            .current_dir(scratch.path())
            .env(ENV_HEADLESS, if self.config.headless { "1" } else { "0" })
            .env(ENV_STEP_TIMEOUT_MS, self.config.step_timeout_ms.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        for (name, value) in &self.secrets {
            command.env(FillValue::env_var(name), value);
        }

        info!(
            job_id = %request.job_id,
            attempt = request.attempt,
            digest = %request.script.digest,
            "executing script"
        );
        let mut child = command.spawn().map_err(|err| {
            ExecutorError::Spawn(format!("{}: {err}", self.config.interpreter))
        })?;
        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::Spawn("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutorError::Spawn("stderr not captured".to_string()))?;
        let mut stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(err) = stderr.read_to_end(&mut buf).await {
                debug!(error = %err, "stderr read interrupted");
            }
            buf
        });

        let mut log = EventLog::default();
        let run = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                log.ingest(&line);
            }
            child.wait().await
        };
        let status = match tokio::time::timeout(self.config.overall_timeout(), run).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(err)) => return Err(ExecutorError::Spawn(err.to_string())),
            Err(_) => {
                warn!(
                    job_id = %request.job_id,
                    attempt = request.attempt,
                    timeout_ms = self.config.overall_timeout_ms,
                    "script exceeded overall timeout; killing"
                );
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                if let Err(err) = child.kill().await {
                    debug!(error = %err, "kill after timeout failed");
                }
                None
            }
        };
        let stderr_bytes = match tokio::time::timeout(STDERR_GRACE, &mut stderr_task).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                debug!(job_id = %request.job_id, "stderr still open; abandoning reader");
                stderr_task.abort();
                Vec::new()
            }
        };

        let (mut artifacts, html_ref) = self.persist_outputs(&request, &out_dir).await?;
        let last_screenshot = artifacts
            .iter()
            .rev()
            .find(|artifact| ArtifactKind::of(artifact) == ArtifactKind::Screenshot)
            .cloned();

        let failure = |kind: FailureKind, step: Option<usize>, message: String| {
            let mut report = FailureReport::new(kind, step, message);
            report.screenshot = last_screenshot.clone();
            report.html = html_ref.clone();
            ExecutionOutcome::Failure(report)
        };

        let outcome = match (status, log.failed.take(), log.result.take()) {
            (None, _, _) => failure(
                FailureKind::Timeout,
                log.last_started,
                format!(
                    "script exceeded overall timeout of {}ms",
                    self.config.overall_timeout_ms
                ),
            ),
            (Some(_), Some((step, kind, message)), _) => failure(kind, Some(step), message),
            (Some(status), None, Some(data)) if status.success() => {
                let key = data_key(&request.job_id, request.attempt);
                let bytes = serde_json::to_vec_pretty(&data)
                    .map_err(|err| artifact_store::StoreError::Internal(err.to_string()))?;
                artifacts.push(self.store.put(&key, bytes).await?);
                ExecutionOutcome::Success { data }
            }
            (Some(status), None, _) => {
                let tail = stderr_tail(&stderr_bytes);
                let message = if tail.is_empty() {
                    format!("script exited with {status} before reporting a result")
                } else {
                    tail
                };
                failure(FailureKind::UnhandledException, None, message)
            }
        };

        artifacts.insert(0, script_ref.clone());
        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            ExecutionOutcome::Success { .. } => info!(
                job_id = %request.job_id,
                attempt = request.attempt,
                duration_ms,
                "script succeeded"
            ),
            ExecutionOutcome::Failure(report) => info!(
                job_id = %request.job_id,
                attempt = request.attempt,
                kind = %report.kind,
                step = ?report.step_index,
                duration_ms,
                "script failed"
            ),
        }

        Ok(ExecutionReport {
            outcome,
            script_ref,
            artifacts,
            duration_ms,
        })
    }
}
