//! Artifact key layout: `{job_id}/attempt-{n}/...`

use scry_core_types::{ArtifactRef, JobId};

use crate::errors::{StoreError, StoreResult};

pub const SCRIPT_FILE: &str = "script.py";
pub const PAGE_HTML_FILE: &str = "page.html";
pub const DATA_FILE: &str = "data.json";
pub const SCREENSHOTS_DIR: &str = "screenshots";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ArtifactKind {
    Script,
    Screenshot,
    PageHtml,
    Data,
    Other,
}

impl ArtifactKind {
    pub fn of(artifact: &ArtifactRef) -> Self {
        let key = artifact.as_str();
        let file = key.rsplit('/').next().unwrap_or(key);
        if file == SCRIPT_FILE {
            ArtifactKind::Script
        } else if file == PAGE_HTML_FILE {
            ArtifactKind::PageHtml
        } else if file == DATA_FILE {
            ArtifactKind::Data
        } else if key.contains(&format!("/{SCREENSHOTS_DIR}/")) && file.ends_with(".png") {
            ArtifactKind::Screenshot
        } else {
            ArtifactKind::Other
        }
    }
}

pub fn attempt_prefix(job: &JobId, attempt: u32) -> String {
    format!("{}/attempt-{attempt}", job.as_str())
}

pub fn script_key(job: &JobId, attempt: u32) -> String {
    format!("{}/{SCRIPT_FILE}", attempt_prefix(job, attempt))
}

pub fn page_html_key(job: &JobId, attempt: u32) -> String {
    format!("{}/{PAGE_HTML_FILE}", attempt_prefix(job, attempt))
}

pub fn data_key(job: &JobId, attempt: u32) -> String {
    format!("{}/{DATA_FILE}", attempt_prefix(job, attempt))
}

pub fn screenshot_key(job: &JobId, attempt: u32, file_name: &str) -> String {
    format!("{}/{SCREENSHOTS_DIR}/{file_name}", attempt_prefix(job, attempt))
}

/// Attempt number encoded in a key, if it follows the layout
pub fn attempt_of(artifact: &ArtifactRef) -> Option<u32> {
    artifact
        .as_str()
        .split('/')
        .nth(1)?
        .strip_prefix("attempt-")?
        .parse()
        .ok()
}

/// Rejects keys that are empty, absolute or contain `.`/`..` segments
pub fn validate_key(key: &str) -> StoreResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
