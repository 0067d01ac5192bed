use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptLanguage {
    Python,
}

impl ScriptLanguage {
    pub fn file_name(&self) -> &'static str {
        match self {
            ScriptLanguage::Python => "script.py",
        }
    }
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptLanguage::Python => f.write_str("python"),
        }
    }
}

/// A compiled, self-contained automation script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub source: String,
    /// BLAKE3 hex digest of `source`
    pub digest: String,
    pub language: ScriptLanguage,
}

impl GeneratedScript {
    pub fn python(source: String) -> Self {
        let digest = blake3::hash(source.as_bytes()).to_hex().to_string();
        Self {
            source,
            digest,
            language: ScriptLanguage::Python,
        }
    }
}
