//! Search settings, with defaults and JSON loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default ceiling, in chars per side, above which a line pair is not diffed.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 512;

/// Tuning knobs for change collection and search passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Lines longer than this on either side are reported as unmatched
    /// instead of being diffed.
    pub max_line_length: usize,
    /// Whether git sources report untracked files as added lines.
    pub include_untracked: bool,
    /// Strip leading spaces and tabs from added line content.
    pub trim_added_indentation: bool,
    /// Classify files on the rayon thread pool.
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            include_untracked: true,
            trim_added_indentation: false,
            parallel: true,
        }
    }
}

impl SearchConfig {
    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed JSON or unknown keys.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::parse(text, "<inline>")
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read and
    /// [`Error::Config`] when its contents do not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: display.clone(),
            source,
        })?;
        Self::parse(&text, &display)
    }

    fn parse(text: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| Error::Config {
            path: origin.to_owned(),
            source,
        })
    }
}
