//! Change sources feed line-level diff records into search passes.

mod registry;
mod workdir;

use crate::{RepositoryFileChange, Result};

pub use registry::SourceRegistry;
pub use workdir::WorkdirChangeSource;

/// Producer of per-file line changes, typically one per repository.
pub trait ChangeSource: Send + Sync {
    /// Stable identifier used for lookup and for keying results.
    fn id(&self) -> &str;

    /// Collect the current line changes.
    ///
    /// Content carries no diff marker and no line terminator. Line numbers
    /// are zero-based.
    ///
    /// # Errors
    ///
    /// Implementors surface backend failures such as libgit2 errors.
    fn file_changes(&self) -> Result<Vec<RepositoryFileChange>>;
}

/// Fixed set of file changes, for hosts that produce diffs themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticChangeSource {
    id: String,
    files: Vec<RepositoryFileChange>,
}

impl StaticChangeSource {
    /// Wrap already collected file changes.
    pub fn new(id: impl Into<String>, files: Vec<RepositoryFileChange>) -> Self {
        Self {
            id: id.into(),
            files,
        }
    }
}

impl ChangeSource for StaticChangeSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn file_changes(&self) -> Result<Vec<RepositoryFileChange>> {
        Ok(self.files.clone())
    }
}
