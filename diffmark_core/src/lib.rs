//! Core library for diffmark's search-in-changes workflow.
//!
//! The crate is layered around three primary responsibilities:
//! - character-level edit scripts between two versions of a line
//! - classifying changed lines and extracting pattern matches from the
//!   inserted characters only
//! - collecting line changes from repositories and running search passes

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::print_stdout,
        clippy::todo,
        clippy::unwrap_used
    )
)]

/// Line classification and match position extraction.
pub mod classify;
/// Search configuration.
pub mod config;
/// Myers shortest edit script engine.
pub mod edit_script;
/// Search pattern compilation.
pub mod pattern;
/// Git repository access.
pub mod repository;
/// Search passes and supersession.
pub mod search;
/// Producers of line-level change records.
pub mod source;

use std::sync::PoisonError;

pub use diffmark_api as api;
pub use diffmark_api::{
    ChangeKind, EditOperationType, EditScript, EditScriptOperation, FileLineChanges, Filename,
    FilenameLineMap, FilesPositions, LineChange, RepositoryFileChange, TextEditorPosition,
};

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying git operation failed.
    #[error("git error: {source}")]
    Git {
        /// Original libgit2 error bubbled up by the core library.
        #[from]
        source: git2::Error,
    },
    /// Provided path does not correspond to a git repository.
    #[error("path does not reference a git repository: {path}")]
    NotARepository {
        /// Path that failed to resolve to a repository.
        path: String,
    },
    /// Bare repositories have no working tree to diff.
    #[error("repository at {path} is bare and unsupported")]
    BareRepository {
        /// Path of the repository lacking a working tree.
        path: String,
    },
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Filesystem path involved in the failed operation.
        path: String,
        /// Source I/O error returned by the standard library.
        #[source]
        source: std::io::Error,
    },
    /// Search text is not a valid regular expression.
    #[error("invalid search pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Text that failed to compile.
        pattern: String,
        /// Compilation error reported by the regex engine.
        #[source]
        source: regex::Error,
    },
    /// Configuration could not be parsed.
    #[error("invalid configuration in {path}: {source}")]
    Config {
        /// Origin of the configuration text.
        path: String,
        /// Parse error reported by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// No change source is registered under the id.
    #[error("change source is not registered: {source_id}")]
    SourceNotRegistered {
        /// Identifier that failed to resolve.
        source_id: String,
    },
    /// Internal invariant failed.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Self::Internal("lock poisoned")
    }
}
