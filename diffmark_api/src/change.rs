use serde::{Deserialize, Serialize};

use crate::FilenameLineMap;

/// Role a line plays in a line-level diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Line exists only in the current version.
    Add,
    /// Line exists only in the previous version.
    Del,
    /// Unchanged context line.
    Normal,
}

impl ChangeKind {
    /// Whether the line takes part in edit script computation.
    pub const fn is_edit(self) -> bool {
        matches!(self, Self::Add | Self::Del)
    }
}

/// A single line-level diff primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    /// Zero-based line index. Current-version addressing for `add` and
    /// `normal`, previous-version addressing for `del`.
    pub line: u32,
    /// Line text without its diff marker.
    pub content: String,
    /// Whether the line was added, deleted or kept.
    pub kind: ChangeKind,
    /// Advisory flag for result views.
    #[serde(default = "visible")]
    pub is_visible: bool,
}

const fn visible() -> bool {
    true
}

impl LineChange {
    /// Construct a visible change of the given kind.
    pub fn new(line: u32, content: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            line,
            content: content.into(),
            kind,
            is_visible: true,
        }
    }

    /// Convenience constructor for an added line.
    pub fn add(line: u32, content: impl Into<String>) -> Self {
        Self::new(line, content, ChangeKind::Add)
    }

    /// Convenience constructor for a deleted line.
    pub fn del(line: u32, content: impl Into<String>) -> Self {
        Self::new(line, content, ChangeKind::Del)
    }

    /// Convenience constructor for a context line.
    pub fn normal(line: u32, content: impl Into<String>) -> Self {
        Self::new(line, content, ChangeKind::Normal)
    }
}

/// Name and extension of a file, derived from its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filename {
    /// Everything before the last dot of the final path component.
    pub name: String,
    /// Text after the last dot, when present.
    #[serde(default)]
    pub extension: Option<String>,
}

impl Filename {
    /// Split the final component of a `/` or `\` separated path.
    pub fn from_path(path: &str) -> Self {
        let last = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
        match last.rsplit_once('.') {
            Some((name, extension)) => Self {
                name: name.to_owned(),
                extension: Some(extension.to_owned()),
            },
            None => Self {
                name: last.to_owned(),
                extension: None,
            },
        }
    }
}

/// All recorded line changes for one file of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFileChange {
    /// Absolute path of the file; keys every file-indexed map.
    pub full_file_path: String,
    /// Path relative to the repository root.
    pub file_path: String,
    /// Name and extension of the file.
    pub file_name: Filename,
    /// Line changes in diff order.
    #[serde(default)]
    pub changes: Vec<LineChange>,
}

impl RepositoryFileChange {
    /// Build a file change, deriving the file name from `file_path`.
    pub fn new(
        full_file_path: impl Into<String>,
        file_path: impl Into<String>,
        changes: Vec<LineChange>,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            full_file_path: full_file_path.into(),
            file_name: Filename::from_path(&file_path),
            file_path,
            changes,
        }
    }
}

/// Line changes grouped per file and per line.
pub type FileLineChanges = FilenameLineMap<Vec<LineChange>>;
