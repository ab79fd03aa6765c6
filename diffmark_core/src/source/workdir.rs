//! Line changes between HEAD and the working tree, read through libgit2.

use std::cell::RefCell;
use std::path::Path;
use std::sync::Mutex;

use git2::{DiffDelta, DiffLine, DiffOptions};
use tracing::debug;

use super::ChangeSource;
use crate::{
    config::SearchConfig,
    repository::{display_path, Repository},
    ChangeKind, LineChange, RepositoryFileChange, Result,
};

/// Diffs the HEAD tree (or an empty tree on an unborn branch) against the
/// working directory, staged changes included.
#[derive(Debug)]
pub struct WorkdirChangeSource {
    id: String,
    repository: Mutex<Repository>,
    include_untracked: bool,
    trim_added_indentation: bool,
}

impl WorkdirChangeSource {
    /// Build a source over an opened repository.
    #[must_use]
    pub fn new(repository: Repository, config: &SearchConfig) -> Self {
        Self {
            id: repository.root_display(),
            repository: Mutex::new(repository),
            include_untracked: config.include_untracked,
            trim_added_indentation: config.trim_added_indentation,
        }
    }

    /// Open the repository containing `path` and build a source over it.
    ///
    /// # Errors
    ///
    /// Propagates [`Repository::open`] failures.
    pub fn open(path: impl AsRef<Path>, config: &SearchConfig) -> Result<Self> {
        Ok(Self::new(Repository::open(path)?, config))
    }

    fn collect(&self, repository: &Repository) -> Result<Vec<RepositoryFileChange>> {
        let head = repository.head_tree()?;
        let mut options = DiffOptions::new();
        options
            .include_untracked(self.include_untracked)
            .recurse_untracked_dirs(self.include_untracked)
            .show_untracked_content(self.include_untracked);

        let diff = repository
            .git()
            .diff_tree_to_workdir_with_index(head.as_ref(), Some(&mut options))?;

        // Both callbacks need the file list; libgit2 invokes them in file order.
        let files: RefCell<Vec<RepositoryFileChange>> = RefCell::new(Vec::new());
        diff.foreach(
            &mut |delta, _progress| {
                if let Some(relative) = delta_path(&delta) {
                    let full = display_path(&repository.root().join(&relative));
                    files
                        .borrow_mut()
                        .push(RepositoryFileChange::new(full, relative, Vec::new()));
                }
                true
            },
            None,
            None,
            Some(&mut |delta, _hunk, line| {
                if delta.flags().is_binary() {
                    return true;
                }
                if let Some(change) = self.line_change(&line) {
                    let mut files = files.borrow_mut();
                    let relative = delta_path(&delta);
                    if let Some(file) = files
                        .last_mut()
                        .filter(|file| Some(&file.file_path) == relative.as_ref())
                    {
                        file.changes.push(change);
                    }
                }
                true
            }),
        )?;

        let mut files = files.into_inner();
        files.retain(|file| !file.changes.is_empty());
        debug!(
            source = %self.id,
            files = files.len(),
            lines = files.iter().map(|file| file.changes.len()).sum::<usize>(),
            "collected workdir changes"
        );
        Ok(files)
    }

    fn line_change(&self, line: &DiffLine<'_>) -> Option<LineChange> {
        let (kind, number) = match line.origin() {
            '+' => (ChangeKind::Add, line.new_lineno()?),
            '-' => (ChangeKind::Del, line.old_lineno()?),
            ' ' => (ChangeKind::Normal, line.new_lineno()?),
            _ => return None,
        };

        let text = String::from_utf8_lossy(line.content());
        let mut content = strip_line_ending(&text);
        if self.trim_added_indentation && kind == ChangeKind::Add {
            content = content.trim_start_matches(|c: char| c == ' ' || c == '\t');
        }

        Some(LineChange::new(number.saturating_sub(1), content, kind))
    }
}

impl ChangeSource for WorkdirChangeSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn file_changes(&self) -> Result<Vec<RepositoryFileChange>> {
        let repository = self.repository.lock()?;
        self.collect(&repository)
    }
}

fn delta_path(delta: &DiffDelta<'_>) -> Option<String> {
    delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())
        .map(|path| path.to_string_lossy().replace('\\', "/"))
}

fn strip_line_ending(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}
