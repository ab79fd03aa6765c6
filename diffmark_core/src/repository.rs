//! Repository discovery on top of libgit2.

use std::fmt;
use std::path::{Path, PathBuf};

use git2::{ErrorClass, ErrorCode, Repository as GitRepository, Tree};

use crate::{Error, Result};

/// Handle to a non-bare git repository whose working tree gets searched.
pub struct Repository {
    inner: GitRepository,
    root: PathBuf,
}

impl Repository {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be canonicalized, is not inside a
    /// git repository, or belongs to a bare repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let original = path.as_ref();
        let canonical = std::fs::canonicalize(original).map_err(|source| Error::Io {
            path: display_path(original),
            source,
        })?;

        let repo = match GitRepository::discover(&canonical) {
            Ok(repo) => repo,
            Err(err)
                if err.class() == ErrorClass::Repository && err.code() == ErrorCode::NotFound =>
            {
                return Err(Error::NotARepository {
                    path: display_path(&canonical),
                })
            }
            Err(err) => return Err(Error::from(err)),
        };

        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::BareRepository {
                path: display_path(&canonical),
            })?;

        Ok(Self { inner: repo, root })
    }

    /// Absolute path of the working tree root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working tree root as a string, without the trailing separator libgit2
    /// reports.
    #[must_use]
    pub fn root_display(&self) -> String {
        let root = display_path(&self.root);
        let trimmed = root.trim_end_matches(|c: char| c == '/' || c == '\\');
        if trimmed.is_empty() {
            root.clone()
        } else {
            trimmed.to_owned()
        }
    }

    pub(crate) const fn git(&self) -> &GitRepository {
        &self.inner
    }

    /// Tree of the commit HEAD points at, or `None` on an unborn branch.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving HEAD to a tree.
    pub fn head_tree(&self) -> Result<Option<Tree<'_>>> {
        let head = match self.inner.head() {
            Ok(head) => head,
            Err(err)
                if matches!(
                    (err.class(), err.code()),
                    (
                        ErrorClass::Reference,
                        ErrorCode::NotFound | ErrorCode::UnbornBranch
                    )
                ) =>
            {
                return Ok(None)
            }
            Err(err) => return Err(Error::from(err)),
        };

        Ok(Some(head.peel_to_tree()?))
    }
}

pub(crate) fn display_path(path: &Path) -> String {
    path.to_path_buf()
        .into_os_string()
        .to_string_lossy()
        .into_owned()
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{IndexAddOption, Repository as GitRepository};
    use tempfile::TempDir;

    #[test]
    fn open_discovers_from_subdirectory() -> Result<()> {
        let temp = TempDir::new().expect("tempdir");
        GitRepository::init(temp.path())?;
        let nested = temp.path().join("src").join("nested");
        std::fs::create_dir_all(&nested).expect("create dirs");

        let repo = Repository::open(&nested)?;
        let expected = std::fs::canonicalize(temp.path()).expect("canonicalize");
        assert_eq!(
            std::fs::canonicalize(repo.root()).expect("canonicalize root"),
            expected
        );
        assert!(!repo.root_display().ends_with('/'));
        Ok(())
    }

    #[test]
    fn unborn_head_has_no_tree() -> Result<()> {
        let temp = TempDir::new().expect("tempdir");
        GitRepository::init(temp.path())?;

        let repo = Repository::open(temp.path())?;
        assert!(repo.head_tree()?.is_none());
        Ok(())
    }

    #[test]
    fn head_tree_lists_committed_files() -> Result<()> {
        let temp = TempDir::new().expect("tempdir");
        let git_repo = GitRepository::init(temp.path())?;
        std::fs::write(temp.path().join("README.md"), "hello\n").expect("write file");
        stage_and_commit(&git_repo, "Initial commit")?;

        let repo = Repository::open(temp.path())?;
        let tree = repo.head_tree()?.expect("head tree");
        assert!(tree.get_name("README.md").is_some());
        Ok(())
    }

    #[test]
    fn open_non_repository_returns_error() {
        let temp = TempDir::new().expect("tempdir");
        let err = Repository::open(temp.path());
        assert!(matches!(err, Err(Error::NotARepository { .. })));
    }

    #[test]
    fn open_bare_repository_returns_error() -> Result<()> {
        let temp = TempDir::new().expect("tempdir");
        GitRepository::init_bare(temp.path())?;
        let err = Repository::open(temp.path());
        assert!(matches!(err, Err(Error::BareRepository { .. })));
        Ok(())
    }

    #[test]
    fn open_missing_path_is_io_error() {
        let temp = TempDir::new().expect("tempdir");
        let err = Repository::open(temp.path().join("missing"));
        assert!(matches!(err, Err(Error::Io { .. })));
    }

    fn stage_and_commit(repo: &GitRepository, message: &str) -> Result<()> {
        let mut index = repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let signature = git2::Signature::now("Test User", "test@example.com")?;
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[])?;
        Ok(())
    }
}
