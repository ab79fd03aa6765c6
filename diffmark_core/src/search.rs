//! Search passes over collected changes and the session that runs them.
//!
//! A pass groups the add/del records of every file by line, extracts the
//! positions the pattern matches inside inserted text, and drops the lines
//! that did not match from the change list. The session numbers passes so a
//! newer pass makes the results of any older, still running pass worthless;
//! stale passes stop between stages and never publish.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    classify::PositionExtractor, config::SearchConfig, pattern::compile_pattern,
    source::SourceRegistry, FileLineChanges, FilesPositions, RepositoryFileChange, Result,
};

/// Add/del records of a change set, both as a list and indexed per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedChanges {
    /// Files with at least one add/del record, context lines removed.
    pub files: Vec<RepositoryFileChange>,
    /// The same records keyed by full file path and line.
    pub by_line: FileLineChanges,
}

/// Keep only add/del records and index them by file and line.
#[must_use]
pub fn group_changes(files: &[RepositoryFileChange]) -> GroupedChanges {
    let mut grouped = GroupedChanges::default();
    for file in files {
        let edits: Vec<_> = file
            .changes
            .iter()
            .filter(|change| change.kind.is_edit())
            .cloned()
            .collect();
        if edits.is_empty() {
            continue;
        }

        let lines = grouped
            .by_line
            .entry(file.full_file_path.clone())
            .or_default();
        for change in &edits {
            lines.entry(change.line).or_default().push(change.clone());
        }

        grouped.files.push(RepositoryFileChange {
            changes: edits,
            ..file.clone()
        });
    }
    grouped
}

/// Drop every change on a line listed as unmatched for its file, then drop
/// files left without changes.
#[must_use]
pub fn filter_unmatched(
    files: Vec<RepositoryFileChange>,
    unmatched: &BTreeMap<String, Vec<u32>>,
) -> Vec<RepositoryFileChange> {
    files
        .into_iter()
        .filter_map(|mut file| {
            if let Some(lines) = unmatched.get(&file.full_file_path) {
                file.changes.retain(|change| !lines.contains(&change.line));
            }
            (!file.changes.is_empty()).then_some(file)
        })
        .collect()
}

/// Outputs of one pass over one change set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// Highlight positions per file and line.
    pub positions: FilesPositions,
    /// Changed files restricted to lines with a match or left unclassified.
    pub changes: Vec<RepositoryFileChange>,
}

/// Group, extract and filter a change set.
#[must_use]
pub fn run_pass(
    files: &[RepositoryFileChange],
    pattern: &Regex,
    config: &SearchConfig,
) -> SearchResults {
    let grouped = group_changes(files);
    let extraction = PositionExtractor::from_config(pattern, config).extract(&grouped.by_line);
    SearchResults {
        changes: filter_unmatched(grouped.files, &extraction.unmatched_lines),
        positions: extraction.positions,
    }
}

/// Results of a completed search across all sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    /// Pass number that produced the outcome.
    pub generation: u64,
    /// Positions of every source merged together.
    pub positions: FilesPositions,
    /// Filtered change lists keyed by source id.
    pub changes_by_source: BTreeMap<String, Vec<RepositoryFileChange>>,
}

impl SearchOutcome {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }
}

/// Handle identifying one pass; stale once a newer pass begins.
#[derive(Debug, Clone)]
pub struct PassToken {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl PassToken {
    /// Pass number of this token.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer pass has begun.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::Acquire) == self.generation
    }
}

/// Runs search passes over registered sources and keeps the newest outcome.
#[derive(Debug)]
pub struct SearchSession {
    registry: SourceRegistry,
    config: SearchConfig,
    generation: Arc<AtomicU64>,
    published: Mutex<Option<SearchOutcome>>,
}

impl SearchSession {
    /// Create a session over `registry`.
    #[must_use]
    pub fn new(registry: SourceRegistry, config: SearchConfig) -> Self {
        Self {
            registry,
            config,
            generation: Arc::new(AtomicU64::new(0)),
            published: Mutex::new(None),
        }
    }

    /// Sources searched on every pass.
    #[must_use]
    pub const fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Configuration applied to every pass.
    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Start a new pass, superseding every earlier one.
    pub fn begin_pass(&self) -> PassToken {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(generation, "began search pass");
        PassToken {
            generation,
            latest: Arc::clone(&self.generation),
        }
    }

    /// Begin a pass and run it to completion.
    ///
    /// Returns `Ok(None)` when a newer pass began while this one ran.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPattern`] for malformed search text and
    /// propagates change source failures. Published results are left
    /// untouched on error.
    pub fn search(&self, pattern_text: &str) -> Result<Option<SearchOutcome>> {
        let token = self.begin_pass();
        self.search_with_token(&token, pattern_text)
    }

    /// Run the pass identified by `token`.
    ///
    /// # Errors
    ///
    /// Same as [`SearchSession::search`].
    pub fn search_with_token(
        &self,
        token: &PassToken,
        pattern_text: &str,
    ) -> Result<Option<SearchOutcome>> {
        if !token.is_current() {
            return Ok(None);
        }
        if pattern_text.is_empty() {
            return self.publish(token, SearchOutcome::empty(token.generation));
        }

        let pattern = compile_pattern(pattern_text)?;
        let mut outcome = SearchOutcome::empty(token.generation);

        for source in self.registry.sources() {
            let files = source.file_changes()?;
            if !token.is_current() {
                debug!(generation = token.generation, "search pass superseded");
                return Ok(None);
            }

            let results = run_pass(&files, &pattern, &self.config);
            // Sources may report the same file; keep every source's lines.
            for (file, lines) in results.positions {
                let merged = outcome.positions.entry(file).or_default();
                for (line, positions) in lines {
                    merged.entry(line).or_default().extend(positions);
                }
            }
            outcome
                .changes_by_source
                .insert(source.id().to_owned(), results.changes);
        }

        self.publish(token, outcome)
    }

    /// Last published outcome, if any pass completed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Internal`] when the result lock is poisoned.
    pub fn latest(&self) -> Result<Option<SearchOutcome>> {
        Ok(self.published.lock()?.clone())
    }

    fn publish(&self, token: &PassToken, outcome: SearchOutcome) -> Result<Option<SearchOutcome>> {
        let mut published = self.published.lock()?;
        if !token.is_current() {
            debug!(generation = token.generation, "search pass superseded");
            return Ok(None);
        }

        debug!(
            generation = outcome.generation,
            sources = outcome.changes_by_source.len(),
            files = outcome.positions.len(),
            "published search outcome"
        );
        *published = Some(outcome.clone());
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{OnceLock, Weak};

    use super::*;
    use crate::{
        source::{ChangeSource, StaticChangeSource},
        Error, LineChange,
    };

    const FILE: &str = "/repo/src/lib.rs";

    fn sample_file() -> RepositoryFileChange {
        RepositoryFileChange::new(
            FILE,
            "src/lib.rs",
            vec![
                LineChange::normal(0, "use std::fmt;"),
                LineChange::del(1, "let total = 1;"),
                LineChange::add(1, "let total = 2;"),
                LineChange::add(2, "let unrelated = true;"),
                LineChange::normal(3, "}"),
            ],
        )
    }

    fn session_with(files: Vec<RepositoryFileChange>) -> SearchSession {
        let mut registry = SourceRegistry::new();
        registry.register(StaticChangeSource::new("/repo", files));
        SearchSession::new(registry, SearchConfig::default())
    }

    #[test]
    fn grouping_drops_context_lines() {
        let context_only =
            RepositoryFileChange::new("/repo/README.md", "README.md", vec![LineChange::normal(0, "x")]);
        let grouped = group_changes(&[sample_file(), context_only]);

        assert_eq!(grouped.files.len(), 1);
        assert_eq!(grouped.files[0].changes.len(), 3);
        let lines = &grouped.by_line[FILE];
        assert_eq!(lines.keys().copied().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(lines[&1].len(), 2);
        assert!(!grouped.by_line.contains_key("/repo/README.md"));
    }

    #[test]
    fn filtering_removes_unmatched_lines_and_empty_files() {
        let grouped = group_changes(&[sample_file()]);
        let mut unmatched = BTreeMap::new();
        unmatched.insert(FILE.to_owned(), vec![2]);

        let kept = filter_unmatched(grouped.files.clone(), &unmatched);
        assert_eq!(kept[0].changes.len(), 2);
        assert!(kept[0].changes.iter().all(|change| change.line == 1));

        unmatched.insert(FILE.to_owned(), vec![1, 2]);
        assert!(filter_unmatched(grouped.files, &unmatched).is_empty());
    }

    #[test]
    fn run_pass_reports_positions_and_filtered_changes() {
        let pattern = Regex::new("2").expect("regex");
        let results = run_pass(&[sample_file()], &pattern, &SearchConfig::default());

        let line = &results.positions[FILE][&1];
        assert_eq!(line.len(), 1);
        assert_eq!((line[0].pos_start, line[0].pos_end), (12, 13));
        assert!(!results.positions[FILE].contains_key(&2));

        let lines: Vec<u32> = results.changes[0]
            .changes
            .iter()
            .map(|change| change.line)
            .collect();
        assert_eq!(lines, [1, 1]);
    }

    #[test]
    fn search_publishes_outcome() -> Result<()> {
        let session = session_with(vec![sample_file()]);
        let outcome = session.search("unrelated")?.expect("current pass");

        assert_eq!(outcome.generation, 1);
        assert_eq!(outcome.positions[FILE][&2][0].pos_start, 4);
        assert_eq!(outcome.changes_by_source["/repo"][0].changes.len(), 1);
        assert_eq!(session.latest()?, Some(outcome));
        Ok(())
    }

    #[test]
    fn sources_reporting_the_same_file_are_merged() -> Result<()> {
        let mut registry = SourceRegistry::new();
        registry.register(StaticChangeSource::new(
            "/a",
            vec![RepositoryFileChange::new(
                FILE,
                "src/lib.rs",
                vec![
                    LineChange::del(1, "let total = 1;"),
                    LineChange::add(1, "let total = 2;"),
                ],
            )],
        ));
        registry.register(StaticChangeSource::new(
            "/b",
            vec![RepositoryFileChange::new(
                FILE,
                "src/lib.rs",
                vec![LineChange::add(1, "2 + 2"), LineChange::add(5, "v2")],
            )],
        ));
        let session = SearchSession::new(registry, SearchConfig::default());

        let outcome = session.search("2")?.expect("current pass");
        let lines = &outcome.positions[FILE];
        let starts = |line: u32| -> Vec<usize> {
            lines[&line]
                .iter()
                .map(|position| position.pos_start)
                .collect()
        };
        assert_eq!(starts(1), [12, 0, 4]);
        assert_eq!(starts(5), [1]);
        assert_eq!(outcome.changes_by_source.len(), 2);
        Ok(())
    }

    #[test]
    fn empty_pattern_yields_empty_outcome() -> Result<()> {
        let session = session_with(vec![sample_file()]);
        let outcome = session.search("")?.expect("current pass");
        assert!(outcome.positions.is_empty());
        assert!(outcome.changes_by_source.is_empty());
        Ok(())
    }

    #[test]
    fn invalid_pattern_keeps_published_results() -> Result<()> {
        let session = session_with(vec![sample_file()]);
        let first = session.search("total")?;

        let err = session.search("(").expect_err("invalid pattern");
        assert!(matches!(err, Error::InvalidPattern { .. }));
        assert_eq!(session.latest()?, first);
        Ok(())
    }

    #[test]
    fn stale_token_does_not_publish() -> Result<()> {
        let session = session_with(vec![sample_file()]);
        let stale = session.begin_pass();
        let fresh = session.begin_pass();

        assert!(!stale.is_current());
        assert!(fresh.is_current());
        assert!(session.search_with_token(&stale, "total")?.is_none());
        assert!(session.latest()?.is_none());

        let outcome = session.search_with_token(&fresh, "total")?.expect("fresh pass");
        assert_eq!(outcome.generation, fresh.generation());
        Ok(())
    }

    /// Starts a newer pass while the current one is collecting changes.
    struct InterruptingSource {
        session: OnceLock<Weak<SearchSession>>,
    }

    impl ChangeSource for InterruptingSource {
        fn id(&self) -> &str {
            "/interrupting"
        }

        fn file_changes(&self) -> Result<Vec<RepositoryFileChange>> {
            if let Some(session) = self.session.get().and_then(Weak::upgrade) {
                session.begin_pass();
            }
            Ok(vec![sample_file()])
        }
    }

    #[test]
    fn pass_superseded_mid_flight_is_discarded() -> Result<()> {
        let source = Arc::new(InterruptingSource {
            session: OnceLock::new(),
        });
        let mut registry = SourceRegistry::new();
        registry.register_shared(source.clone());
        let session = Arc::new(SearchSession::new(registry, SearchConfig::default()));
        source
            .session
            .set(Arc::downgrade(&session))
            .expect("session set once");

        assert!(session.search("total")?.is_none());
        assert!(session.latest()?.is_none());
        Ok(())
    }
}
