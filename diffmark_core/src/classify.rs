//! Turn per-line change records into highlight positions.
//!
//! Each line with recorded changes is classified as a pure insertion or as a
//! modification, diffed at char level, and only the inserted runs are
//! searched. A match inside text that existed before the change is never
//! reported.

use std::collections::BTreeMap;

use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::{
    config::SearchConfig, edit_script::compute_edit_script, ChangeKind, FileLineChanges,
    FilesPositions, LineChange, TextEditorPosition,
};

/// The two versions of a changed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePair<'a> {
    /// Text before the change; empty for a pure insertion.
    pub original: &'a str,
    /// Text after the change.
    pub current: &'a str,
}

/// Pair up the changes recorded for a single line.
///
/// A lone `add` is a pure insertion. Two records pair the `add` with the
/// other one regardless of their order. A lone `del`, a pair without an
/// `add` and any other record count yield `None`.
#[must_use]
pub fn classify_line(changes: &[LineChange]) -> Option<LinePair<'_>> {
    match changes {
        [only] if only.kind == ChangeKind::Add => Some(LinePair {
            original: "",
            current: &only.content,
        }),
        [first, second] => {
            let (add, other) = if first.kind == ChangeKind::Add {
                (first, second)
            } else if second.kind == ChangeKind::Add {
                (second, first)
            } else {
                return None;
            };
            Some(LinePair {
                original: &other.content,
                current: &add.content,
            })
        }
        _ => None,
    }
}

/// Positions found in one pass plus the lines that had changes but no match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchExtraction {
    /// Matches per file and line. Every scanned file has an entry, possibly
    /// empty, so renderers can clear stale highlights.
    pub positions: FilesPositions,
    /// Lines per file whose inserted text did not match the pattern.
    pub unmatched_lines: BTreeMap<String, Vec<u32>>,
}

impl MatchExtraction {
    /// Whether `line` of `file` was classified and found no match.
    #[must_use]
    pub fn is_unmatched(&self, file: &str, line: u32) -> bool {
        self.unmatched_lines
            .get(file)
            .is_some_and(|lines| lines.contains(&line))
    }

    /// Total number of positions across all files.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.positions
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }
}

enum LineOutcome {
    Skipped,
    Unmatched,
    Matched(Vec<TextEditorPosition>),
}

#[derive(Default)]
struct FileExtraction {
    positions: BTreeMap<u32, Vec<TextEditorPosition>>,
    unmatched: Vec<u32>,
}

/// Searches the inserted parts of changed lines for a pattern.
#[derive(Debug, Clone, Copy)]
pub struct PositionExtractor<'p> {
    pattern: &'p Regex,
    max_line_length: Option<usize>,
    parallel: bool,
}

impl<'p> PositionExtractor<'p> {
    /// Sequential extractor without a line length ceiling.
    #[must_use]
    pub const fn new(pattern: &'p Regex) -> Self {
        Self {
            pattern,
            max_line_length: None,
            parallel: false,
        }
    }

    /// Extractor tuned by `config`.
    #[must_use]
    pub const fn from_config(pattern: &'p Regex, config: &SearchConfig) -> Self {
        Self {
            pattern,
            max_line_length: Some(config.max_line_length),
            parallel: config.parallel,
        }
    }

    /// Skip diffing line pairs with a side longer than `limit` chars.
    #[must_use]
    pub const fn with_max_line_length(mut self, limit: usize) -> Self {
        self.max_line_length = Some(limit);
        self
    }

    /// Process files on the rayon pool.
    #[must_use]
    pub const fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Classify every line of every file.
    #[must_use]
    pub fn extract(&self, changes: &FileLineChanges) -> MatchExtraction {
        let files: Vec<(String, FileExtraction)> = if self.parallel {
            changes
                .par_iter()
                .map(|(file, lines)| (file.clone(), self.extract_file(file, lines)))
                .collect()
        } else {
            changes
                .iter()
                .map(|(file, lines)| (file.clone(), self.extract_file(file, lines)))
                .collect()
        };

        let mut extraction = MatchExtraction::default();
        for (file, found) in files {
            if !found.unmatched.is_empty() {
                extraction
                    .unmatched_lines
                    .insert(file.clone(), found.unmatched);
            }
            extraction.positions.insert(file, found.positions);
        }

        debug!(
            files = changes.len(),
            positions = extraction.position_count(),
            unmatched = extraction.unmatched_lines.values().map(Vec::len).sum::<usize>(),
            "extracted match positions"
        );
        extraction
    }

    fn extract_file(&self, file: &str, lines: &BTreeMap<u32, Vec<LineChange>>) -> FileExtraction {
        let mut found = FileExtraction::default();
        for (&line, changes) in lines {
            match self.extract_line(file, line, changes) {
                LineOutcome::Skipped => {}
                LineOutcome::Unmatched => found.unmatched.push(line),
                LineOutcome::Matched(positions) => {
                    found.positions.insert(line, positions);
                }
            }
        }
        found
    }

    fn extract_line(&self, file: &str, line: u32, changes: &[LineChange]) -> LineOutcome {
        let Some(pair) = classify_line(changes) else {
            trace!(file, line, records = changes.len(), "skipping line");
            return LineOutcome::Skipped;
        };

        if let Some(limit) = self.max_line_length {
            let longest = pair.original.chars().count().max(pair.current.chars().count());
            if longest > limit {
                warn!(file, line, longest, limit, "line exceeds length ceiling");
                return LineOutcome::Unmatched;
            }
        }

        let script = compute_edit_script(pair.original, pair.current);
        if script.is_invalid_path {
            warn!(file, line, "no consistent edit path for line");
            return LineOutcome::Unmatched;
        }

        let mut positions = Vec::new();
        for operation in script.inserts() {
            for found in self.pattern.find_iter(&operation.content) {
                let offset = operation.content[..found.start()].chars().count();
                let start = operation.pos_start + offset;
                positions.push(TextEditorPosition::new(
                    pair.current,
                    start,
                    start + found.as_str().chars().count(),
                ));
            }
        }

        trace!(file, line, matches = positions.len(), "classified line");
        if positions.is_empty() {
            LineOutcome::Unmatched
        } else {
            LineOutcome::Matched(positions)
        }
    }
}

/// Sequential extraction with no line length ceiling.
#[must_use]
pub fn extract_match_positions(changes: &FileLineChanges, pattern: &Regex) -> MatchExtraction {
    PositionExtractor::new(pattern).extract(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FILE: &str = "/repo/src/main.rs";

    fn single_line(line: u32, changes: Vec<LineChange>) -> FileLineChanges {
        let mut lines = BTreeMap::new();
        lines.insert(line, changes);
        let mut files = FileLineChanges::new();
        files.insert(FILE.to_owned(), lines);
        files
    }

    fn regex(pattern: &str) -> Regex {
        Regex::new(pattern).expect("valid regex")
    }

    fn spans(extraction: &MatchExtraction, line: u32) -> Vec<(usize, usize)> {
        extraction.positions[FILE]
            .get(&line)
            .map(|positions| {
                positions
                    .iter()
                    .map(|position| (position.pos_start, position.pos_end))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn pure_add_reports_match_in_whole_line() {
        let changes = single_line(5, vec![LineChange::add(5, "let x = 2")]);
        let extraction = extract_match_positions(&changes, &regex("x"));

        assert_eq!(spans(&extraction, 5), [(4, 5)]);
        assert_eq!(extraction.positions[FILE][&5][0].content, "let x = 2");
        assert!(extraction.unmatched_lines.is_empty());
    }

    #[rstest]
    #[case::del_first(vec![LineChange::del(5, "let x = 1"), LineChange::add(5, "let x = 2")])]
    #[case::add_first(vec![LineChange::add(5, "let x = 2"), LineChange::del(5, "let x = 1")])]
    fn modification_reports_only_inserted_chars(#[case] records: Vec<LineChange>) {
        let changes = single_line(5, records);
        let extraction = extract_match_positions(&changes, &regex("2"));
        assert_eq!(spans(&extraction, 5), [(8, 9)]);

        // "x" exists on both sides, so it is not part of any insert.
        let extraction = extract_match_positions(&changes, &regex("x"));
        assert!(spans(&extraction, 5).is_empty());
        assert!(extraction.is_unmatched(FILE, 5));
    }

    #[test]
    fn unrelated_difference_is_unmatched() {
        let changes = single_line(3, vec![LineChange::del(3, "foo1"), LineChange::add(3, "foo2")]);
        let extraction = extract_match_positions(&changes, &regex("bar"));

        assert!(extraction.positions[FILE].is_empty());
        assert_eq!(extraction.unmatched_lines[FILE], [3]);
    }

    #[test]
    fn every_non_overlapping_match_is_reported() {
        let changes = single_line(0, vec![LineChange::add(0, "aaa")]);
        let extraction = extract_match_positions(&changes, &regex("a"));
        assert_eq!(spans(&extraction, 0), [(0, 1), (1, 2), (2, 3)]);

        let extraction = extract_match_positions(&changes, &regex("aa"));
        assert_eq!(spans(&extraction, 0), [(0, 2)]);
    }

    #[test]
    fn offsets_are_char_based() {
        let changes = single_line(
            1,
            vec![LineChange::del(1, "let é = 1"), LineChange::add(1, "let é = 2")],
        );
        let extraction = extract_match_positions(&changes, &regex("2"));
        assert_eq!(spans(&extraction, 1), [(8, 9)]);
        assert_eq!(extraction.positions[FILE][&1][0].matched(), "2");
    }

    #[rstest]
    #[case::lone_delete(vec![LineChange::del(2, "gone")])]
    #[case::two_deletes(vec![LineChange::del(2, "a"), LineChange::del(2, "b")])]
    #[case::three_records(vec![
        LineChange::del(2, "a"),
        LineChange::add(2, "b"),
        LineChange::add(2, "c"),
    ])]
    #[case::empty(Vec::new())]
    fn out_of_contract_lines_are_skipped(#[case] records: Vec<LineChange>) {
        let changes = single_line(2, records);
        let extraction = extract_match_positions(&changes, &regex("."));

        assert!(extraction.positions[FILE].is_empty());
        assert!(!extraction.is_unmatched(FILE, 2));
    }

    #[test]
    fn empty_pattern_matches_every_offset_of_insert() {
        let changes = single_line(0, vec![LineChange::add(0, "ab")]);
        let extraction = extract_match_positions(&changes, &regex(""));
        assert_eq!(spans(&extraction, 0), [(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn pure_deletion_pair_is_unmatched() {
        let changes = single_line(4, vec![LineChange::del(4, "abc"), LineChange::add(4, "ab")]);
        let extraction = extract_match_positions(&changes, &regex("."));
        assert!(extraction.is_unmatched(FILE, 4));
    }

    #[test]
    fn overlong_lines_are_unmatched() {
        let long = "x".repeat(32);
        let changes = single_line(1, vec![LineChange::add(1, long)]);
        let pattern = regex("x");

        let extraction = PositionExtractor::new(&pattern)
            .with_max_line_length(16)
            .extract(&changes);
        assert!(extraction.is_unmatched(FILE, 1));

        let extraction = PositionExtractor::new(&pattern)
            .with_max_line_length(32)
            .extract(&changes);
        assert_eq!(extraction.position_count(), 32);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let mut files = FileLineChanges::new();
        for index in 0..8u32 {
            let mut lines = BTreeMap::new();
            lines.insert(0, vec![LineChange::add(0, format!("value_{index} = {index}"))]);
            lines.insert(
                1,
                vec![
                    LineChange::del(1, "let total = 0;"),
                    LineChange::add(1, format!("let total = {index};")),
                ],
            );
            files.insert(format!("/repo/file_{index}.rs"), lines);
        }

        let pattern = regex(r"\d");
        let sequential = PositionExtractor::new(&pattern).extract(&files);
        let parallel = PositionExtractor::new(&pattern).parallel(true).extract(&files);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.positions.len(), 8);
    }

    #[test]
    fn classify_line_pairs_regardless_of_order() {
        let records = [LineChange::add(0, "new"), LineChange::del(0, "old")];
        let pair = classify_line(&records).expect("pair");
        assert_eq!(pair.original, "old");
        assert_eq!(pair.current, "new");

        let records = [LineChange::add(0, "only")];
        let pair = classify_line(&records).expect("pure add");
        assert_eq!(pair.original, "");
    }
}
