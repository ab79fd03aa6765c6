use serde::{Deserialize, Serialize};

use crate::FilenameLineMap;

/// A pattern match inside the changed part of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEditorPosition {
    /// Current text of the line the match was found in.
    pub content: String,
    /// Zero-based char offset of the first matched character.
    pub pos_start: usize,
    /// Zero-based char offset one past the last matched character.
    pub pos_end: usize,
}

impl TextEditorPosition {
    /// Construct a position inside `content`.
    pub fn new(content: impl Into<String>, pos_start: usize, pos_end: usize) -> Self {
        Self {
            content: content.into(),
            pos_start,
            pos_end,
        }
    }

    /// The matched characters.
    pub fn matched(&self) -> String {
        char_range(&self.content, self.pos_start, self.pos_end).collect()
    }

    /// Whether `line_text` still holds the matched characters at the same
    /// offsets. Editors use this to skip positions made stale by edits.
    pub fn still_applies(&self, line_text: &str) -> bool {
        char_range(&self.content, self.pos_start, self.pos_end)
            .eq(char_range(line_text, self.pos_start, self.pos_end))
    }
}

fn char_range(text: &str, start: usize, end: usize) -> impl Iterator<Item = char> + '_ {
    text.chars().skip(start).take(end.saturating_sub(start))
}

/// Matched positions grouped per file and per line.
pub type FilesPositions = FilenameLineMap<Vec<TextEditorPosition>>;
