use serde::{Deserialize, Serialize};

/// Direction of a single edit script step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditOperationType {
    /// Characters present only in the current string.
    Insert,
    /// Characters present only in the original string.
    Delete,
}

/// One (possibly merged) run of inserted or deleted characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditScriptOperation {
    /// Whether the run was inserted or deleted.
    pub operation_type: EditOperationType,
    /// Inclusive start, in chars of the current string for inserts and of
    /// the original string for deletes.
    pub pos_start: usize,
    /// Exclusive end in the same coordinate space as `pos_start`.
    pub pos_end: usize,
    /// The characters covered by `[pos_start, pos_end)`.
    pub content: String,
}

impl EditScriptOperation {
    /// Number of characters covered by the run.
    pub const fn len(&self) -> usize {
        self.pos_end - self.pos_start
    }

    /// Whether the run covers no characters.
    pub const fn is_empty(&self) -> bool {
        self.pos_end == self.pos_start
    }

    /// Whether the run came from the current string.
    pub fn is_insert(&self) -> bool {
        self.operation_type == EditOperationType::Insert
    }
}

/// Result of differencing two strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EditScript {
    /// Operations in recovery order, right-most first.
    #[serde(default)]
    pub operations: Vec<EditScriptOperation>,
    /// Set when recovery found no consistent path back to the origin; the
    /// operations are then partial.
    #[serde(default)]
    pub is_invalid_path: bool,
}

impl EditScript {
    /// Operations reversed into left-to-right path order.
    pub fn in_path_order(&self) -> impl Iterator<Item = &EditScriptOperation> + '_ {
        self.operations.iter().rev()
    }

    /// Only the insert runs, in recovery order.
    pub fn inserts(&self) -> impl Iterator<Item = &EditScriptOperation> + '_ {
        self.operations.iter().filter(|operation| operation.is_insert())
    }

    /// Total number of inserted plus deleted characters.
    pub fn changed_chars(&self) -> usize {
        self.operations.iter().map(EditScriptOperation::len).sum()
    }
}
