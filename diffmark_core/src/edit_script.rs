//! Shortest edit script between two versions of a line.
//!
//! Forward exploration follows Myers' O(ND) algorithm and keeps one snapshot
//! of the furthest reaching `x` per diagonal for every edit distance `d`.
//! Recovery walks those snapshots back from the far corner of the edit graph
//! to the origin. At every snapshot it may continue from the left or the right
//! neighbour diagonal; when both lead to the origin the branch producing fewer
//! merged operations wins, and the right branch wins ties.

use tracing::trace;

use crate::{EditOperationType, EditScript, EditScriptOperation};

/// Compute the minimal insert/delete script turning `original` into `current`.
///
/// Offsets in the returned operations count `char`s. Inserts are positioned in
/// `current`, deletes in `original`. Operations come out right-most first; use
/// [`EditScript::in_path_order`] for left-to-right order.
#[must_use]
pub fn compute_edit_script(original: &str, current: &str) -> EditScript {
    let original: Vec<char> = original.chars().collect();
    let current: Vec<char> = current.chars().collect();

    let graph = EditGraph::new(&original, &current);
    let history = graph.explore();
    trace!(
        original_len = original.len(),
        current_len = current.len(),
        distance = history.len().saturating_sub(2),
        "explored edit graph"
    );

    let mut recovery = Recovery::new(&graph, history);
    recovery.solve();
    recovery.script()
}

/// Replay `script` on top of `original`.
///
/// For a script produced by [`compute_edit_script`] this yields the `current`
/// string the script was computed against.
#[must_use]
pub fn apply_edit_script(original: &str, script: &EditScript) -> String {
    let source: Vec<char> = original.chars().collect();
    let mut output = String::with_capacity(original.len());
    let mut consumed = 0;
    let mut written = 0;

    for operation in script.in_path_order() {
        let keep = match operation.operation_type {
            EditOperationType::Delete => operation.pos_start.saturating_sub(consumed),
            EditOperationType::Insert => operation.pos_start.saturating_sub(written),
        };
        let start = consumed.min(source.len());
        let end = (consumed + keep).min(source.len());
        output.extend(&source[start..end]);
        written += end - start;
        consumed += keep;

        match operation.operation_type {
            EditOperationType::Delete => consumed = consumed.max(operation.pos_end),
            EditOperationType::Insert => {
                output.push_str(&operation.content);
                written += operation.len();
            }
        }
    }

    output.extend(&source[consumed.min(source.len())..]);
    output
}

/// Point in the edit graph: `x` chars consumed from the original string and
/// `y` from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Coordinate {
    x: isize,
    y: isize,
}

impl Coordinate {
    const fn is_origin(self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Component-wise `self <= other`.
    const fn within(self, other: Self) -> bool {
        self.x <= other.x && self.y <= other.y
    }
}

/// Furthest reaching `x` per diagonal, indexed by `k + max_moves`.
type Snapshot = Vec<isize>;

struct EditGraph<'a> {
    original: &'a [char],
    current: &'a [char],
    original_len: isize,
    current_len: isize,
    max_moves: isize,
    width: usize,
}

impl<'a> EditGraph<'a> {
    fn new(original: &'a [char], current: &'a [char]) -> Self {
        let original_len = signed(original.len());
        let current_len = signed(current.len());
        let max_moves = original_len + current_len;
        Self {
            original,
            current,
            original_len,
            current_len,
            max_moves,
            width: 2 * (original.len() + current.len()) + 1,
        }
    }

    /// Diagonal holding the far corner `(len(original), len(current))`.
    const fn target_diagonal(&self) -> isize {
        self.original_len - self.current_len
    }

    fn slot(&self, diagonal: isize) -> Option<usize> {
        usize::try_from(diagonal + self.max_moves)
            .ok()
            .filter(|slot| *slot < self.width)
    }

    fn same_char(&self, x: isize, y: isize) -> bool {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return false;
        };
        matches!(
            (self.original.get(x), self.current.get(y)),
            (Some(a), Some(b)) if a == b
        )
    }

    const fn in_bounds(&self, point: Coordinate) -> bool {
        point.x >= 0 && point.y >= 0 && point.x <= self.original_len && point.y <= self.current_len
    }

    /// Snapshots for every explored edit distance, newest first. The last
    /// entry is the all-zero state exploration started from.
    fn explore(&self) -> Vec<Snapshot> {
        let mut reach: Snapshot = vec![0; self.width];
        let mut history = vec![reach.clone()];

        for depth in 0..=self.max_moves {
            let mut reached_end = false;

            for diagonal in (-depth..=depth).step_by(2) {
                let Some(slot) = self.slot(diagonal) else {
                    continue;
                };

                if depth > 0 {
                    let down = diagonal == -depth
                        || reach
                            .get(slot + 1)
                            .is_some_and(|right| reach[slot - 1] < *right);
                    reach[slot] = if down {
                        reach[slot + 1]
                    } else {
                        reach[slot - 1] + 1
                    };
                }

                let mut x = reach[slot];
                let mut y = x - diagonal;
                while self.same_char(x, y) {
                    x += 1;
                    y += 1;
                }
                reach[slot] = x;

                if x == self.original_len && y == self.current_len {
                    reached_end = true;
                }
            }

            history.push(reach.clone());
            if reached_end {
                break;
            }
        }

        history.reverse();
        history
    }

    /// Whether a single recovery step may lead from `from` back to `to`.
    fn can_step(&self, from: Coordinate, to: Coordinate) -> bool {
        if !to.within(from) {
            return false;
        }

        let dx = from.x - to.x;
        let dy = from.y - to.y;
        match (dx, dy) {
            (1, 0) | (0, 1) => true,
            _ if dx == dy => to.is_origin() && self.shares_prefix(from.x),
            _ => self.ends_snake(from, dx.min(dy)),
        }
    }

    fn shares_prefix(&self, len: isize) -> bool {
        (0..len).all(|index| self.same_char(index, index))
    }

    /// Whether `len` matching characters lead diagonally into `end`.
    fn ends_snake(&self, end: Coordinate, len: isize) -> bool {
        if end.x <= 0 || end.y <= 0 || !self.in_bounds(end) {
            return false;
        }
        (1..=len).all(|back| self.same_char(end.x - back, end.y - back))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    const fn offset(self) -> isize {
        match self {
            Self::Left => -1,
            Self::Right => 1,
        }
    }
}

/// Type of the operation emitted by the step that arrived at a recovery
/// position. Each diagonal of a level is resolved once per variant.
const INCOMING: [Option<EditOperationType>; 3] = [
    None,
    Some(EditOperationType::Insert),
    Some(EditOperationType::Delete),
];

const fn incoming_index(incoming: Option<EditOperationType>) -> usize {
    match incoming {
        None => 0,
        Some(EditOperationType::Insert) => 1,
        Some(EditOperationType::Delete) => 2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Origin,
    Exhausted,
    Branch(Side),
}

/// Best continuation from a recovery position: whether it reaches the origin
/// and how many operations it appends to the script.
#[derive(Debug, Clone, Copy)]
struct Resolution {
    valid: bool,
    operations: usize,
    choice: Choice,
}

impl Resolution {
    const ORIGIN: Self = Self {
        valid: true,
        operations: 0,
        choice: Choice::Origin,
    };

    const EXHAUSTED: Self = Self {
        valid: false,
        operations: 0,
        choice: Choice::Exhausted,
    };
}

/// Resolutions of one level, one entry per diagonal it spans, left to right.
type Level = Vec<[Resolution; 3]>;

/// One backward move, from a point to its predecessor on a neighbour
/// diagonal of the previous snapshot.
#[derive(Debug, Clone, Copy)]
struct Step {
    operation_type: EditOperationType,
    position: usize,
    cardinal: bool,
}

impl Step {
    /// Whether the step grows the operation emitted just before it instead
    /// of starting a new one.
    fn extends(&self, incoming: Option<EditOperationType>) -> bool {
        self.cardinal && incoming == Some(self.operation_type)
    }
}

struct Recovery<'g, 'a> {
    graph: &'g EditGraph<'a>,
    history: Vec<Snapshot>,
    /// Branch taken from every position, indexed like [`Level`]. Operation
    /// counts are only kept while the level above is being resolved.
    choices: Vec<Vec<[Choice; 3]>>,
    valid: bool,
}

impl<'g, 'a> Recovery<'g, 'a> {
    fn new(graph: &'g EditGraph<'a>, history: Vec<Snapshot>) -> Self {
        Self {
            graph,
            history,
            choices: Vec::new(),
            valid: false,
        }
    }

    fn point(&self, level: usize, diagonal: isize) -> Option<Coordinate> {
        let slot = self.graph.slot(diagonal)?;
        let x = *self.history.get(level)?.get(slot)?;
        Some(Coordinate {
            x,
            y: x - diagonal,
        })
    }

    /// Level `level` spans the `level + 1` diagonals `start - level`,
    /// `start - level + 2`, up to `start + level`.
    fn index(&self, level: usize, diagonal: isize) -> Option<usize> {
        let span = signed(level);
        let offset = diagonal - (self.graph.target_diagonal() - span);
        if offset < 0 || offset > 2 * span || offset % 2 != 0 {
            return None;
        }
        usize::try_from(offset / 2).ok()
    }

    /// Resolve every level from the oldest snapshot up to the newest.
    ///
    /// A level only depends on the one below it, so the operation counts of
    /// a level are dropped as soon as the level above is resolved.
    fn solve(&mut self) {
        let start = self.graph.target_diagonal();
        let mut choices = vec![Vec::new(); self.history.len()];
        let mut below: Level = Vec::new();

        for level in (0..self.history.len()).rev() {
            let span = signed(level);
            let resolved: Level = ((start - span)..=(start + span))
                .step_by(2)
                .map(|diagonal| self.resolve(level, diagonal, &below))
                .collect();
            choices[level] = resolved
                .iter()
                .map(|&resolutions| resolutions.map(|resolution| resolution.choice))
                .collect();
            below = resolved;
        }

        self.valid = below
            .first()
            .is_some_and(|resolutions| resolutions[incoming_index(None)].valid);
        self.choices = choices;
    }

    fn resolve(
        &self,
        level: usize,
        diagonal: isize,
        below: &[[Resolution; 3]],
    ) -> [Resolution; 3] {
        let Some(here) = self.point(level, diagonal) else {
            return [Resolution::EXHAUSTED; 3];
        };
        if here.is_origin() {
            return [Resolution::ORIGIN; 3];
        }
        if level + 1 >= self.history.len() {
            return [Resolution::EXHAUSTED; 3];
        }

        // A script that starts with a run of matching characters ends here.
        if let Some(bottom) = self.point(level + 1, diagonal) {
            if bottom.is_origin() && self.graph.can_step(here, bottom) {
                return [Resolution::ORIGIN; 3];
            }
        }

        let left = self.continuation(level, here, diagonal - 1, below);
        let right = self.continuation(level, here, diagonal + 1, below);

        INCOMING.map(|incoming| {
            let left = branch(left, incoming, Side::Left);
            let right = branch(right, incoming, Side::Right);
            if !left.valid {
                right
            } else if !right.valid || left.operations < right.operations {
                left
            } else {
                right
            }
        })
    }

    /// Step onto `diagonal` of the level below, with the best resolution
    /// waiting there.
    fn continuation(
        &self,
        level: usize,
        here: Coordinate,
        diagonal: isize,
        below: &[[Resolution; 3]],
    ) -> Option<(Step, Resolution)> {
        let step = self.step(level, here, diagonal)?;
        let rest = self
            .index(level + 1, diagonal)
            .and_then(|index| below.get(index))
            .map_or(Resolution::EXHAUSTED, |resolutions| {
                resolutions[incoming_index(Some(step.operation_type))]
            });
        Some((step, rest))
    }

    fn step(&self, level: usize, here: Coordinate, diagonal: isize) -> Option<Step> {
        let to = self.point(level + 1, diagonal)?;
        if !self.graph.in_bounds(to) || !self.graph.can_step(here, to) {
            return None;
        }

        let dx = here.x - to.x;
        let dy = here.y - to.y;
        let (operation_type, position) = if dy > dx {
            (EditOperationType::Insert, to.y)
        } else {
            (EditOperationType::Delete, to.x)
        };

        Some(Step {
            operation_type,
            position: usize::try_from(position).ok()?,
            cardinal: dx + dy == 1,
        })
    }

    fn choice(
        &self,
        level: usize,
        diagonal: isize,
        incoming: Option<EditOperationType>,
    ) -> Option<Choice> {
        let index = self.index(level, diagonal)?;
        let choices = self.choices.get(level)?.get(index)?;
        Some(choices[incoming_index(incoming)])
    }

    fn script(&self) -> EditScript {
        let mut level = 0;
        let mut diagonal = self.graph.target_diagonal();
        let mut incoming = None;
        let mut operations: Vec<EditScriptOperation> = Vec::new();

        while let Some(Choice::Branch(side)) = self.choice(level, diagonal, incoming) {
            let Some(here) = self.point(level, diagonal) else {
                break;
            };
            let next = diagonal + side.offset();
            let Some(step) = self.step(level, here, next) else {
                break;
            };

            let source = match step.operation_type {
                EditOperationType::Insert => self.graph.current,
                EditOperationType::Delete => self.graph.original,
            };
            let Some(&ch) = source.get(step.position) else {
                break;
            };
            push_operation(&mut operations, step, ch);

            level += 1;
            diagonal = next;
            incoming = Some(step.operation_type);
        }

        EditScript {
            operations,
            is_invalid_path: !self.valid,
        }
    }
}

/// Score one branch for a position reached by an `incoming` operation.
fn branch(
    continuation: Option<(Step, Resolution)>,
    incoming: Option<EditOperationType>,
    side: Side,
) -> Resolution {
    let Some((step, rest)) = continuation else {
        return Resolution {
            choice: Choice::Branch(side),
            ..Resolution::EXHAUSTED
        };
    };

    Resolution {
        valid: rest.valid,
        operations: rest.operations + usize::from(!step.extends(incoming)),
        choice: Choice::Branch(side),
    }
}

/// Append a one-character operation, merging it into the previous operation
/// when that one has the same type and starts where this one ends.
fn push_operation(operations: &mut Vec<EditScriptOperation>, step: Step, ch: char) {
    let end = step.position + 1;
    match operations.last_mut() {
        Some(last) if last.operation_type == step.operation_type && last.pos_start == end => {
            last.pos_start = step.position;
            last.content.insert(0, ch);
        }
        _ => operations.push(EditScriptOperation {
            operation_type: step.operation_type,
            pos_start: step.position,
            pos_end: end,
            content: ch.to_string(),
        }),
    }
}

fn signed(len: usize) -> isize {
    isize::try_from(len).unwrap_or(isize::MAX)
}
