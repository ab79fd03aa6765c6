//! Shared diffmark data models consumed by the core library and editor hosts.

use std::collections::BTreeMap;

pub mod change;
pub mod edit_script;
pub mod position;

pub use change::*;
pub use edit_script::*;
pub use position::*;

/// Maps a value to an absolute file path and a zero-based line number.
pub type FilenameLineMap<T> = BTreeMap<String, BTreeMap<u32, T>>;
