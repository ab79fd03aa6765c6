//! Compiling user-typed search text into a regex.

use regex::Regex;
use tracing::debug;

use crate::{Error, Result};

/// Compile search text typed by the user into a [`Regex`].
///
/// The empty string compiles and matches the empty string at every offset.
///
/// # Errors
///
/// Returns [`Error::InvalidPattern`] when the text is not a valid regular
/// expression.
pub fn compile_pattern(input: &str) -> Result<Regex> {
    Regex::new(input).map_err(|source| {
        debug!(pattern = input, %source, "rejected search pattern");
        Error::InvalidPattern {
            pattern: input.to_owned(),
            source,
        }
    })
}
