//! Config field paths used in diagnostics.

use std::borrow::Cow;
use std::fmt;

use owo_colors::OwoColorize;

/// Dotted path of a config field, e.g. `app.main` or `path.jquery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Cow<'static, str>);

impl FieldPath {
    #[inline]
    pub const fn new(path: &'static str) -> Self {
        Self(Cow::Borrowed(path))
    }

    /// Path built at runtime (map keys, array indices).
    #[inline]
    pub fn owned(path: String) -> Self {
        Self(Cow::Owned(path))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_args!("`{}`", self.0).bright_blue())
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
