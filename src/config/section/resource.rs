//! `[path]`, `[checker]` and `[[transform]]` sections.
//!
//! # Example
//!
//! ```toml
//! [path]
//! jquery = "//cdn.example.com/jquery.js"
//! ngRoute = false                # bundled elsewhere, never fetched
//!
//! [checker]
//! jquery = "jQuery"              # ready once `jQuery` is defined
//! underscore = ["_", "_.VERSION"]
//!
//! [[transform]]
//! pattern = "^vendor\\.(.*)$"
//! replace = "lib/$1"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::loader::{Checker, PathOverride, PathTransform};

/// A `[path]` entry: an address seed, or `false` for "no script".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PathEntry {
    Path(String),
    Flag(bool),
}

impl PathEntry {
    /// `None` for the invalid `true` flag.
    pub fn to_override(&self) -> Option<PathOverride> {
        match self {
            Self::Path(path) => Some(PathOverride::Path(path.clone())),
            Self::Flag(false) => Some(PathOverride::NoPath),
            Self::Flag(true) => None,
        }
    }

    pub fn validate(&self, name: &str, diag: &mut ConfigDiagnostics) {
        match self {
            Self::Flag(true) => diag.error_with_hint(
                FieldPath::owned(format!("path.{name}")),
                "`true` is not a path",
                "use a path string, or `false` for modules without a script",
            ),
            Self::Path(path) if path.is_empty() => {
                diag.error(FieldPath::owned(format!("path.{name}")), "empty path")
            }
            _ => {}
        }
    }
}

/// A `[checker]` entry: the global symbols a script must define.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CheckerEntry {
    Symbol(String),
    Symbols(Vec<String>),
}

impl CheckerEntry {
    pub fn symbols(&self) -> Vec<String> {
        match self {
            Self::Symbol(symbol) => vec![symbol.clone()],
            Self::Symbols(symbols) => symbols.clone(),
        }
    }

    pub fn to_checker(&self) -> Checker {
        Checker::RequiredSymbols(self.symbols())
    }

    pub fn validate(&self, name: &str, diag: &mut ConfigDiagnostics) {
        let symbols = self.symbols();
        if symbols.is_empty() || symbols.iter().any(|s| s.trim().is_empty()) {
            diag.error(
                FieldPath::owned(format!("checker.{name}")),
                "expected at least one non-empty symbol",
            );
        }
    }
}

/// A `[[transform]]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransformConfig {
    /// Regex matched against the current path.
    pub pattern: String,
    /// Replacement, `$1`-style captures allowed.
    pub replace: String,
}

impl TransformConfig {
    pub fn compile(&self) -> Result<PathTransform, regex::Error> {
        Regex::new(&self.pattern).map(|re| PathTransform::regex(re, self.replace.as_str()))
    }

    pub fn validate(&self, index: usize, diag: &mut ConfigDiagnostics) {
        if let Err(e) = Regex::new(&self.pattern) {
            diag.error(
                FieldPath::owned(format!("transform[{index}].pattern")),
                format!("invalid regex: {e}"),
            );
        }
    }
}
