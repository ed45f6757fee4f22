//! Resource name to script address resolution.
//!
//! Resolution order:
//! 1. explicit `path` override (or the no-path marker → unresolvable)
//! 2. transform pipeline, run on the bare name when there is no override
//! 3. absolute URIs (`scheme://…`, `//…`) are returned untouched
//! 4. everything else gets the root prefix and the default suffix
//!
//! # Example
//!
//! ```text
//! root = "r"    foo           -> r/foo.js
//!               /lib/foo.js   -> /lib/foo.js
//!               http://x/y.js -> http://x/y.js
//! ```

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::Config;

/// Suffix appended to addresses that lack it.
pub const DEFAULT_SUFFIX: &str = ".js";

static ABSOLUTE_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*:)?//.+").unwrap());

/// Check if an address is an absolute URI (`scheme://…` or `//…`).
pub fn is_absolute_uri(path: &str) -> bool {
    ABSOLUTE_URI.is_match(path)
}

// ============================================================================
// Overrides & Transforms
// ============================================================================

/// Explicit `path` configuration entry for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOverride {
    /// Use this path as the seed instead of the transformed name.
    Path(String),
    /// The name has no backing script (e.g. a module bundled elsewhere).
    NoPath,
}

/// Output of a single path transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    /// Rewritten path, fed to the next transform.
    Path(String),
    /// Keep the previous value and stop the pipeline.
    Keep,
}

type TransformFn = dyn Fn(&str, &str) -> Transformed + Send + Sync;

/// A step of the transform pipeline, called with `(current_path, name)`.
#[derive(Clone)]
pub struct PathTransform {
    label: String,
    apply: Arc<TransformFn>,
}

impl PathTransform {
    pub fn new<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, &str) -> Transformed + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            apply: Arc::new(f),
        }
    }

    /// Regex rewrite: `replace` may use `$1`-style captures.
    ///
    /// A path the pattern does not match passes through unchanged.
    pub fn regex(pattern: Regex, replace: impl Into<String>) -> Self {
        let replace = replace.into();
        let label = format!("{} -> {}", pattern.as_str(), replace);
        Self::new(label, move |path, _| {
            Transformed::Path(pattern.replace(path, replace.as_str()).into_owned())
        })
    }

    #[inline]
    pub fn apply(&self, path: &str, name: &str) -> Transformed {
        (self.apply)(path, name)
    }
}

impl fmt::Debug for PathTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathTransform").field(&self.label).finish()
    }
}

/// Run `name` through the pipeline.
pub fn transform_path(name: &str, transforms: &[PathTransform]) -> String {
    let mut path = name.to_owned();
    for transform in transforms {
        match transform.apply(&path, name) {
            Transformed::Path(next) => path = next,
            Transformed::Keep => break,
        }
    }
    path
}

// ============================================================================
// PathResolver
// ============================================================================

/// Layout rules applied after overrides and transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: String,
    suffix: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new("", DEFAULT_SUFFIX)
    }
}

impl PathResolver {
    pub fn new(root: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into().trim_end_matches('/').to_owned(),
            suffix: suffix.into(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Resolve `name` to a script address, `None` when it has no script.
    pub fn resolve(&self, name: &str, config: &Config) -> Option<String> {
        let path = match config.path.get(name) {
            Some(PathOverride::NoPath) => return None,
            Some(PathOverride::Path(path)) => path.clone(),
            None => transform_path(name, &config.transforms),
        };

        if is_absolute_uri(&path) {
            return Some(path);
        }

        let mut resolved = if !self.root.is_empty() && !path.starts_with('/') {
            format!("{}/{}", self.root, path)
        } else {
            path
        };

        if !resolved.ends_with(&self.suffix) {
            resolved.push_str(&self.suffix);
        }
        Some(resolved)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(root: &str) -> PathResolver {
        PathResolver::new(root, DEFAULT_SUFFIX)
    }

    #[test]
    fn test_root_and_suffix() {
        let config = Config::new();
        assert_eq!(resolver("r").resolve("foo", &config).as_deref(), Some("r/foo.js"));
        assert_eq!(resolver("").resolve("foo", &config).as_deref(), Some("foo.js"));
        assert_eq!(resolver("r/").resolve("foo", &config).as_deref(), Some("r/foo.js"));
    }

    #[test]
    fn test_existing_suffix_kept() {
        let config = Config::new();
        assert_eq!(
            resolver("r").resolve("lib/foo.js", &config).as_deref(),
            Some("r/lib/foo.js")
        );
    }

    #[test]
    fn test_root_relative_skips_prefix() {
        let config = Config::new();
        assert_eq!(
            resolver("r").resolve("/static/foo", &config).as_deref(),
            Some("/static/foo.js")
        );
    }

    #[test]
    fn test_absolute_uri_unchanged() {
        let config = Config::new();
        let r = resolver("r");
        assert_eq!(r.resolve("http://x/y.js", &config).as_deref(), Some("http://x/y.js"));
        assert_eq!(r.resolve("https://x/y", &config).as_deref(), Some("https://x/y"));
        assert_eq!(r.resolve("//cdn/y", &config).as_deref(), Some("//cdn/y"));
        assert!(!is_absolute_uri("/local/y"));
        assert!(!is_absolute_uri("//"));
    }

    #[test]
    fn test_no_path_marker() {
        let config = Config::new().without_path("ngRoute");
        assert_eq!(resolver("r").resolve("ngRoute", &config), None);
    }

    #[test]
    fn test_override_seeds_path_and_skips_transforms() {
        let config = Config::new()
            .with_path("jquery", "vendor/jquery-3")
            .with_transform(PathTransform::new("upper", |p, _| {
                Transformed::Path(p.to_uppercase())
            }));

        assert_eq!(
            resolver("r").resolve("jquery", &config).as_deref(),
            Some("r/vendor/jquery-3.js")
        );
        assert_eq!(resolver("r").resolve("app", &config).as_deref(), Some("r/APP.js"));
    }

    #[test]
    fn test_transform_receives_original_name() {
        let config = Config::new()
            .with_transform(PathTransform::new("dots", |p, _| {
                Transformed::Path(p.replace('.', "/"))
            }))
            .with_transform(PathTransform::new("tag", |p, name| {
                Transformed::Path(format!("{p}?from={name}"))
            }));

        assert_eq!(
            resolver("").resolve("app.util", &config).as_deref(),
            Some("app/util?from=app.util.js")
        );
    }

    #[test]
    fn test_keep_short_circuits_pipeline() {
        let transforms = vec![
            PathTransform::new("prefix", |p, _| Transformed::Path(format!("lib/{p}"))),
            PathTransform::new("stop", |_, _| Transformed::Keep),
            PathTransform::new("never", |_, _| Transformed::Path("unreachable".into())),
        ];
        assert_eq!(transform_path("foo", &transforms), "lib/foo");
    }

    #[test]
    fn test_regex_transform() {
        let transform = PathTransform::regex(Regex::new(r"^vendor\.(.*)$").unwrap(), "lib/$1");
        assert_eq!(transform_path("vendor.lodash", &[transform.clone()]), "lib/lodash");
        assert_eq!(transform_path("app", &[transform]), "app");
    }
}
