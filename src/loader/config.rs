//! Per-loader path/checker/transform configuration.

use rustc_hash::FxHashMap;

use super::{Checker, PathOverride, PathTransform};

/// Path overrides, readiness checkers and the transform pipeline.
///
/// `configure` merges additively (entries already present win), while `init`
/// overwrites whole fields.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub path: FxHashMap<String, PathOverride>,
    pub checker: FxHashMap<String, Checker>,
    pub transforms: Vec<PathTransform>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.path.insert(name.into(), PathOverride::Path(path.into()));
        self
    }

    /// Mark `name` as having no script.
    pub fn without_path(mut self, name: impl Into<String>) -> Self {
        self.path.insert(name.into(), PathOverride::NoPath);
        self
    }

    pub fn with_checker(mut self, name: impl Into<String>, checker: Checker) -> Self {
        self.checker.insert(name.into(), checker);
        self
    }

    pub fn with_transform(mut self, transform: PathTransform) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.checker.is_empty() && self.transforms.is_empty()
    }

    /// Additive merge: existing keys are never overridden, transforms append.
    pub fn merge(&mut self, other: Config) {
        for (name, entry) in other.path {
            self.path.entry(name).or_insert(entry);
        }
        for (name, checker) in other.checker {
            self.checker.entry(name).or_insert(checker);
        }
        self.transforms.extend(other.transforms);
    }

    /// Field-wise overwrite: every non-empty field of `other` replaces ours.
    pub fn overwrite(&mut self, other: Config) {
        if !other.path.is_empty() {
            self.path = other.path;
        }
        if !other.checker.is_empty() {
            self.checker = other.checker;
        }
        if !other.transforms.is_empty() {
            self.transforms = other.transforms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Transformed;

    #[test]
    fn test_merge_keeps_existing_entries() {
        let mut config = Config::new()
            .with_path("jquery", "vendor/jquery")
            .with_checker("jquery", Checker::symbol("jQuery"));

        config.merge(
            Config::new()
                .with_path("jquery", "cdn/jquery")
                .without_path("ngRoute")
                .with_checker("jquery", Checker::symbol("$"))
                .with_transform(PathTransform::new("id", |p, _| Transformed::Path(p.into()))),
        );

        assert_eq!(
            config.path["jquery"],
            PathOverride::Path("vendor/jquery".into())
        );
        assert_eq!(config.path["ngRoute"], PathOverride::NoPath);
        assert!(matches!(
            &config.checker["jquery"],
            Checker::RequiredSymbols(symbols) if symbols == &["jQuery"]
        ));
        assert_eq!(config.transforms.len(), 1);
    }

    #[test]
    fn test_merge_appends_transforms_in_order() {
        let mut config =
            Config::new().with_transform(PathTransform::new("a", |_, _| Transformed::Keep));
        config.merge(Config::new().with_transform(PathTransform::new("b", |_, _| Transformed::Keep)));

        let labels: Vec<_> = config.transforms.iter().map(|t| format!("{t:?}")).collect();
        assert_eq!(labels, vec!["PathTransform(\"a\")", "PathTransform(\"b\")"]);
    }

    #[test]
    fn test_overwrite_replaces_present_fields() {
        let mut config = Config::new()
            .with_path("a", "one")
            .with_path("b", "two")
            .with_checker("a", Checker::symbol("A"));

        config.overwrite(Config::new().with_path("c", "three"));

        assert_eq!(config.path.len(), 1);
        assert!(config.path.contains_key("c"));
        // Untouched field survives.
        assert!(config.checker.contains_key("a"));
    }
}
