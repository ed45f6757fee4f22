//! Project configuration management for `scriptload.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── app        # [app]
//! │   └── resource   # [path], [checker], [[transform]]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # ProjectConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section         | Purpose                                        |
//! |-----------------|------------------------------------------------|
//! | `[app]`         | Main module, root prefix, timeouts, preloading |
//! | `[path]`        | Per-name address overrides (or `false`)        |
//! | `[checker]`     | Global symbols each resource must define       |
//! | `[[transform]]` | Regex rewrites applied to names                |

pub mod section;
pub mod types;
mod util;

pub use section::{AppConfig, CheckerEntry, PathEntry, RegistryMode, TransformConfig};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};
pub use util::{find_config_file, find_config_from};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::loader::{Config, InitOptions};
use crate::log;

/// Default config file name.
pub const CONFIG_FILE: &str = "scriptload.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing scriptload.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub path: FxHashMap<String, PathEntry>,

    #[serde(default)]
    pub checker: FxHashMap<String, CheckerEntry>,

    #[serde(default)]
    pub transform: Vec<TransformConfig>,
}

impl ProjectConfig {
    /// Load and validate the configuration at `path`.
    ///
    /// Unknown fields are reported as warnings.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        config.config_path = path.to_path_buf();
        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Validate every section, collecting all errors at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        self.app.validate(&mut diag);
        for (name, entry) in sorted(&self.path) {
            entry.validate(name, &mut diag);
        }
        for (name, entry) in sorted(&self.checker) {
            entry.validate(name, &mut diag);
        }
        for (index, transform) in self.transform.iter().enumerate() {
            transform.validate(index, &mut diag);
        }

        diag.print_warnings();
        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    /// Directory scripts are read from.
    pub fn script_dir(&self) -> &Path {
        &self.root
    }

    /// Loader configuration: path overrides, global checkers, transforms.
    pub fn loader_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::new();

        for (name, entry) in &self.path {
            let entry = entry.to_override().ok_or_else(|| {
                ConfigError::Validation(format!("`path.{name}` must be a path or `false`"))
            })?;
            config.path.insert(name.clone(), entry);
        }
        for (name, entry) in &self.checker {
            config.checker.insert(name.clone(), entry.to_checker());
        }
        for transform in &self.transform {
            let compiled = transform
                .compile()
                .map_err(|e| ConfigError::Validation(format!("invalid transform: {e}")))?;
            config.transforms.push(compiled);
        }

        Ok(config)
    }

    /// Init options for the loader. Booting is left to the caller so that
    /// preloading can happen first.
    pub fn init_options(&self) -> Result<InitOptions, ConfigError> {
        let mut options = InitOptions::new(self.app.main.as_str())
            .root(self.app.root.as_str())
            .suffix(self.app.suffix.as_str())
            .timeout(self.app.timeout())
            .config(self.loader_config()?);
        options.stall_timeout = self.app.stall_timeout();
        Ok(options)
    }
}

fn sorted<V>(map: &FxHashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config with the minimal required `[app]` section prepended.
/// Panics if there are unknown fields (to catch config typos in tests).
///
/// `extra` continues the `[app]` section until it opens another one.
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> ProjectConfig {
    let config = format!("[app]\nmain = \"app\"\n{extra}");
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(&config).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PathOverride;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        let result = ProjectConfig::parse_with_ignored("[app\nmain = \"app\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[app]\nmain = \"app\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.app.main, "app");
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_loader_config() {
        let config = test_parse_config(
            "[path]\nngRoute = false\njquery = \"vendor/jquery\"\n[checker]\njquery = \"jQuery\"\n[[transform]]\npattern = \"^x$\"\nreplace = \"y\"",
        );
        let loader = config.loader_config().unwrap();

        assert_eq!(loader.path["ngRoute"], PathOverride::NoPath);
        assert_eq!(loader.path["jquery"], PathOverride::Path("vendor/jquery".into()));
        assert!(loader.checker.contains_key("jquery"));
        assert_eq!(loader.transforms.len(), 1);
    }

    #[test]
    fn test_init_options() {
        let config = test_parse_config("root = \"scripts\"\ntimeout = 1500\nstall_timeout = 0");
        let options = config.init_options().unwrap();

        assert_eq!(options.app.as_deref(), Some("app"));
        assert_eq!(options.root, "scripts");
        assert_eq!(options.timeout, Duration::from_millis(1500));
        assert_eq!(options.stall_timeout, None);
        assert!(!options.boot);
    }

    #[test]
    fn test_load_collects_all_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[app]\ntimeout = 0\n[path]\nx = true").unwrap();

        let err = ProjectConfig::load(&path).unwrap_err();
        let Some(ConfigError::Diagnostics(diag)) = err.downcast_ref::<ConfigError>() else {
            panic!("expected diagnostics, got {err}");
        };
        let fields: Vec<_> = diag.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["app.main", "app.timeout", "path.x"]);
    }

    #[test]
    fn test_load_sets_root() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[app]\nmain = \"app\"").unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.script_dir(), dir.path());
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn test_missing_file() {
        let err = ProjectConfig::load(Path::new("/nonexistent/scriptload.toml")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Io(..))
        ));
    }
}
