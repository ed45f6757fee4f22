//! `[app]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [app]
//! main = "app"            # main application module (mandatory)
//! root = "scripts"        # prefix of relative script addresses
//! suffix = ".js"          # appended when missing
//! timeout = 30000         # load timeout in ms
//! stall_timeout = 60000   # give up on bootstrap after this many ms, 0 disables
//! boot = true             # load the main module after preloading
//! preload = ["angular"]   # loaded in sequence before the main module
//! registry = "builtin"    # or "script" when a preloaded script installs it
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::loader::{DEFAULT_SUFFIX, DEFAULT_TIMEOUT};

/// Where the module registry comes from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryMode {
    /// A module table installed before anything is loaded (default).
    #[default]
    Builtin,
    /// A loaded script installs the registry (`host = true` in its manifest).
    Script,
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Main application module.
    pub main: String,

    /// Root prefix of relative addresses, also the directory scripts are
    /// read from (relative to the config file).
    pub root: String,

    pub suffix: String,

    /// Load timeout in milliseconds.
    pub timeout: u64,

    /// Bootstrap watchdog in milliseconds, `0` disables it.
    pub stall_timeout: u64,

    pub boot: bool,

    pub preload: Vec<String>,

    pub registry: RegistryMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            main: String::new(),
            root: String::new(),
            suffix: DEFAULT_SUFFIX.to_owned(),
            timeout: DEFAULT_TIMEOUT.as_millis() as u64,
            stall_timeout: 60_000,
            boot: true,
            preload: Vec::new(),
            registry: RegistryMode::Builtin,
        }
    }
}

impl AppConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout > 0).then(|| Duration::from_millis(self.stall_timeout))
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.main.trim().is_empty() {
            diag.error_with_hint(
                FieldPath::new("app.main"),
                "the main application module is mandatory",
                "set `main = \"<module>\"` in the [app] section",
            );
        }
        if self.timeout == 0 {
            diag.error(FieldPath::new("app.timeout"), "must be greater than 0");
        }
        if self.suffix.is_empty() {
            diag.warn(FieldPath::new("app.suffix"), "empty suffix, addresses are used as is");
        }
        if self.registry == RegistryMode::Script && self.preload.is_empty() {
            diag.warn(
                FieldPath::new("app.registry"),
                "`script` registry without preloaded scripts",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_app_config() {
        let config = test_parse_config(
            "root = \"scripts\"\ntimeout = 500\nstall_timeout = 0\npreload = [\"angular\"]\nregistry = \"script\"",
        );

        assert_eq!(config.app.main, "app");
        assert_eq!(config.app.root, "scripts");
        assert_eq!(config.app.timeout(), Duration::from_millis(500));
        assert_eq!(config.app.stall_timeout(), None);
        assert_eq!(config.app.preload, vec!["angular"]);
        assert_eq!(config.app.registry, RegistryMode::Script);
    }

    #[test]
    fn test_app_config_defaults() {
        let app = AppConfig::default();
        assert_eq!(app.suffix, ".js");
        assert_eq!(app.timeout(), Duration::from_secs(30));
        assert_eq!(app.stall_timeout(), Some(Duration::from_secs(60)));
        assert!(app.boot);
        assert_eq!(app.registry, RegistryMode::Builtin);
    }

    #[test]
    fn test_missing_main_rejected() {
        let mut diag = ConfigDiagnostics::new();
        AppConfig::default().validate(&mut diag);
        assert!(diag.has_errors());
        assert_eq!(diag.errors()[0].field.as_str(), "app.main");
    }
}
