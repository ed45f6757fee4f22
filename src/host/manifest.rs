//! Declarative script manifests.
//!
//! Scripts handled by the bundled fetchers are TOML documents describing the
//! side effects of running them:
//!
//! ```toml
//! provides = ["jQuery", "$"]   # symbols defined on execution
//! host = true                  # installs a fresh module registry
//!
//! [deferred]                   # symbols defined some time later
//! delay = 40
//! provides = ["jQuery.ready"]
//!
//! [[module]]
//! name = "app"
//! requires = ["app.util", "ngRoute"]
//! ```
//!
//! Execution order: registry install, symbols, module registrations,
//! then the deferred symbols on a spawned task.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{Environment, ModuleTable};
use crate::core::FetchError;

/// A module registration performed by a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModuleDecl {
    pub name: String,
    pub requires: Vec<String>,
}

/// Symbols a script defines after a delay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeferredSymbols {
    /// Delay in milliseconds.
    pub delay: u64,
    pub provides: Vec<String>,
}

/// Parsed script manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScriptManifest {
    pub provides: Vec<String>,
    pub host: bool,
    pub deferred: Option<DeferredSymbols>,
    #[serde(rename = "module")]
    pub modules: Vec<ModuleDecl>,
}

impl ScriptManifest {
    /// Parse a manifest fetched from `address`.
    pub fn parse(address: &str, content: &str) -> Result<Self, FetchError> {
        toml::from_str(content).map_err(|e| FetchError::failed(address, e.message()))
    }

    /// Run the script's side effects against `env`.
    ///
    /// Deferred symbols are defined on a spawned task, so a manifest that has
    /// them must be executed inside a Tokio runtime.
    pub fn execute(&self, address: &str, env: &Arc<Environment>) -> Result<(), FetchError> {
        if self.host {
            env.install_registry(Arc::new(ModuleTable::new()));
        }

        for symbol in &self.provides {
            env.define(symbol.as_str());
        }

        if !self.modules.is_empty() {
            let registry = env
                .registry()
                .ok_or_else(|| FetchError::failed(address, "no module registry is installed"))?;
            for decl in &self.modules {
                registry
                    .module(&decl.name, Some(&decl.requires))
                    .map_err(|e| FetchError::failed(address, e))?;
            }
        }

        if let Some(deferred) = self.deferred.clone().filter(|d| !d.provides.is_empty()) {
            let env = Arc::clone(env);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(deferred.delay)).await;
                for symbol in deferred.provides {
                    env.define(symbol);
                }
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ModuleRegistry;

    const MANIFEST: &str = r#"
        provides = ["angular"]
        host = true

        [[module]]
        name = "app"
        requires = ["app.util"]

        [[module]]
        name = "app.util"
    "#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ScriptManifest::parse("r/app.js", MANIFEST).unwrap();
        assert_eq!(manifest.provides, vec!["angular"]);
        assert!(manifest.host);
        assert_eq!(manifest.modules.len(), 2);
        assert_eq!(manifest.modules[0].requires, vec!["app.util"]);
        assert!(manifest.modules[1].requires.is_empty());
    }

    #[test]
    fn test_parse_error_names_address() {
        let err = ScriptManifest::parse("r/bad.js", "provides = 3").unwrap_err();
        assert_eq!(err.address(), "r/bad.js");
    }

    #[test]
    fn test_execute_installs_host_then_registers() {
        let env = Arc::new(Environment::new());
        let manifest = ScriptManifest::parse("r/app.js", MANIFEST).unwrap();
        manifest.execute("r/app.js", &env).unwrap();

        assert!(env.is_defined("angular"));
        let registry = env.registry().unwrap();
        assert_eq!(
            registry.module("app", None).unwrap().requires,
            vec!["app.util".to_string()]
        );
    }

    #[test]
    fn test_registration_without_registry_fails() {
        let env = Arc::new(Environment::new());
        let manifest = ScriptManifest::parse("r/m.js", "[[module]]\nname = \"m\"").unwrap();
        let err = manifest.execute("r/m.js", &env).unwrap_err();
        assert!(err.to_string().contains("no module registry"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_symbols_defined_later() {
        let env = Arc::new(Environment::new());
        let manifest = ScriptManifest::parse(
            "r/late.js",
            "[deferred]\ndelay = 30\nprovides = [\"Late\"]",
        )
        .unwrap();
        manifest.execute("r/late.js", &env).unwrap();

        assert!(!env.is_defined("Late"));
        tokio::time::sleep(Duration::from_millis(31)).await;
        assert!(env.is_defined("Late"));
    }
}
