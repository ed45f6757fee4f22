//! `resolve` command: show where each name would be fetched from.

use std::sync::Arc;

use anyhow::Result;
use owo_colors::OwoColorize;
use scriptload::config::ProjectConfig;
use scriptload::host::{Environment, FsFetcher};
use scriptload::loader::PathResolver;

/// Resolution of a single name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No script; the name is provided elsewhere.
    NoScript,
    /// Remote address, never read from disk.
    Remote(String),
    Local { address: String, exists: bool },
}

pub fn run_resolve(names: &[String], config: &ProjectConfig) -> Result<()> {
    for (name, resolution) in resolve_names(names, config)? {
        match resolution {
            Resolution::NoScript => println!("{} {}", name.bold(), "(no script)".dimmed()),
            Resolution::Remote(address) => println!("{} → {}", name.bold(), address.cyan()),
            Resolution::Local { address, exists } => {
                if exists {
                    println!("{} → {}", name.bold(), address.green());
                } else {
                    println!("{} → {} {}", name.bold(), address.red(), "(missing)".dimmed());
                }
            }
        }
    }
    Ok(())
}

pub fn resolve_names(
    names: &[String],
    config: &ProjectConfig,
) -> Result<Vec<(String, Resolution)>> {
    let loader_config = config.loader_config()?;
    let resolver = PathResolver::new(config.app.root.as_str(), config.app.suffix.as_str());
    let fetcher = FsFetcher::new(config.script_dir(), Arc::new(Environment::new()));

    let resolved = names
        .iter()
        .map(|name| {
            let resolution = match resolver.resolve(name, &loader_config) {
                None => Resolution::NoScript,
                Some(address) => match fetcher.locate(&address) {
                    None => Resolution::Remote(address),
                    Some(path) => Resolution::Local {
                        exists: path.is_file(),
                        address,
                    },
                },
            };
            (name.clone(), resolution)
        })
        .collect();
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scriptload.toml");
        fs::write(
            &path,
            "[app]\nmain = \"app\"\nroot = \"js\"\n[path]\nngRoute = false\ncdn = \"https://cdn.example.com/x.js\"",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/app.js"), "").unwrap();
        let config = ProjectConfig::load(&path).unwrap();

        let names: Vec<String> = ["app", "ngRoute", "cdn", "missing"]
            .into_iter()
            .map(String::from)
            .collect();
        let resolved = resolve_names(&names, &config).unwrap();

        assert_eq!(
            resolved,
            vec![
                (
                    "app".into(),
                    Resolution::Local {
                        address: "js/app.js".into(),
                        exists: true
                    }
                ),
                ("ngRoute".into(), Resolution::NoScript),
                (
                    "cdn".into(),
                    Resolution::Remote("https://cdn.example.com/x.js".into())
                ),
                (
                    "missing".into(),
                    Resolution::Local {
                        address: "js/missing.js".into(),
                        exists: false
                    }
                ),
            ]
        );
    }
}
