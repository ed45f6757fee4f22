//! `load` command: preload, load, then wait for the bootstrap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use scriptload::config::{ProjectConfig, RegistryMode};
use scriptload::host::{Environment, FsFetcher, ModuleTable};
use scriptload::loader::{LoadOptions, Loader};
use scriptload::logger::StatusLine;
use scriptload::{debug, log};

use super::LoadArgs;

/// Run the `load` command on a fresh current-thread runtime.
pub fn run_load(args: &LoadArgs, config: &ProjectConfig) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let started = Instant::now();
    let message = rt.block_on(load(args, config))?;
    StatusLine::success(&message, started.elapsed());
    Ok(())
}

/// Drive one load session, returning the status message on success.
pub async fn load(args: &LoadArgs, config: &ProjectConfig) -> Result<String> {
    let env = Arc::new(Environment::new());
    if config.app.registry == RegistryMode::Builtin {
        env.install_registry(Arc::new(ModuleTable::new()));
    }

    let fetcher = Arc::new(FsFetcher::new(config.script_dir(), Arc::clone(&env)));
    let loader = Loader::new(fetcher, env);

    let mut options = config.init_options()?;
    if let Some(ms) = args.timeout {
        options = options.timeout(Duration::from_millis(ms));
    }
    loader.init(options)?;

    let preload = &config.app.preload;
    if !preload.is_empty() {
        debug!("load"; "preloading {}", preload.join(", "));
        loader
            .load(preload, LoadOptions::default().sequence())?
            .await
            .context("preload failed")?;
    }

    if !args.names.is_empty() {
        let options = if args.sequence {
            LoadOptions::default().sequence()
        } else {
            LoadOptions::default()
        };
        loader
            .load(&args.names, options)?
            .await
            .with_context(|| format!("failed to load {}", args.names.join(", ")))?;
        log!("load"; "loaded {}", args.names.join(", "));
    }

    if !config.app.boot || args.no_boot {
        return Ok(format!("loaded {} script(s)", preload.len() + args.names.len()));
    }

    let app = config.app.main.as_str();
    loader
        .load_one(app, LoadOptions::default())?
        .await
        .with_context(|| format!("failed to load main module `{app}`"))?;

    let app = loader.bootstrapped().await.context("bootstrap failed")?;
    Ok(format!("bootstrapped `{app}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptload::core::LoaderError;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn project(config: &str, scripts: &[(&str, &str)]) -> (TempDir, ProjectConfig) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scriptload.toml");
        fs::write(&path, config).unwrap();
        for (name, content) in scripts {
            let script = dir.path().join(name);
            fs::create_dir_all(script.parent().unwrap()).unwrap();
            fs::write(script, content).unwrap();
        }
        let config = ProjectConfig::load(&path).unwrap();
        (dir, config)
    }

    #[tokio::test]
    async fn test_load_bootstraps_builtin_registry() {
        let (_dir, config) = project(
            "[app]\nmain = \"app\"\nroot = \"js\"",
            &[
                ("js/app.js", "[[module]]\nname = \"app\"\nrequires = [\"widgets\"]"),
                ("js/widgets.js", "[[module]]\nname = \"widgets\""),
            ],
        );

        let message = load(&LoadArgs::default(), &config).await.unwrap();
        assert_eq!(message, "bootstrapped `app`");
    }

    #[tokio::test]
    async fn test_load_script_registry_preloaded() {
        let (_dir, config) = project(
            "[app]\nmain = \"app\"\nregistry = \"script\"\npreload = [\"framework\"]",
            &[
                ("framework.js", "host = true\nprovides = [\"framework\"]"),
                ("app.js", "[[module]]\nname = \"app\"\nrequires = []"),
            ],
        );

        let message = load(&LoadArgs::default(), &config).await.unwrap();
        assert_eq!(message, "bootstrapped `app`");
    }

    #[tokio::test]
    async fn test_load_demo_project() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/basic/scriptload.toml");
        let config = ProjectConfig::load(&path).unwrap();

        let message = load(&LoadArgs::default(), &config).await.unwrap();
        assert_eq!(message, "bootstrapped `app`");
    }

    #[tokio::test]
    async fn test_load_without_boot() {
        let (_dir, config) = project(
            "[app]\nmain = \"app\"\nboot = false",
            &[("a.js", "provides = [\"A\"]"), ("b.js", "provides = [\"B\"]")],
        );
        let args = LoadArgs {
            names: vec!["a".into(), "b".into()],
            sequence: true,
            ..LoadArgs::default()
        };

        let message = load(&args, &config).await.unwrap();
        assert_eq!(message, "loaded 2 script(s)");
    }

    #[tokio::test]
    async fn test_missing_script_fails() {
        let (_dir, config) = project("[app]\nmain = \"app\"", &[]);

        let err = load(&LoadArgs::default(), &config).await.unwrap_err();
        assert!(err.to_string().contains("main module `app`"));
        assert!(matches!(
            err.downcast_ref::<LoaderError>(),
            Some(LoaderError::Fetch(_))
        ));
    }
}
