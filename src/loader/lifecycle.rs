//! Loader lifecycle: init, configuration, external locks and bootstrap.
//!
//! ```text
//! init ──> lock module:app ──> (loads, registrations) ──> outstanding == 0
//!                                                                │ next tick
//!                                                                ▼
//!                                 registry.bootstrap(app) ──> on_bootstrap ──> bootstrapped()
//! ```

use std::sync::Arc;
use std::time::Duration;

use super::{Config, Inner, LoadOptions, LoadPromise, Loader, LockKey, PathResolver, Unlocked};
use crate::core::LoaderError;

/// Default load timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Called with the application name once it has been bootstrapped.
pub type BootstrapFn = Arc<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// InitOptions
// ============================================================================

/// Options of [`Loader::init`].
#[derive(Clone)]
pub struct InitOptions {
    /// Main application module. Mandatory.
    pub app: Option<String>,
    pub root: String,
    pub suffix: String,
    pub timeout: Duration,
    pub on_bootstrap: Option<BootstrapFn>,
    /// Fields present here overwrite the loader's configuration.
    pub config: Config,
    /// Load the main module right away.
    pub boot: bool,
    /// Give up on bootstrap after this long.
    pub stall_timeout: Option<Duration>,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            app: None,
            root: String::new(),
            suffix: super::DEFAULT_SUFFIX.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            on_bootstrap: None,
            config: Config::default(),
            boot: false,
            stall_timeout: None,
        }
    }
}

impl InitOptions {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: Some(app.into()),
            ..Self::default()
        }
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_bootstrap<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_bootstrap = Some(Arc::new(f));
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn boot(mut self) -> Self {
        self.boot = true;
        self
    }

    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for InitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitOptions")
            .field("app", &self.app)
            .field("root", &self.root)
            .field("suffix", &self.suffix)
            .field("timeout", &self.timeout)
            .field("boot", &self.boot)
            .field("stall_timeout", &self.stall_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Public lifecycle operations
// ============================================================================

impl Loader {
    /// Initialize the loader for the application `options.app`.
    ///
    /// Returns the promise of the main module load when `options.boot` is set.
    pub fn init(&self, options: InitOptions) -> Result<Option<LoadPromise>, LoaderError> {
        let app = options
            .app
            .filter(|app| !app.is_empty())
            .ok_or(LoaderError::MissingApp)?;

        {
            let mut state = self.inner.state.lock();
            state.locks.lock(LockKey::module(app.as_str()))?;
            state.timeout = options.timeout;
            state.resolver = PathResolver::new(options.root, options.suffix);
            state.on_bootstrap = options.on_bootstrap;
            state.config.overwrite(options.config);
            state.app = Some(app.clone());
            state.initialized = true;
        }
        crate::debug!("init"; "application `{}`", app);

        self.maybe_intercept();
        if let Some(stall) = options.stall_timeout {
            self.inner.watch_stall(stall);
        }

        if options.boot {
            return self.load_one(app, LoadOptions::default()).map(Some);
        }
        Ok(None)
    }

    /// Merge `config` into the current configuration; existing entries win.
    pub fn configure(&self, config: Config) {
        self.inner.state.lock().config.merge(config);
    }

    /// Hold bootstrap until [`unlock_external`](Self::unlock_external).
    pub fn lock_external(&self, name: &str) -> Result<(), LoaderError> {
        self.inner.state.lock().locks.lock(LockKey::external(name))
    }

    pub fn unlock_external(&self, name: &str) -> Result<(), LoaderError> {
        self.inner.unlock(&LockKey::external(name))
    }
}

// ============================================================================
// Bootstrap machinery
// ============================================================================

impl Inner {
    /// Release `key`, scheduling bootstrap when it was the last lock.
    pub(super) fn unlock(self: &Arc<Self>, key: &LockKey) -> Result<(), LoaderError> {
        let unlocked = self.state.lock().locks.unlock(key)?;
        self.released(key, unlocked);
        Ok(())
    }

    /// Release `key` only if it is still in flight.
    pub(super) fn release_in_flight(self: &Arc<Self>, key: &LockKey) -> Result<(), LoaderError> {
        let unlocked = {
            let mut state = self.state.lock();
            if !state.locks.in_flight(key) {
                return Ok(());
            }
            state.locks.unlock(key)?
        };
        self.released(key, unlocked);
        Ok(())
    }

    fn released(self: &Arc<Self>, key: &LockKey, unlocked: Unlocked) {
        match unlocked {
            Unlocked::Pending(outstanding) => {
                crate::debug!("lock"; "released {}, {} outstanding", key, outstanding);
            }
            Unlocked::Drained => {
                crate::debug!("lock"; "released {}, scheduling bootstrap", key);
                self.schedule_bootstrap();
            }
        }
    }

    /// Bootstrap on the next scheduler tick, never on the caller's stack.
    fn schedule_bootstrap(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            inner.run_bootstrap();
        });
    }

    fn run_bootstrap(&self) {
        let (app, registry, callback) = {
            let state = self.state.lock();
            let registry = state.host.clone().or_else(|| self.env.registry());
            (state.app.clone(), registry, state.on_bootstrap.clone())
        };

        let result = app.ok_or(LoaderError::MissingApp).and_then(|app| {
            if let Some(registry) = registry {
                registry.bootstrap(&app)?;
            }
            Ok(app)
        });

        match result {
            Ok(app) => {
                if let Some(callback) = callback {
                    callback(&app);
                }
                crate::log!("boot"; "`{}` bootstrapped", app);
                let _ = self.bootstrap.resolve(app);
            }
            Err(e) => {
                crate::log!("error"; "bootstrap failed: {}", e);
                let _ = self.bootstrap.reject(e);
            }
        }
    }

    /// Reject `bootstrapped()` if it has not fired after `timeout`.
    fn watch_stall(self: &Arc<Self>, timeout: Duration) {
        let inner = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if !inner.bootstrap.is_pending() {
                return;
            }

            let pending: Vec<String> = {
                let state = inner.state.lock();
                state.locks.pending().iter().map(ToString::to_string).collect()
            };
            crate::log!("error"; "bootstrap stalled, waiting on: {}", pending.join(", "));
            let _ = inner.bootstrap.reject(LoaderError::Stalled {
                elapsed: timeout,
                pending,
            });
        });
    }
}
