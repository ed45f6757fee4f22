//! Dependency-ordered script loader.
//!
//! # Architecture
//!
//! ```text
//! load(names) ──> PathResolver ──> LockTable ──> Fetch ──> wait_ready ──> unlock
//!                                      │                                   │
//!   module(name, requires) ──> InterceptedRegistry (locks deps)           │
//!                                                                          ▼
//!                                             outstanding == 0 ──> bootstrap(app)
//! ```
//!
//! # Module Structure
//!
//! - `path` - name to address resolution and the transform pipeline
//! - `lock` - lock table and bootstrap gating
//! - `checker` - readiness checkers and polling
//! - `config` - per-loader path/checker/transform configuration
//! - `orchestrate` - parallel and sequential loading
//! - `intercept` - module-registration interception
//! - `lifecycle` - init, configure, external locks, bootstrap

mod checker;
mod config;
mod intercept;
mod lifecycle;
mod lock;
mod orchestrate;
mod path;

pub use checker::{Checker, CheckerOption, POLL_INTERVAL, ReadyFn, merge_checkers, wait_ready};
pub use config::Config;
pub use intercept::InterceptedRegistry;
pub use lifecycle::{BootstrapFn, DEFAULT_TIMEOUT, InitOptions};
pub use lock::{LockKey, LockTable, Unlocked};
pub use path::{
    DEFAULT_SUFFIX, PathOverride, PathResolver, PathTransform, Transformed, is_absolute_uri,
    transform_path,
};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::{Deferred, LoaderError, Promise};
use crate::host::{Attributes, Environment, Fetch, LoadEvent, ModuleRegistry};

/// Aggregate promise of a load: the last completed event, `None` when
/// nothing had to be fetched.
pub type LoadPromise = Promise<Option<LoadEvent>, LoaderError>;

// ============================================================================
// Requests & Options
// ============================================================================

/// A resource to load, with attributes forwarded to the fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub name: String,
    pub attrs: Attributes,
}

impl Request {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Attributes::default(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for Request {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Request {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&String> for Request {
    fn from(name: &String) -> Self {
        Self::new(name.as_str())
    }
}

/// Per-call options of [`Loader::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Fetch one after the other instead of all at once.
    pub sequence: bool,
    pub checker: Option<CheckerOption>,
    /// Overrides the loader timeout for this call.
    pub timeout: Option<Duration>,
    /// Modules to wait for; locked unless already locked.
    pub modules: Vec<String>,
}

impl LoadOptions {
    pub fn sequence(mut self) -> Self {
        self.sequence = true;
        self
    }

    pub fn checker(mut self, checker: CheckerOption) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules.extend(modules.into_iter().map(Into::into));
        self
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Handle to a loader. Cloning shares the same state.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn Fetch>,
    env: Arc<Environment>,
    state: Mutex<State>,
    bootstrap: Deferred<String, LoaderError>,
}

/// Guarded loader state. Never held across an `.await` or a user callback.
struct State {
    config: Config,
    locks: LockTable,
    resolver: PathResolver,
    app: Option<String>,
    timeout: Duration,
    on_bootstrap: Option<BootstrapFn>,
    initialized: bool,
    /// Host registry captured by interception (unwrapped).
    host: Option<Arc<dyn ModuleRegistry>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            config: Config::default(),
            locks: LockTable::new(),
            resolver: PathResolver::default(),
            app: None,
            timeout: DEFAULT_TIMEOUT,
            on_bootstrap: None,
            initialized: false,
            host: None,
        }
    }
}

impl Loader {
    pub fn new(fetcher: Arc<dyn Fetch>, env: Arc<Environment>) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                env,
                state: Mutex::new(State::default()),
                bootstrap: Deferred::new(),
            }),
        }
    }

    pub fn env(&self) -> &Arc<Environment> {
        &self.inner.env
    }

    /// Load resources, in parallel unless `options.sequence` is set.
    ///
    /// Fails synchronously on structural errors and before [`init`](Self::init).
    pub fn load<I, R>(&self, requests: I, options: LoadOptions) -> Result<LoadPromise, LoaderError>
    where
        I: IntoIterator<Item = R>,
        R: Into<Request>,
    {
        let requests: Vec<Request> = requests.into_iter().map(Into::into).collect();
        let plan = self.inner.plan(requests, options)?;

        let promise = if plan.sequence {
            self.inner.load_sequence(plan)?
        } else {
            self.inner.load_parallel(plan)?
        };

        let loader = self.clone();
        Ok(promise.on_success(move |_| {
            loader.maybe_intercept();
        }))
    }

    /// Load a single resource.
    pub fn load_one(
        &self,
        request: impl Into<Request>,
        options: LoadOptions,
    ) -> Result<LoadPromise, LoaderError> {
        self.load([request.into()], options)
    }

    /// Load `name`, ready once `checker` passes.
    pub fn require(&self, name: &str, checker: Checker) -> Result<LoadPromise, LoaderError> {
        self.load_one(name, LoadOptions::default().checker(CheckerOption::All(checker)))
    }

    /// Load several resources in parallel, each with its own checker.
    pub fn require_all<I, S>(&self, pairs: I) -> Result<LoadPromise, LoaderError>
    where
        I: IntoIterator<Item = (S, Checker)>,
        S: Into<String>,
    {
        let checkers: rustc_hash::FxHashMap<String, Checker> =
            pairs.into_iter().map(|(name, c)| (name.into(), c)).collect();
        let mut names: Vec<String> = checkers.keys().cloned().collect();
        names.sort();
        self.load(names, LoadOptions::default().checker(CheckerOption::PerName(checkers)))
    }

    /// Address `name` would be fetched from, `None` when it has no script.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let state = self.inner.state.lock();
        state.resolver.resolve(name, &state.config)
    }

    pub fn locked(&self, key: &LockKey) -> bool {
        self.inner.state.lock().locks.locked(key)
    }

    pub fn outstanding(&self) -> usize {
        self.inner.state.lock().locks.outstanding()
    }

    /// Lock keys still in flight, sorted.
    pub fn pending_locks(&self) -> Vec<LockKey> {
        self.inner.state.lock().locks.pending()
    }

    /// Settles once the application has been bootstrapped (or failed to).
    pub fn bootstrapped(&self) -> Promise<String, LoaderError> {
        self.inner.bootstrap.promise()
    }

    /// Wrap `registry` so registrations lock and fetch their dependencies.
    pub fn intercept(&self, registry: Arc<dyn ModuleRegistry>) -> InterceptedRegistry {
        InterceptedRegistry::new(Arc::downgrade(&self.inner), registry)
    }

    /// Intercept the environment's registry if none has been captured yet.
    ///
    /// Returns whether a registry was captured by this call.
    pub fn maybe_intercept(&self) -> bool {
        let Some(current) = self.inner.env.registry() else {
            return false;
        };
        {
            let mut state = self.inner.state.lock();
            if state.host.is_some() {
                return false;
            }
            state.host = Some(Arc::clone(&current));
        }

        self.inner.env.install_registry(Arc::new(self.intercept(current)));
        crate::debug!("intercept"; "module registry captured");
        true
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Loader")
            .field("app", &state.app)
            .field("outstanding", &state.locks.outstanding())
            .field("initialized", &state.initialized)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
