//! Module-registration interception.
//!
//! A registration `module(name, requires)` is the moment a script tells us
//! what it depends on. The wrapper locks and fetches every dependency whose
//! module and script are both unknown, and releases the registered module's
//! own lock.

use std::sync::{Arc, Weak};

use super::{Inner, LockKey, ReadyFn, Request};
use crate::core::LoaderError;
use crate::host::{ModuleHandle, ModuleRegistry};

/// Decorates a host registry with dependency tracking.
///
/// Holds the loader weakly: once every loader handle is dropped the wrapper
/// degrades to a plain pass-through.
pub struct InterceptedRegistry {
    loader: Weak<Inner>,
    inner: Arc<dyn ModuleRegistry>,
}

impl InterceptedRegistry {
    pub(super) fn new(loader: Weak<Inner>, inner: Arc<dyn ModuleRegistry>) -> Self {
        Self { loader, inner }
    }

    /// The wrapped registry.
    pub fn host(&self) -> &Arc<dyn ModuleRegistry> {
        &self.inner
    }
}

impl ModuleRegistry for InterceptedRegistry {
    fn module(&self, name: &str, requires: Option<&[String]>) -> Result<ModuleHandle, LoaderError> {
        let handle = self.inner.module(name, requires)?;

        // Lookups have no side effects.
        let Some(requires) = requires else {
            return Ok(handle);
        };
        if let Some(loader) = self.loader.upgrade() {
            loader.on_register(name, requires)?;
        }
        Ok(handle)
    }

    fn bootstrap(&self, main: &str) -> Result<(), LoaderError> {
        self.inner.bootstrap(main)
    }
}

impl std::fmt::Debug for InterceptedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptedRegistry")
            .field("attached", &(self.loader.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Track the dependencies of a freshly registered module.
    ///
    /// A dependency is locked and fetched only when neither its module nor
    /// its script is known yet. Its `Module` lock is released by its own
    /// registration, or once its script passes readiness without registering
    /// it.
    fn on_register(self: &Arc<Self>, name: &str, requires: &[String]) -> Result<(), LoaderError> {
        let mut fetches: Vec<(String, String, Option<ReadyFn>)> = Vec::new();
        let (release, timeout) = {
            let mut state = self.state.lock();

            let own = LockKey::module(name);
            let release = if state.resolver.resolve(name, &state.config).is_none() {
                None
            } else if state.locks.in_flight(&own) {
                Some(own)
            } else if state.locks.locked(&own) {
                return Err(LoaderError::DoubleUnlock(own));
            } else {
                crate::debug!("intercept"; "`{}` registered without being required", name);
                None
            };

            for dep in requires {
                let Some(address) = state.resolver.resolve(dep, &state.config) else {
                    continue;
                };
                let module = LockKey::module(dep.as_str());
                let path = LockKey::path(address.as_str());
                if state.locks.locked(&module) || state.locks.locked(&path) {
                    continue;
                }
                state.locks.lock(module)?;
                state.locks.lock(path)?;

                let ready = state.config.checker.get(dep).map(|c| c.normalize(&self.env));
                fetches.push((dep.clone(), address, ready));
            }

            (release, state.timeout)
        };

        for (dep, address, ready) in fetches {
            crate::debug!("intercept"; "`{}` requires `{}`", name, dep);
            let link = self.start(Request::new(dep.as_str()), address, ready, timeout);
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let result = match link.await {
                    Ok(_) => inner.release_in_flight(&LockKey::module(dep)),
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    crate::log!("error"; "{}", e);
                    let _ = inner.bootstrap.reject(e);
                }
            });
        }

        if let Some(own) = release {
            self.unlock(&own)?;
        }
        Ok(())
    }
}
