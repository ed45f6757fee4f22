//! Host collaborators of the loader.
//!
//! The loader itself never touches the network, the filesystem or the
//! module system. It talks to:
//!
//! - [`Fetch`]: fetch and execute one script address
//! - [`ModuleRegistry`]: the host's module-registration entry point
//! - [`Environment`]: the global namespace scripts define symbols into and
//!   where the current module registry is installed
//!
//! # Module Structure
//!
//! - `manifest` - declarative script format executed by the fetchers
//! - `fs` - fetcher reading scripts from a project directory
//! - `memory` - in-memory fetcher (embedding and tests)
//! - `registry` - a plain module registry

mod fs;
mod manifest;
mod memory;
mod registry;

pub use fs::FsFetcher;
pub use manifest::{ModuleDecl, ScriptManifest};
pub use memory::{FetchRecord, MemoryFetcher, MemoryScript};
pub use registry::ModuleTable;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::{FetchError, LoaderError};

// ============================================================================
// Fetch
// ============================================================================

/// Extra attributes attached to a fetch request.
pub type Attributes = FxHashMap<String, String>;

/// Future returned by [`Fetch::fetch`].
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<LoadEvent, FetchError>> + Send>>;

/// Emitted when a script finished loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEvent {
    pub address: String,
}

impl LoadEvent {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Fetch and execute a script.
///
/// The returned future settles exactly once. The loader bounds it with the
/// load timeout, so implementations need not enforce one themselves.
pub trait Fetch: Send + Sync {
    fn fetch(&self, address: &str, attrs: &Attributes) -> FetchFuture;
}

// ============================================================================
// Module registry
// ============================================================================

/// A registered module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    pub name: String,
    pub requires: Vec<String>,
}

/// The host's module-registration entry point.
pub trait ModuleRegistry: Send + Sync {
    /// Register `name` with its dependencies, or look it up when `requires`
    /// is `None`.
    fn module(&self, name: &str, requires: Option<&[String]>) -> Result<ModuleHandle, LoaderError>;

    /// Start the application rooted at `main`.
    fn bootstrap(&self, main: &str) -> Result<(), LoaderError>;
}

// ============================================================================
// Environment
// ============================================================================

/// Global namespace shared by loaded scripts.
#[derive(Default)]
pub struct Environment {
    symbols: RwLock<FxHashSet<String>>,
    registry: RwLock<Option<Arc<dyn ModuleRegistry>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment with a module registry already installed.
    pub fn with_registry(registry: Arc<dyn ModuleRegistry>) -> Self {
        let env = Self::new();
        env.install_registry(registry);
        env
    }

    pub fn define(&self, symbol: impl Into<String>) {
        self.symbols.write().insert(symbol.into());
    }

    pub fn undefine(&self, symbol: &str) -> bool {
        self.symbols.write().remove(symbol)
    }

    pub fn is_defined(&self, symbol: &str) -> bool {
        self.symbols.read().contains(symbol)
    }

    /// Currently installed module registry.
    pub fn registry(&self) -> Option<Arc<dyn ModuleRegistry>> {
        self.registry.read().clone()
    }

    /// Install (or replace) the module registry.
    pub fn install_registry(&self, registry: Arc<dyn ModuleRegistry>) {
        *self.registry.write() = Some(registry);
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("symbols", &self.symbols.read().len())
            .field("registry", &self.registry.read().is_some())
            .finish()
    }
}
