//! Lock table gating application bootstrap.
//!
//! Every resource the application waits for holds a lock until it is ready.
//! When the last outstanding lock is released the table reports that it has
//! drained, which happens exactly once per loader.
//!
//! # Invariants
//! - A key is locked at most once (`DuplicateLoad`)
//! - Only in-flight keys can be unlocked (`UnknownLock`, `DoubleUnlock`)
//! - The outstanding count reaches zero once (`AlreadyBootstrapped`)

use std::fmt;

use rustc_hash::FxHashMap;

use crate::core::LoaderError;

// ============================================================================
// LockKey
// ============================================================================

/// Namespaced lock key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    /// A resolved script address being fetched.
    Path(String),
    /// A module awaiting its registration call.
    Module(String),
    /// A handle held by a caller outside the dependency graph.
    External(String),
}

impl LockKey {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn module(name: impl Into<String>) -> Self {
        Self::Module(name.into())
    }

    pub fn external(name: impl Into<String>) -> Self {
        Self::External(name.into())
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Module(name) => write!(f, "module:{name}"),
            Self::External(name) => write!(f, "ext:{name}"),
        }
    }
}

// ============================================================================
// LockTable
// ============================================================================

/// Result of a successful unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlocked {
    /// Other locks are still outstanding.
    Pending(usize),
    /// This was the last lock: bootstrap must be scheduled.
    Drained,
}

/// In-flight/completed state per key plus the outstanding count.
#[derive(Debug, Default)]
pub struct LockTable {
    /// `false` = in flight, `true` = completed
    locks: FxHashMap<LockKey, bool>,
    outstanding: usize,
    bootstrapped: bool,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&mut self, key: LockKey) -> Result<(), LoaderError> {
        if self.locks.contains_key(&key) {
            return Err(LoaderError::DuplicateLoad(key));
        }
        self.locks.insert(key, false);
        self.outstanding += 1;
        Ok(())
    }

    pub fn unlock(&mut self, key: &LockKey) -> Result<Unlocked, LoaderError> {
        match self.locks.get_mut(key) {
            None => return Err(LoaderError::UnknownLock(key.clone())),
            Some(true) => return Err(LoaderError::DoubleUnlock(key.clone())),
            Some(done) => *done = true,
        }

        self.outstanding -= 1;
        if self.outstanding > 0 {
            return Ok(Unlocked::Pending(self.outstanding));
        }

        if self.bootstrapped {
            return Err(LoaderError::AlreadyBootstrapped);
        }
        self.bootstrapped = true;
        Ok(Unlocked::Drained)
    }

    #[inline]
    pub fn locked(&self, key: &LockKey) -> bool {
        self.locks.contains_key(key)
    }

    /// Check if a key is locked and not yet released.
    #[inline]
    pub fn in_flight(&self, key: &LockKey) -> bool {
        self.locks.get(key) == Some(&false)
    }

    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    #[inline]
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// Keys still waiting to be released, sorted.
    pub fn pending(&self) -> Vec<LockKey> {
        let mut keys: Vec<_> = self
            .locks
            .iter()
            .filter(|(_, done)| !**done)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

// ============================================================================
// Tests
// ============================================================================
