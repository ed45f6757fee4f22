//! Loader error types.
//!
//! Two families share one enum:
//! - structural violations (`DuplicateLoad`, `UnknownLock`, `DoubleUnlock`,
//!   `AlreadyBootstrapped`, `AlreadySettled`) mean a broken invariant and are
//!   never recovered from
//! - load failures (`Fetch`, `LoadTimeout`) only abort the load that hit them

use std::time::Duration;

use thiserror::Error;

use crate::loader::LockKey;

// ============================================================================
// LoaderError
// ============================================================================

/// Errors raised by the loader and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("deferred settled twice")]
    AlreadySettled,

    #[error("`{0}` is being loaded twice")]
    DuplicateLoad(LockKey),

    #[error("`{0}` was not loaded")]
    UnknownLock(LockKey),

    #[error("`{0}` was loaded twice")]
    DoubleUnlock(LockKey),

    #[error("application already bootstrapped")]
    AlreadyBootstrapped,

    #[error("timed out loading `{0}`")]
    LoadTimeout(String),

    #[error("the main application module is mandatory")]
    MissingApp,

    #[error("loader must be initialized before loading")]
    NotInitialized,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Raised by a module registry.
    #[error("{0}")]
    Host(String),

    #[error("bootstrap stalled after {elapsed:?}, still waiting on: {}", pending.join(", "))]
    Stalled {
        elapsed: Duration,
        pending: Vec<String>,
    },
}

impl LoaderError {
    /// Check if this error is a broken lock/settle invariant.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::AlreadySettled
                | Self::DuplicateLoad(_)
                | Self::UnknownLock(_)
                | Self::DoubleUnlock(_)
                | Self::AlreadyBootstrapped
        )
    }
}

// ============================================================================
// FetchError
// ============================================================================

/// Failure reported by a [`Fetch`](crate::host::Fetch) collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("failed to load `{address}`: {reason}")]
    Failed { address: String, reason: String },

    #[error("`{address}` did not load within {timeout:?}")]
    TimedOut { address: String, timeout: Duration },
}

impl FetchError {
    pub fn failed(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Failed {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Address of the script that failed.
    pub fn address(&self) -> &str {
        match self {
            Self::Failed { address, .. } | Self::TimedOut { address, .. } => address,
        }
    }
}
