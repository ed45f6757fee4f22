//! Core types - pure abstractions shared across the codebase.

mod deferred;
mod error;

pub use deferred::{Deferred, Promise};
pub use error::{FetchError, LoaderError};
