//! Scriptload - a dependency-ordered script loader.
//!
//! Scripts are fetched at most once, gated by readiness checks, and the
//! main application module is bootstrapped once every outstanding load
//! has settled.

pub mod config;
pub mod core;
pub mod host;
pub mod loader;
pub mod logger;
