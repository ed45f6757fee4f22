//! Command-line interface.

mod args;
pub mod load;
pub mod resolve;

pub use args::{Cli, Commands, LoadArgs};
