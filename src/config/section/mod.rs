//! Configuration section definitions.
//!
//! | Module     | TOML Section                          | Purpose                     |
//! |------------|---------------------------------------|-----------------------------|
//! | `app`      | `[app]`                               | Main module, root, timeouts |
//! | `resource` | `[path]`, `[checker]`, `[[transform]]` | Per-resource overrides      |

mod app;
mod resource;

pub use app::{AppConfig, RegistryMode};
pub use resource::{CheckerEntry, PathEntry, TransformConfig};
