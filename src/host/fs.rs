//! Fetcher reading script manifests from a project directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Attributes, Environment, Fetch, FetchFuture, LoadEvent, ScriptManifest};
use crate::core::FetchError;
use crate::loader::is_absolute_uri;

/// Resolves addresses against `root` and executes the manifest found there.
///
/// Root-relative addresses (`/lib/x.js`) are taken relative to `root` too.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
    env: Arc<Environment>,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>, env: Arc<Environment>) -> Self {
        Self {
            root: root.into(),
            env,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of `address`, `None` for remote addresses.
    pub fn locate(&self, address: &str) -> Option<PathBuf> {
        if is_absolute_uri(address) {
            return None;
        }
        Some(self.root.join(address.trim_start_matches('/')))
    }
}

impl Fetch for FsFetcher {
    fn fetch(&self, address: &str, _attrs: &Attributes) -> FetchFuture {
        let address = address.to_owned();
        let location = self.locate(&address);
        let env = Arc::clone(&self.env);

        Box::pin(async move {
            let Some(location) = location else {
                return Err(FetchError::failed(address, "remote addresses are not supported"));
            };

            crate::debug!("fetch"; "reading {}", location.display());
            let content = tokio::fs::read_to_string(&location)
                .await
                .map_err(|e| FetchError::failed(&address, e))?;

            let manifest = ScriptManifest::parse(&address, &content)?;
            manifest.execute(&address, &env)?;
            Ok(LoadEvent::new(address))
        })
    }
}
