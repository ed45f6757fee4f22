//! In-memory fetcher.
//!
//! Scripts are registered up front by address. Every fetch is recorded (in
//! call order, with its attributes) before anything is awaited, so callers
//! can assert on fetch order and deduplication.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::Instant;

use super::{Attributes, Environment, Fetch, FetchFuture, LoadEvent, ModuleDecl, ScriptManifest};
use crate::core::FetchError;

/// A script served by [`MemoryFetcher`].
#[derive(Debug, Clone, Default)]
pub struct MemoryScript {
    manifest: ScriptManifest,
    delay: Duration,
    failure: Option<String>,
}

impl MemoryScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manifest(manifest: ScriptManifest) -> Self {
        Self {
            manifest,
            ..Self::default()
        }
    }

    pub fn provides(mut self, symbol: impl Into<String>) -> Self {
        self.manifest.provides.push(symbol.into());
        self
    }

    /// Install a fresh module registry on execution.
    pub fn host(mut self) -> Self {
        self.manifest.host = true;
        self
    }

    pub fn module<I, S>(mut self, name: impl Into<String>, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest.modules.push(ModuleDecl {
            name: name.into(),
            requires: requires.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Time the fetch takes before executing.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the fetch with `reason` instead of executing.
    pub fn fail(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }
}

/// One recorded fetch call.
#[derive(Debug, Clone)]
pub struct FetchRecord {
    pub address: String,
    pub attrs: Attributes,
    pub at: Instant,
}

/// Serves [`MemoryScript`]s and records every fetch.
#[derive(Debug)]
pub struct MemoryFetcher {
    env: Arc<Environment>,
    scripts: Mutex<FxHashMap<String, MemoryScript>>,
    records: Mutex<Vec<FetchRecord>>,
}

impl MemoryFetcher {
    pub fn new(env: Arc<Environment>) -> Self {
        Self {
            env,
            scripts: Mutex::new(FxHashMap::default()),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Serve `script` at `address`.
    pub fn script(self, address: impl Into<String>, script: MemoryScript) -> Self {
        self.insert(address, script);
        self
    }

    pub fn insert(&self, address: impl Into<String>, script: MemoryScript) {
        self.scripts.lock().insert(address.into(), script);
    }

    pub fn records(&self) -> Vec<FetchRecord> {
        self.records.lock().clone()
    }

    /// Fetched addresses in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.address.clone()).collect()
    }

    pub fn fetch_count(&self, address: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.address == address)
            .count()
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, address: &str, attrs: &Attributes) -> FetchFuture {
        self.records.lock().push(FetchRecord {
            address: address.to_owned(),
            attrs: attrs.clone(),
            at: Instant::now(),
        });

        let address = address.to_owned();
        let script = self.scripts.lock().get(&address).cloned();
        let env = Arc::clone(&self.env);

        Box::pin(async move {
            let Some(script) = script else {
                return Err(FetchError::failed(address, "not found"));
            };
            if !script.delay.is_zero() {
                tokio::time::sleep(script.delay).await;
            }
            if let Some(reason) = script.failure {
                return Err(FetchError::failed(address, reason));
            }
            script.manifest.execute(&address, &env)?;
            Ok(LoadEvent::new(address))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_serves_and_records() {
        let env = Arc::new(Environment::new());
        let fetcher = MemoryFetcher::new(Arc::clone(&env))
            .script("a.js", MemoryScript::new().provides("A").delay(Duration::from_millis(20)));

        let mut attrs = Attributes::default();
        attrs.insert("charset".into(), "utf-8".into());

        let start = Instant::now();
        let event = fetcher.fetch("a.js", &attrs).await.unwrap();

        assert_eq!(event.address, "a.js");
        assert!(env.is_defined("A"));
        assert!(start.elapsed() >= Duration::from_millis(20));

        let records = fetcher.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attrs["charset"], "utf-8");
    }

    #[tokio::test]
    async fn test_unknown_and_failing_scripts() {
        let env = Arc::new(Environment::new());
        let fetcher = MemoryFetcher::new(env).script("bad.js", MemoryScript::new().fail("500"));

        let err = fetcher.fetch("bad.js", &Attributes::default()).await.unwrap_err();
        assert_eq!(err, FetchError::failed("bad.js", "500"));

        let err = fetcher.fetch("nope.js", &Attributes::default()).await.unwrap_err();
        assert_eq!(err, FetchError::failed("nope.js", "not found"));

        assert_eq!(fetcher.fetched(), vec!["bad.js", "nope.js"]);
    }
}
