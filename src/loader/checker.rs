//! Readiness checkers.
//!
//! A fetched script is not necessarily usable yet: it may define its globals
//! asynchronously. A checker is evaluated once right after the fetch, then
//! polled every [`POLL_INTERVAL`] until it passes or the load timeout runs
//! out.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::LoaderError;
use crate::host::Environment;

/// Delay between two evaluations of a pending checker.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Uniform predicate every checker is normalized into, called with the
/// resource name.
pub type ReadyFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

// ============================================================================
// Checker
// ============================================================================

/// How to tell that a loaded script is ready.
#[derive(Clone)]
pub enum Checker {
    /// Arbitrary predicate on the resource name.
    Predicate(ReadyFn),
    /// Ready once every symbol is defined in the environment.
    RequiredSymbols(Vec<String>),
}

impl Checker {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self::RequiredSymbols(vec![symbol.into()])
    }

    pub fn symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RequiredSymbols(symbols.into_iter().map(Into::into).collect())
    }

    /// A checker that always passes.
    pub fn always() -> Self {
        Self::predicate(|_| true)
    }

    /// Resolve into the uniform predicate form.
    pub fn normalize(&self, env: &Arc<Environment>) -> ReadyFn {
        match self {
            Self::Predicate(f) => Arc::clone(f),
            Self::RequiredSymbols(symbols) => {
                let env = Arc::clone(env);
                let symbols = symbols.clone();
                Arc::new(move |_| symbols.iter().all(|s| env.is_defined(s)))
            }
        }
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::RequiredSymbols(symbols) => f.debug_tuple("RequiredSymbols").field(symbols).finish(),
        }
    }
}

/// Call-site checker option of a load.
#[derive(Debug, Clone)]
pub enum CheckerOption {
    /// Same checker for every requested name.
    All(Checker),
    /// Checker per name; names without an entry fall back to the global map.
    PerName(FxHashMap<String, Checker>),
}

/// Build the checker map of one load. Call-site entries win over `global`.
pub fn merge_checkers(
    names: &[String],
    call_site: Option<&CheckerOption>,
    global: &FxHashMap<String, Checker>,
) -> FxHashMap<String, Checker> {
    let mut merged = global.clone();
    match call_site {
        Some(CheckerOption::All(checker)) => {
            for name in names {
                merged.insert(name.clone(), checker.clone());
            }
        }
        Some(CheckerOption::PerName(map)) => {
            merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        None => {}
    }
    merged
}

// ============================================================================
// Polling
// ============================================================================

/// Wait until `ready` passes for `name`.
///
/// No checker means ready right away. Fails with `LoadTimeout` once `timeout`
/// has elapsed since the first evaluation.
pub async fn wait_ready(
    name: &str,
    ready: Option<&ReadyFn>,
    timeout: Duration,
) -> Result<(), LoaderError> {
    let Some(ready) = ready else {
        return Ok(());
    };
    if ready(name) {
        return Ok(());
    }

    let start = Instant::now();
    let mut ticker = tokio::time::interval_at(start + POLL_INTERVAL, POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if ready(name) {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            crate::debug!("check"; "`{}` not ready after {:?}", name, timeout);
            return Err(LoaderError::LoadTimeout(name.to_owned()));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_required_symbols_predicate() {
        let env = Arc::new(Environment::new());
        let ready = Checker::symbols(["jQuery", "_"]).normalize(&env);

        assert!(!ready("libs"));
        env.define("jQuery");
        assert!(!ready("libs"));
        env.define("_");
        assert!(ready("libs"));
    }

    #[test]
    fn test_predicate_receives_name() {
        let env = Arc::new(Environment::new());
        let ready = Checker::predicate(|name| name.starts_with("ok")).normalize(&env);
        assert!(ready("ok.mod"));
        assert!(!ready("other"));
    }

    #[test]
    fn test_call_site_checker_wins() {
        let mut global = FxHashMap::default();
        global.insert("a".to_string(), Checker::symbol("GlobalA"));
        global.insert("b".to_string(), Checker::symbol("GlobalB"));

        let merged = merge_checkers(
            &names(&["a"]),
            Some(&CheckerOption::All(Checker::symbol("Local"))),
            &global,
        );
        assert!(matches!(&merged["a"], Checker::RequiredSymbols(s) if s == &["Local"]));
        assert!(matches!(&merged["b"], Checker::RequiredSymbols(s) if s == &["GlobalB"]));
    }

    #[test]
    fn test_per_name_map_merges_with_global() {
        let mut global = FxHashMap::default();
        global.insert("a".to_string(), Checker::symbol("GlobalA"));

        let mut local = FxHashMap::default();
        local.insert("c".to_string(), Checker::symbol("C"));

        let merged = merge_checkers(&names(&["a", "c"]), Some(&CheckerOption::PerName(local)), &global);
        assert_eq!(merged.len(), 2);
        assert!(matches!(&merged["a"], Checker::RequiredSymbols(s) if s == &["GlobalA"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_checker_is_immediately_ready() {
        assert_eq!(wait_ready("a", None, Duration::ZERO).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_symbol_defined() {
        let env = Arc::new(Environment::new());
        let ready = Checker::symbol("Late").normalize(&env);

        let definer = Arc::clone(&env);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            definer.define("Late");
        });

        let start = Instant::now();
        wait_ready("late", Some(&ready), Duration::from_secs(1)).await.unwrap();

        // Picked up within one polling interval of the definition.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(35));
        assert!(elapsed <= Duration::from_millis(35) + POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_naming_resource() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let ready: ReadyFn = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        let result = wait_ready("never", Some(&ready), Duration::from_millis(50)).await;
        assert_eq!(result, Err(LoaderError::LoadTimeout("never".into())));
        // One immediate evaluation plus one per interval.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }
}
