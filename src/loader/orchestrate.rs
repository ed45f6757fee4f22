//! Parallel and sequential loading.
//!
//! Both strategies share one unit of work per resource: fetch (bounded by
//! the timeout), wait for readiness, release the `Path` lock. They differ in
//! when the next unit starts and how outcomes fold into the aggregate:
//!
//! - parallel: every unit starts at once; the aggregate resolves when the
//!   last one finishes and rejects on the first failure
//! - sequential: unit N+1 starts after unit N settled; the chain stops at the
//!   first failure

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rustc_hash::FxHashMap;

use super::{Inner, LoadOptions, LoadPromise, LockKey, ReadyFn, Request, merge_checkers, wait_ready};
use crate::core::{Deferred, FetchError, LoaderError, Promise};
use crate::host::{FetchFuture, LoadEvent};

/// A started unit of work.
pub(super) type Link = Pin<Box<dyn Future<Output = Result<LoadEvent, LoaderError>> + Send>>;

/// Everything a load needs once its options are resolved.
pub(super) struct Plan {
    pub sequence: bool,
    pub requests: Vec<Request>,
    pub checkers: FxHashMap<String, ReadyFn>,
    pub timeout: Duration,
}

impl Inner {
    /// Validate a load call and resolve its options against the loader state.
    pub(super) fn plan(&self, requests: Vec<Request>, options: LoadOptions) -> Result<Plan, LoaderError> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(LoaderError::NotInitialized);
        }

        for module in &options.modules {
            let key = LockKey::module(module.as_str());
            if !state.locks.locked(&key) {
                state.locks.lock(key)?;
            }
        }

        let names: Vec<String> = requests.iter().map(|r| r.name.clone()).collect();
        let checkers = merge_checkers(&names, options.checker.as_ref(), &state.config.checker)
            .into_iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, checker)| {
                let ready = checker.normalize(&self.env);
                (name, ready)
            })
            .collect();

        Ok(Plan {
            sequence: options.sequence,
            requests,
            checkers,
            timeout: options.timeout.unwrap_or(state.timeout),
        })
    }

    /// Resolve and lock the next loadable request, skipping unresolvable
    /// names and paths that are already locked.
    fn claim(&self, request: Request) -> Result<Option<(Request, String)>, LoaderError> {
        let mut state = self.state.lock();
        let Some(address) = state.resolver.resolve(&request.name, &state.config) else {
            crate::debug!("load"; "`{}` has no script, skipped", request.name);
            return Ok(None);
        };

        let key = LockKey::path(address.as_str());
        if state.locks.locked(&key) {
            crate::debug!("load"; "`{}` already requested", address);
            return Ok(None);
        }
        state.locks.lock(key)?;
        Ok(Some((request, address)))
    }

    fn claim_next(&self, queue: &mut VecDeque<Request>) -> Result<Option<(Request, String)>, LoaderError> {
        while let Some(request) = queue.pop_front() {
            if let Some(claimed) = self.claim(request)? {
                return Ok(Some(claimed));
            }
        }
        Ok(None)
    }

    /// Start fetching `address` now and return the rest of the unit.
    ///
    /// The `Path` lock must already be held.
    pub(super) fn start(
        self: &Arc<Self>,
        request: Request,
        address: String,
        ready: Option<ReadyFn>,
        timeout: Duration,
    ) -> Link {
        crate::debug!("fetch"; "{}", address);
        let fetch = self.fetcher.fetch(&address, &request.attrs);
        Box::pin(settle(Arc::clone(self), request, address, fetch, ready, timeout))
    }

    pub(super) fn load_parallel(self: &Arc<Self>, plan: Plan) -> Result<LoadPromise, LoaderError> {
        let mut claimed = Vec::new();
        for request in plan.requests {
            claimed.extend(self.claim(request)?);
        }
        if claimed.is_empty() {
            return Ok(Promise::resolved(None));
        }

        let deferred = Deferred::new();
        let remaining = Arc::new(AtomicUsize::new(claimed.len()));

        for (request, address) in claimed {
            let ready = plan.checkers.get(&request.name).cloned();
            let link = self.start(request, address, ready, plan.timeout);
            let deferred = deferred.clone();
            let remaining = Arc::clone(&remaining);

            tokio::spawn(async move {
                match link.await {
                    Ok(event) => {
                        if remaining.fetch_sub(1, Ordering::SeqCst) == 1 && deferred.is_pending() {
                            let _ = deferred.resolve(Some(event));
                        }
                    }
                    Err(e) => {
                        if deferred.is_pending() {
                            crate::log!("error"; "{}", e);
                            let _ = deferred.reject(e);
                        } else {
                            crate::debug!("load"; "ignored after rejection: {}", e);
                        }
                    }
                }
            });
        }

        Ok(deferred.promise())
    }

    pub(super) fn load_sequence(self: &Arc<Self>, plan: Plan) -> Result<LoadPromise, LoaderError> {
        let mut queue: VecDeque<Request> = plan.requests.into();
        let Some((request, address)) = self.claim_next(&mut queue)? else {
            return Ok(Promise::resolved(None));
        };

        let deferred = Deferred::new();
        let promise = deferred.promise();
        let ready = plan.checkers.get(&request.name).cloned();
        let link = self.start(request, address, ready, plan.timeout);

        let chain = Chain {
            inner: Arc::clone(self),
            queue,
            checkers: plan.checkers,
            timeout: plan.timeout,
        };
        tokio::spawn(async move {
            match chain.run(link).await {
                Ok(event) => {
                    let _ = deferred.resolve(Some(event));
                }
                Err(e) => {
                    crate::log!("error"; "{}", e);
                    let _ = deferred.reject(e);
                }
            }
        });

        Ok(promise)
    }
}

/// Remaining links of a sequential load.
struct Chain {
    inner: Arc<Inner>,
    queue: VecDeque<Request>,
    checkers: FxHashMap<String, ReadyFn>,
    timeout: Duration,
}

impl Chain {
    /// Drive `link` and every link after it; the next one is claimed only
    /// once the current one has settled.
    async fn run(mut self, mut link: Link) -> Result<LoadEvent, LoaderError> {
        loop {
            let event = link.await?;
            match self.inner.claim_next(&mut self.queue)? {
                Some((request, address)) => {
                    let ready = self.checkers.get(&request.name).cloned();
                    link = self.inner.start(request, address, ready, self.timeout);
                }
                None => return Ok(event),
            }
        }
    }
}

/// Rest of a unit once its fetch is under way.
async fn settle(
    inner: Arc<Inner>,
    request: Request,
    address: String,
    fetch: FetchFuture,
    ready: Option<ReadyFn>,
    timeout: Duration,
) -> Result<LoadEvent, LoaderError> {
    let event = match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => result?,
        Err(_) => return Err(FetchError::TimedOut { address, timeout }.into()),
    };

    wait_ready(&request.name, ready.as_ref(), timeout).await?;
    inner.unlock(&LockKey::path(address))?;
    Ok(event)
}
