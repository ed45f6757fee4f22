//! A minimal single-resolution future.
//!
//! [`Deferred`] is the write side (resolve/reject), [`Promise`] the read side
//! (subscribe or `.await`). Subscribers registered after settlement are
//! replayed synchronously on the caller's stack.
//!
//! ```text
//! Pending ──resolve──> Succeeded(T)
//!    └─────reject────> Failed(E)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use super::LoaderError;

type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type ErrorFn<E> = Box<dyn FnOnce(E) + Send>;

enum State<T, E> {
    Pending {
        success: Vec<SuccessFn<T>>,
        error: Vec<ErrorFn<E>>,
        wakers: Vec<Waker>,
    },
    Succeeded(T),
    Failed(E),
}

impl<T, E> State<T, E> {
    const fn pending() -> Self {
        Self::Pending {
            success: Vec::new(),
            error: Vec::new(),
            wakers: Vec::new(),
        }
    }
}

type Shared<T, E> = Arc<Mutex<State<T, E>>>;

// ============================================================================
// Deferred (write side)
// ============================================================================

/// Settles its [`Promise`] exactly once.
pub struct Deferred<T, E> {
    shared: Shared<T, E>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(State::pending())),
        }
    }

    /// Public handle for subscribers.
    pub fn promise(&self) -> Promise<T, E> {
        Promise {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.shared.lock(), State::Pending { .. })
    }

    /// Settle successfully, running success subscribers in registration order.
    pub fn resolve(&self, value: T) -> Result<(), LoaderError> {
        let (success, _, wakers) = self.settle(State::Succeeded(value.clone()))?;
        for callback in success {
            callback(value.clone());
        }
        wakers.into_iter().for_each(Waker::wake);
        Ok(())
    }

    /// Settle with a failure, running error subscribers in registration order.
    pub fn reject(&self, reason: E) -> Result<(), LoaderError> {
        let (_, error, wakers) = self.settle(State::Failed(reason.clone()))?;
        for callback in error {
            callback(reason.clone());
        }
        wakers.into_iter().for_each(Waker::wake);
        Ok(())
    }

    /// Swap in the terminal state and hand back the queued subscribers.
    ///
    /// Subscribers run after the lock is released so they may subscribe or
    /// settle other deferreds.
    #[allow(clippy::type_complexity)]
    fn settle(
        &self,
        terminal: State<T, E>,
    ) -> Result<(Vec<SuccessFn<T>>, Vec<ErrorFn<E>>, Vec<Waker>), LoaderError> {
        let mut state = self.shared.lock();
        match std::mem::replace(&mut *state, terminal) {
            State::Pending {
                success,
                error,
                wakers,
            } => Ok((success, error, wakers)),
            settled => {
                *state = settled;
                Err(LoaderError::AlreadySettled)
            }
        }
    }
}

// ============================================================================
// Promise (read side)
// ============================================================================

/// Read-only handle of a [`Deferred`].
///
/// Subscribing returns the same handle: callers may branch on the outcome
/// but never transform it. Awaiting yields `Result<T, E>`.
pub struct Promise<T, E> {
    shared: Shared<T, E>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> std::fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.shared.lock() {
            State::Pending { .. } => "pending",
            State::Succeeded(_) => "succeeded",
            State::Failed(_) => "failed",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// An already-resolved promise.
    pub fn resolved(value: T) -> Self {
        Self {
            shared: Arc::new(Mutex::new(State::Succeeded(value))),
        }
    }

    /// An already-rejected promise.
    pub fn rejected(reason: E) -> Self {
        Self {
            shared: Arc::new(Mutex::new(State::Failed(reason))),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.shared.lock(), State::Pending { .. })
    }

    /// Subscribe to both outcomes.
    pub fn then<S, F>(&self, on_success: S, on_error: F) -> Self
    where
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(E) + Send + 'static,
    {
        self.subscribe(Some(Box::new(on_success)), Some(Box::new(on_error)))
    }

    /// Subscribe to success only.
    pub fn on_success<S>(&self, on_success: S) -> Self
    where
        S: FnOnce(T) + Send + 'static,
    {
        self.subscribe(Some(Box::new(on_success)), None)
    }

    /// Subscribe to failure only.
    pub fn on_error<F>(&self, on_error: F) -> Self
    where
        F: FnOnce(E) + Send + 'static,
    {
        self.subscribe(None, Some(Box::new(on_error)))
    }

    fn subscribe(&self, on_success: Option<SuccessFn<T>>, on_error: Option<ErrorFn<E>>) -> Self {
        let mut state = self.shared.lock();
        match &mut *state {
            State::Pending { success, error, .. } => {
                success.extend(on_success);
                error.extend(on_error);
            }
            State::Succeeded(value) => {
                let value = value.clone();
                drop(state);
                if let Some(callback) = on_success {
                    callback(value);
                }
            }
            State::Failed(reason) => {
                let reason = reason.clone();
                drop(state);
                if let Some(callback) = on_error {
                    callback(reason);
                }
            }
        }
        self.clone()
    }
}

impl<T, E> Future for Promise<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.lock();
        match &mut *state {
            State::Succeeded(value) => Poll::Ready(Ok(value.clone())),
            State::Failed(reason) => Poll::Ready(Err(reason.clone())),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
