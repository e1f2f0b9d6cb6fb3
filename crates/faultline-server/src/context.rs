use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Per-call information handed to every handler
#[derive(Debug, Clone)]
pub struct CallContext {
    method: Arc<str>,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallContext {
    /// Context for a call to `method`, e.g. `/shop.Order/PlaceOrder`
    pub fn new(method: impl Into<Arc<str>>) -> Self {
        Self {
            method: method.into(),
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Share cancellation with an outer scope
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn method_arc(&self) -> Arc<str> {
        Arc::clone(&self.method)
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; zero once it has passed
    pub fn time_remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether the caller gave up, either explicitly or by deadline
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Context for a downstream call made while serving this one
    ///
    /// The deadline carries over and cancelling this call cancels the child.
    #[must_use]
    pub fn child(&self, method: impl Into<Arc<str>>) -> Self {
        Self {
            method: method.into(),
            deadline: self.deadline,
            cancellation: self.cancellation.child_token(),
        }
    }
}

/// An inbound call: its context plus the decoded message
#[derive(Debug, Clone)]
pub struct Request<T> {
    context: CallContext,
    message: T,
}

impl<T> Request<T> {
    pub const fn new(context: CallContext, message: T) -> Self {
        Self { context, message }
    }

    pub const fn context(&self) -> &CallContext {
        &self.context
    }

    pub const fn message(&self) -> &T {
        &self.message
    }

    pub fn into_message(self) -> T {
        self.message
    }

    pub fn into_parts(self) -> (CallContext, T) {
        (self.context, self.message)
    }
}
