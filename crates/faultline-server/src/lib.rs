//! Server-side error boundary
//!
//! [`ErrorLayer`] wraps a handler service so that every call ends in exactly
//! one of: the handler's response, a translated [`Status`](faultline_core::Status),
//! an untouched opaque error, or an internal-error status for a recovered
//! panic.

#![allow(clippy::must_use_candidate)]

mod context;
mod error;
mod interceptor;

pub use context::{CallContext, Request};
pub use error::{HandlerError, RpcError};
pub use interceptor::{ErrorLayer, ErrorService};
