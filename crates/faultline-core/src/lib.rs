//! Typed application errors and their translation to RPC statuses
//!
//! Services raise [`AppError`]s; the server-side interceptor turns them into
//! a [`Status`] with [`to_status`], and clients recover the structured
//! records with [`RemoteError`] or a [`DetailVisitor`].

#![allow(clippy::must_use_candidate)]

pub mod detail;
pub mod domain;
mod error;
mod status;
mod translate;
mod unwrap;

pub use detail::{BadRequest, Detail, ErrorInfo, FieldViolation, GatewayUnreachable, InsufficientCredit};
pub use error::{AppError, ErrorDetail, ErrorKind, IncompatibleDetail};
pub use status::{Code, DETAILS_TRAILER, DetailError, DetailRecord, MAX_DETAILS_LEN, Status};
pub use translate::{internal_status, to_status};
pub use unwrap::{DetailVisitor, RemoteDetail, RemoteError, unwrap_details, visit_details};
