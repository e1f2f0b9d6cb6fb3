use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use strum::EnumIter;
use thiserror::Error;
use tonic::Code;

use crate::detail::{FieldViolation, GatewayUnreachable, InsufficientCredit};

/// Category of an application error
///
/// The kind alone decides the transport status code and the `reason` of the
/// `ErrorInfo` record attached to it.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    InternalServerError,
    ServiceUnavailable,
    TooManyRequests,
    Forbidden,
    AlreadyExists,
    UnauthorizedAccess,
    /// Catch-all for names this taxonomy does not own
    Unknown,
}

impl ErrorKind {
    /// Transport status code for this kind
    pub const fn code(self) -> Code {
        match self {
            Self::NotFound => Code::NotFound,
            Self::BadRequest => Code::InvalidArgument,
            Self::InternalServerError => Code::Internal,
            Self::ServiceUnavailable => Code::Unavailable,
            Self::TooManyRequests => Code::ResourceExhausted,
            Self::Forbidden => Code::PermissionDenied,
            Self::AlreadyExists => Code::AlreadyExists,
            Self::UnauthorizedAccess => Code::Unauthenticated,
            Self::Unknown => Code::Unknown,
        }
    }

    /// Machine-readable reason used in `ErrorInfo` records
    pub const fn reason(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::Forbidden => "FORBIDDEN",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Message used when the caller does not supply one
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::NotFound => "Not found or does not exist",
            Self::BadRequest => "Bad request, invalid or missing parameter",
            Self::InternalServerError => "Internal server error",
            Self::ServiceUnavailable => "Service unavailable",
            Self::TooManyRequests => "Too many requests",
            Self::Forbidden => "Forbidden",
            Self::AlreadyExists => "Already exists",
            Self::UnauthorizedAccess => "Unauthorized access",
            Self::Unknown => "Unknown error",
        }
    }

    /// Parse a kind from its reason or from the legacy error names
    /// (`NotFoundError`, `BadRequestError`, ...)
    ///
    /// Unrecognized names map to [`ErrorKind::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "NOT_FOUND" | "NotFoundError" => Self::NotFound,
            "BAD_REQUEST" | "BadRequestError" => Self::BadRequest,
            "INTERNAL_SERVER_ERROR" | "InternalServerError" => Self::InternalServerError,
            "SERVICE_UNAVAILABLE" | "ServiceUnavailable" => Self::ServiceUnavailable,
            "TOO_MANY_REQUESTS" | "TooManyRequestsError" => Self::TooManyRequests,
            "FORBIDDEN" | "ForbiddenError" => Self::Forbidden,
            "ALREADY_EXISTS" | "AlreadyExistsError" => Self::AlreadyExists,
            "UNAUTHORIZED_ACCESS" | "UnauthorizedAccessError" => Self::UnauthorizedAccess,
            _ => Self::Unknown,
        }
    }

    /// Best-effort inverse of [`ErrorKind::code`], used when a status carries
    /// no `ErrorInfo` record
    pub const fn from_code(code: Code) -> Self {
        match code {
            Code::NotFound => Self::NotFound,
            Code::InvalidArgument => Self::BadRequest,
            Code::Internal => Self::InternalServerError,
            Code::Unavailable => Self::ServiceUnavailable,
            Code::ResourceExhausted => Self::TooManyRequests,
            Code::PermissionDenied => Self::Forbidden,
            Code::AlreadyExists => Self::AlreadyExists,
            Code::Unauthenticated => Self::UnauthorizedAccess,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Business payload carried by an [`AppError`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    /// One entry per invalid request field, in input order
    FieldViolations(Vec<FieldViolation>),
    InsufficientCredit(InsufficientCredit),
    GatewayUnreachable(GatewayUnreachable),
}

impl ErrorDetail {
    /// Whether this payload belongs to the family of `kind`
    pub const fn is_compatible_with(&self, kind: ErrorKind) -> bool {
        matches!(
            (self, kind),
            (Self::FieldViolations(_) | Self::InsufficientCredit(_), ErrorKind::BadRequest)
                | (Self::GatewayUnreachable(_), ErrorKind::ServiceUnavailable)
        )
    }

    /// Short name used in diagnostics
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FieldViolations(_) => "field violations",
            Self::InsufficientCredit(_) => "insufficient credit",
            Self::GatewayUnreachable(_) => "gateway unreachable",
        }
    }
}

impl From<Vec<FieldViolation>> for ErrorDetail {
    fn from(violations: Vec<FieldViolation>) -> Self {
        Self::FieldViolations(violations)
    }
}

impl From<InsufficientCredit> for ErrorDetail {
    fn from(detail: InsufficientCredit) -> Self {
        Self::InsufficientCredit(detail)
    }
}

impl From<GatewayUnreachable> for ErrorDetail {
    fn from(detail: GatewayUnreachable) -> Self {
        Self::GatewayUnreachable(detail)
    }
}

/// A detail was attached to an error of an unrelated kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail} detail cannot be attached to a {kind} error")]
pub struct IncompatibleDetail {
    pub kind: ErrorKind,
    pub detail: &'static str,
}

/// Typed application error
///
/// Immutable apart from the consuming `with_*` builders, each of which
/// returns a new value. The call site that built the error is captured for
/// logging and never leaves the process.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    detail: Option<ErrorDetail>,
    metadata: BTreeMap<String, String>,
    location: &'static Location<'static>,
}

impl AppError {
    /// Build an error of `kind`
    ///
    /// An empty message is replaced by the kind's default message.
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            kind.default_message().to_owned()
        } else {
            message
        };

        Self {
            kind,
            message,
            detail: None,
            metadata: BTreeMap::new(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn not_found() -> Self {
        Self::from_kind(ErrorKind::NotFound)
    }

    #[track_caller]
    pub fn bad_request() -> Self {
        Self::from_kind(ErrorKind::BadRequest)
    }

    #[track_caller]
    pub fn internal_server_error() -> Self {
        Self::from_kind(ErrorKind::InternalServerError)
    }

    #[track_caller]
    pub fn service_unavailable() -> Self {
        Self::from_kind(ErrorKind::ServiceUnavailable)
    }

    #[track_caller]
    pub fn too_many_requests() -> Self {
        Self::from_kind(ErrorKind::TooManyRequests)
    }

    #[track_caller]
    pub fn forbidden() -> Self {
        Self::from_kind(ErrorKind::Forbidden)
    }

    #[track_caller]
    pub fn already_exists() -> Self {
        Self::from_kind(ErrorKind::AlreadyExists)
    }

    #[track_caller]
    pub fn unauthorized_access() -> Self {
        Self::from_kind(ErrorKind::UnauthorizedAccess)
    }

    #[track_caller]
    fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Replace the message, keeping the kind
    ///
    /// Empty messages are ignored so that an error never loses its message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.is_empty() {
            self.message = message;
        }
        self
    }

    /// Add an entry to the metadata copied into the `ErrorInfo` record
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach the business payload, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDetail`] if the payload does not belong to this
    /// error's kind
    pub fn with_detail(self, detail: impl Into<ErrorDetail>) -> Result<Self, IncompatibleDetail> {
        let detail = detail.into();
        if !detail.is_compatible_with(self.kind) {
            return Err(IncompatibleDetail {
                kind: self.kind,
                detail: detail.name(),
            });
        }
        Ok(self.with_compatible_detail(detail))
    }

    /// Attach a payload already known to match the kind
    pub(crate) fn with_compatible_detail(mut self, detail: ErrorDetail) -> Self {
        debug_assert!(detail.is_compatible_with(self.kind));
        self.detail = Some(detail);
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn detail(&self) -> Option<&ErrorDetail> {
        self.detail.as_ref()
    }

    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Source location where the error was constructed
    pub const fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Transport status code for this error
    pub const fn code(&self) -> Code {
        self.kind.code()
    }
}

impl PartialEq for AppError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.message == other.message
            && self.detail == other.detail
            && self.metadata == other.metadata
    }
}

impl Eq for AppError {}
