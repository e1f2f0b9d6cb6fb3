//! Client-side recovery of structured failures
//!
//! A caller that receives a failed [`Status`] can walk its records with a
//! [`DetailVisitor`], or collect everything into a [`RemoteError`] and
//! branch on the remote kind without parsing messages.

use std::collections::BTreeMap;

use tonic::Code;

use crate::detail::{BadRequest, ErrorInfo, FieldViolation, GatewayUnreachable, InsufficientCredit};
use crate::error::{AppError, ErrorDetail, ErrorKind};
use crate::status::{DetailError, DetailRecord, Status};

/// A recognized detail record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDetail {
    ErrorInfo(ErrorInfo),
    BadRequest(BadRequest),
    InsufficientCredit(InsufficientCredit),
    GatewayUnreachable(GatewayUnreachable),
}

impl RemoteDetail {
    /// Decode a record of a known type
    ///
    /// Returns `None` when the type URL is not one this crate understands.
    pub fn decode(record: &DetailRecord) -> Option<Result<Self, DetailError>> {
        let decoded = if record.is::<ErrorInfo>() {
            record.decode().map(Self::ErrorInfo)
        } else if record.is::<BadRequest>() {
            record.decode().map(Self::BadRequest)
        } else if record.is::<InsufficientCredit>() {
            record.decode().map(Self::InsufficientCredit)
        } else if record.is::<GatewayUnreachable>() {
            record.decode().map(Self::GatewayUnreachable)
        } else {
            return None;
        };
        Some(decoded)
    }
}

/// Callbacks for the recognized record types
///
/// Every method defaults to doing nothing, so implementors only handle the
/// records they care about.
pub trait DetailVisitor {
    fn error_info(&mut self, _info: &ErrorInfo) {}

    fn bad_request(&mut self, _bad_request: &BadRequest) {}

    fn insufficient_credit(&mut self, _detail: &InsufficientCredit) {}

    fn gateway_unreachable(&mut self, _detail: &GatewayUnreachable) {}
}

/// Decode the recognized records of `status`, in order
///
/// Unrecognized or undecodable records are logged and skipped.
pub fn unwrap_details(status: &Status) -> Vec<RemoteDetail> {
    status
        .details()
        .iter()
        .filter_map(|record| match RemoteDetail::decode(record) {
            Some(Ok(detail)) => Some(detail),
            Some(Err(e)) => {
                tracing::warn!(type_url = %record.type_url, error = %e, "skipping malformed status detail");
                None
            }
            None => {
                tracing::warn!(type_url = %record.type_url, "skipping unrecognized status detail");
                None
            }
        })
        .collect()
}

/// Hand each recognized record of `status` to `visitor`
///
/// Returns how many records were visited.
pub fn visit_details<V: DetailVisitor + ?Sized>(status: &Status, visitor: &mut V) -> usize {
    let details = unwrap_details(status);

    for detail in &details {
        match detail {
            RemoteDetail::ErrorInfo(info) => visitor.error_info(info),
            RemoteDetail::BadRequest(bad_request) => visitor.bad_request(bad_request),
            RemoteDetail::InsufficientCredit(detail) => visitor.insufficient_credit(detail),
            RemoteDetail::GatewayUnreachable(detail) => visitor.gateway_unreachable(detail),
        }
    }

    details.len()
}

/// Failure reported by a remote service, with its structured records decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    code: Code,
    message: String,
    kind: ErrorKind,
    info: Option<ErrorInfo>,
    details: Vec<RemoteDetail>,
}

impl RemoteError {
    pub fn from_status(status: &Status) -> Self {
        let details = unwrap_details(status);

        let info = details.iter().find_map(|d| match d {
            RemoteDetail::ErrorInfo(info) => Some(info.clone()),
            _ => None,
        });

        // A reason this taxonomy does not know still leaves the code to go on
        let kind = info
            .as_ref()
            .map(|i| ErrorKind::from_name(&i.reason))
            .filter(|k| *k != ErrorKind::Unknown)
            .unwrap_or_else(|| ErrorKind::from_code(status.code()));

        Self {
            code: status.code(),
            message: status.message().to_owned(),
            kind,
            info,
            details,
        }
    }

    pub fn from_tonic(status: &tonic::Status) -> Self {
        Self::from_status(&Status::from(status))
    }

    pub const fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Service that reported the failure, if it said so
    pub fn domain(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.domain.as_str())
    }

    pub fn reason(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.reason.as_str())
    }

    pub fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        self.info.as_ref().map(|i| &i.metadata)
    }

    pub fn details(&self) -> &[RemoteDetail] {
        &self.details
    }

    /// Field violations, empty when the remote sent none
    pub fn field_violations(&self) -> &[FieldViolation] {
        self.details
            .iter()
            .find_map(|d| match d {
                RemoteDetail::BadRequest(b) => Some(b.field_violations.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn insufficient_credit(&self) -> Option<&InsufficientCredit> {
        self.details.iter().find_map(|d| match d {
            RemoteDetail::InsufficientCredit(c) => Some(c),
            _ => None,
        })
    }

    pub fn gateway_unreachable(&self) -> Option<&GatewayUnreachable> {
        self.details.iter().find_map(|d| match d {
            RemoteDetail::GatewayUnreachable(g) => Some(g),
            _ => None,
        })
    }

    /// Rebuild a local application error so the failure can be re-raised
    ///
    /// Kind, message, metadata and the business payload carry over. A payload
    /// that does not fit the recovered kind is dropped.
    #[track_caller]
    pub fn into_app_error(self) -> AppError {
        let payload = self.details.into_iter().find_map(|d| match d {
            RemoteDetail::BadRequest(b) => Some(ErrorDetail::FieldViolations(b.field_violations)),
            RemoteDetail::InsufficientCredit(c) => Some(ErrorDetail::InsufficientCredit(c)),
            RemoteDetail::GatewayUnreachable(g) => Some(ErrorDetail::GatewayUnreachable(g)),
            RemoteDetail::ErrorInfo(_) => None,
        });

        let mut error = AppError::new(self.kind, self.message);
        if let Some(info) = self.info {
            for (key, value) in info.metadata {
                error = error.with_metadata(key, value);
            }
        }

        let Some(payload) = payload else {
            return error;
        };

        match error.clone().with_detail(payload) {
            Ok(error) => error,
            Err(e) => {
                tracing::warn!(error = %e, "dropping remote detail");
                error
            }
        }
    }
}
