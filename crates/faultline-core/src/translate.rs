use crate::detail::{BadRequest, ErrorInfo};
use crate::error::{AppError, ErrorDetail};
use crate::status::{DetailError, Status};

/// Translate an application error into a transport status
///
/// The status always carries the kind's code and the error's message. An
/// `ErrorInfo` record naming `domain` is attached first, followed by the
/// business payload if the error has one. If any record cannot be attached
/// the details are dropped and the bare status is returned.
pub fn to_status(error: &AppError, domain: &str) -> Status {
    let base = Status::new(error.code(), error.message());

    match enrich(base.clone(), error, domain) {
        Ok(status) => status,
        Err(e) => {
            tracing::debug!(
                error = %e,
                kind = %error.kind(),
                domain,
                "status details dropped"
            );
            base
        }
    }
}

/// Status returned in place of a recovered panic
pub fn internal_status(domain: &str) -> Status {
    to_status(&AppError::internal_server_error(), domain)
}

fn enrich(status: Status, error: &AppError, domain: &str) -> Result<Status, DetailError> {
    let info = ErrorInfo {
        reason: error.kind().reason().to_owned(),
        domain: domain.to_owned(),
        metadata: error.metadata().clone(),
    };
    let status = status.with_detail(&info)?;

    match error.detail() {
        None => Ok(status),
        Some(ErrorDetail::FieldViolations(violations)) => status.with_detail(&BadRequest {
            field_violations: violations.clone(),
        }),
        Some(ErrorDetail::InsufficientCredit(detail)) => status.with_detail(detail),
        Some(ErrorDetail::GatewayUnreachable(detail)) => status.with_detail(detail),
    }
}
