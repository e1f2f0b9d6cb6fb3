//! Business failures raised by the shop services

use crate::detail::{FieldViolation, GatewayUnreachable, InsufficientCredit};
use crate::error::{AppError, ErrorDetail};

#[track_caller]
pub fn product_not_found(product_id: &str) -> AppError {
    AppError::not_found()
        .with_message(format!("product {product_id} not found"))
        .with_metadata("resource", "product")
        .with_metadata("id", product_id)
}

#[track_caller]
pub fn insufficient_credit() -> AppError {
    AppError::bad_request()
        .with_message("insufficient credit")
        .with_compatible_detail(ErrorDetail::InsufficientCredit(InsufficientCredit::default()))
}

/// Insufficient credit with the amounts involved, in minor currency units
#[track_caller]
pub fn insufficient_credit_for(customer_id: &str, requested: u64, available: u64) -> AppError {
    AppError::bad_request()
        .with_message(format!("customer {customer_id} has insufficient credit"))
        .with_compatible_detail(ErrorDetail::InsufficientCredit(InsufficientCredit {
            customer_id: Some(customer_id.to_owned()),
            requested: Some(requested),
            available: Some(available),
        }))
}

#[track_caller]
pub fn gateway_unreachable() -> AppError {
    AppError::service_unavailable()
        .with_message("payment gateway unreachable")
        .with_compatible_detail(ErrorDetail::GatewayUnreachable(GatewayUnreachable::default()))
}

#[track_caller]
pub fn gateway_unreachable_named(gateway: &str) -> AppError {
    AppError::service_unavailable()
        .with_message(format!("payment gateway {gateway} unreachable"))
        .with_compatible_detail(ErrorDetail::GatewayUnreachable(GatewayUnreachable {
            gateway: Some(gateway.to_owned()),
        }))
}

/// Request validation failure, one violation per invalid field
#[track_caller]
pub fn validation_failed<I, V>(fields: I) -> AppError
where
    I: IntoIterator<Item = V>,
    V: Into<FieldViolation>,
{
    let violations = fields.into_iter().map(Into::into).collect();

    AppError::bad_request()
        .with_message("some arguments are invalid")
        .with_compatible_detail(ErrorDetail::FieldViolations(violations))
}
