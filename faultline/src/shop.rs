//! Demo order and charge services
//!
//! The order service calls the charge service through the same error
//! boundary a networked deployment would use, and converts failures to
//! `tonic::Status` and back to exercise the wire format.

use anyhow::anyhow;
use faultline_config::ServiceConfig;
use faultline_core::{
    AppError, BadRequest, DetailVisitor, ErrorInfo, ErrorKind, FieldViolation, GatewayUnreachable,
    InsufficientCredit, RemoteError, Status, domain,
};
use faultline_server::{CallContext, ErrorLayer, HandlerError, Request, RpcError};
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt, service_fn};

use crate::args::Scenario;

const CHARGE_SERVICE: &str = "charge-service";
const CHARGE_METHOD: &str = "/shop.Charge/ChargeCustomer";
const ORDER_METHOD: &str = "/shop.Order/PlaceOrder";

/// Balance every demo customer has, in cents
const AVAILABLE_CREDIT: u64 = 50_000;
const MAX_QUANTITY: u32 = 100;

/// Product id, name and unit price in cents
const CATALOG: &[(&str, &str, u64)] = &[("1", "Laptop", 120_000), ("2", "Keyboard", 8_000), ("3", "Mouse", 3_500)];

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub customer_id: String,
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct OrderResponse {
    pub message: String,
    pub total: u64,
}

#[derive(Debug, Clone)]
struct ChargeRequest {
    customer_id: String,
    amount: u64,
}

#[derive(Debug, Clone)]
struct ChargeResponse {
    message: String,
}

type ChargeClient = BoxCloneService<Request<ChargeRequest>, ChargeResponse, RpcError>;
type OrderClient = BoxCloneService<Request<OrderRequest>, OrderResponse, RpcError>;

/// Order service wired to a charge service that behaves per `scenario`
pub struct Shop {
    orders: OrderClient,
}

impl Shop {
    pub fn new(config: &ServiceConfig, scenario: Scenario) -> Self {
        let charge_layer = ErrorLayer::new(CHARGE_SERVICE).with_debug_mode(config.debug_mode);
        let charges: ChargeClient =
            BoxCloneService::new(charge_layer.layer(service_fn(move |req| charge(scenario, req))));

        let orders: OrderClient = BoxCloneService::new(
            ErrorLayer::from_config(config).layer(service_fn(move |req| place_order(charges.clone(), req))),
        );

        Self { orders }
    }

    /// Place an order as a remote client would see it
    ///
    /// # Errors
    ///
    /// Returns the wire status of a failed order
    pub async fn place_order(&self, request: Request<OrderRequest>) -> Result<OrderResponse, tonic::Status> {
        self.orders.clone().oneshot(request).await.map_err(tonic::Status::from)
    }
}

/// Order that provokes `scenario`
pub fn order_for(scenario: Scenario) -> OrderRequest {
    let (product_id, quantity) = match scenario {
        Scenario::NotFound => ("42", 1),
        Scenario::Validation => ("1", 0),
        Scenario::InsufficientCredit => ("1", 2),
        Scenario::Ok | Scenario::Gateway | Scenario::Panic | Scenario::Opaque => ("3", 1),
    };

    OrderRequest {
        customer_id: "customer-1".to_owned(),
        product_id: product_id.to_owned(),
        quantity,
    }
}

async fn place_order(charges: ChargeClient, request: Request<OrderRequest>) -> Result<OrderResponse, HandlerError> {
    let (ctx, order) = request.into_parts();

    validate(&order)?;

    let (_, name, unit_price) = CATALOG
        .iter()
        .find(|(id, ..)| *id == order.product_id)
        .ok_or_else(|| domain::product_not_found(&order.product_id))?;
    let total = unit_price * u64::from(order.quantity);

    let charge = Request::new(
        ctx.child(CHARGE_METHOD),
        ChargeRequest {
            customer_id: order.customer_id.clone(),
            amount: total,
        },
    );

    match charges.oneshot(charge).await {
        Ok(receipt) => Ok(OrderResponse {
            message: format!("order placed for {} x {name}. {}", order.quantity, receipt.message),
            total,
        }),
        Err(e) => {
            let wire = tonic::Status::from(e);
            let remote = RemoteError::from_tonic(&wire);
            log_remote("charge failed", &remote, &Status::from(&wire));

            // Failures outside the taxonomy are relayed as they arrived
            if remote.kind() == ErrorKind::Unknown {
                return Err(HandlerError::opaque(Status::from(wire)));
            }
            Err(remote.into_app_error().into())
        }
    }
}

fn validate(order: &OrderRequest) -> Result<(), AppError> {
    let mut violations = Vec::new();

    if order.customer_id.trim().is_empty() {
        violations.push(FieldViolation::new("customer_id", "customer_id is required"));
    }
    if order.product_id.trim().is_empty() {
        violations.push(FieldViolation::new("product_id", "product_id is required"));
    }
    if order.quantity == 0 {
        violations.push(FieldViolation::new("quantity", "quantity must be at least 1"));
    } else if order.quantity > MAX_QUANTITY {
        violations.push(FieldViolation::new(
            "quantity",
            format!("quantity must not exceed {MAX_QUANTITY}"),
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(domain::validation_failed(violations))
    }
}

async fn charge(scenario: Scenario, request: Request<ChargeRequest>) -> Result<ChargeResponse, HandlerError> {
    let (ctx, charge) = request.into_parts();

    if ctx.is_cancelled() {
        return Err(anyhow!("charge for {} cancelled", charge.customer_id).into());
    }

    match scenario {
        Scenario::Gateway => Err(domain::gateway_unreachable_named("acme-pay").into()),
        Scenario::Panic => panic!("ledger corrupted for customer {}", charge.customer_id),
        Scenario::Opaque => Err(anyhow!("ledger connection reset").into()),
        Scenario::Ok | Scenario::NotFound | Scenario::Validation | Scenario::InsufficientCredit => {
            if charge.amount > AVAILABLE_CREDIT {
                return Err(domain::insufficient_credit_for(&charge.customer_id, charge.amount, AVAILABLE_CREDIT).into());
            }
            Ok(ChargeResponse {
                message: format!("charged {} to customer {}", format_cents(charge.amount), charge.customer_id),
            })
        }
    }
}

fn format_cents(amount: u64) -> String {
    format!("${}.{:02}", amount / 100, amount % 100)
}

/// Logs every recognized record of a failed call
struct LogDetails;

impl DetailVisitor for LogDetails {
    fn error_info(&mut self, info: &ErrorInfo) {
        tracing::info!(reason = %info.reason, domain = %info.domain, metadata = ?info.metadata, "error info");
    }

    fn bad_request(&mut self, bad_request: &BadRequest) {
        for violation in &bad_request.field_violations {
            tracing::info!(field = %violation.field, description = %violation.description, "invalid field");
        }
    }

    fn insufficient_credit(&mut self, detail: &InsufficientCredit) {
        tracing::info!(
            customer_id = ?detail.customer_id,
            requested = ?detail.requested,
            available = ?detail.available,
            "insufficient credit"
        );
    }

    fn gateway_unreachable(&mut self, detail: &GatewayUnreachable) {
        tracing::info!(gateway = ?detail.gateway, "gateway unreachable");
    }
}

/// Log a failure the way a client would branch on it
pub fn log_remote(context: &str, remote: &RemoteError, status: &Status) {
    tracing::warn!(
        code = ?remote.code(),
        kind = %remote.kind(),
        domain = remote.domain().unwrap_or("-"),
        message = remote.message(),
        "{context}"
    );

    if faultline_core::visit_details(status, &mut LogDetails) == 0 {
        tracing::info!("no structured details, falling back to code and message");
    }
}

/// Context for a top-level order call
pub fn order_context() -> CallContext {
    CallContext::new(ORDER_METHOD).with_timeout(std::time::Duration::from_secs(5))
}
