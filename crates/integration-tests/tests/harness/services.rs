//! Handlers and service stacks wrapped by the error boundary

use std::task::{Context, Poll};

use faultline_core::{ErrorKind, FieldViolation, RemoteError, Status, domain};
use faultline_server::{CallContext, ErrorLayer, HandlerError, Request, RpcError};
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt, service_fn};

use crate::harness::wire;

pub const METHOD: &str = "/test.Inventory/Reserve";

/// Handler input is a product id, output a confirmation
pub type TestService = BoxCloneService<Request<String>, String, RpcError>;

/// What a test handler does with every request
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    NotFound,
    Invalid(Vec<(&'static str, &'static str)>),
    InsufficientCredit { requested: u64, available: u64 },
    GatewayDown(&'static str),
    Panic(&'static str),
    Opaque(&'static str),
    OpaqueStatus(tonic::Code, &'static str),
}

async fn handle(behavior: Behavior, request: Request<String>) -> Result<String, HandlerError> {
    let (ctx, product_id) = request.into_parts();

    if ctx.is_cancelled() {
        return Err(HandlerError::opaque(tonic::Status::cancelled("caller went away")));
    }

    match behavior {
        Behavior::Succeed => Ok(format!("reserved {product_id}")),
        Behavior::NotFound => Err(domain::product_not_found(&product_id).into()),
        Behavior::Invalid(fields) => Err(domain::validation_failed(fields).into()),
        Behavior::InsufficientCredit { requested, available } => {
            Err(domain::insufficient_credit_for("customer-1", requested, available).into())
        }
        Behavior::GatewayDown(gateway) => Err(domain::gateway_unreachable_named(gateway).into()),
        Behavior::Panic(message) => panic!("{message}"),
        Behavior::Opaque(message) => Err(anyhow::anyhow!("{message}").into()),
        Behavior::OpaqueStatus(code, message) => Err(HandlerError::opaque(tonic::Status::new(code, message))),
    }
}

/// Handler service behind `layer`
pub fn service(layer: &ErrorLayer, behavior: Behavior) -> TestService {
    BoxCloneService::new(layer.layer(service_fn(move |req| handle(behavior.clone(), req))))
}

/// Handler that panics before returning a future
#[derive(Clone)]
pub struct PanicsOnCall(pub &'static str);

impl Service<Request<String>> for PanicsOnCall {
    type Response = String;
    type Error = HandlerError;
    type Future = std::future::Ready<Result<String, HandlerError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), HandlerError>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<String>) -> Self::Future {
        panic!("{}", self.0);
    }
}

pub fn panics_on_call(layer: &ErrorLayer, message: &'static str) -> TestService {
    BoxCloneService::new(layer.layer(PanicsOnCall(message)))
}

/// Service that forwards every request to `downstream` and re-raises its failures
///
/// Typed failures are rebuilt from the wire status and attributed to this
/// service; anything outside the taxonomy is relayed unchanged.
pub fn relay(layer: &ErrorLayer, downstream: TestService) -> TestService {
    BoxCloneService::new(layer.layer(service_fn(move |req: Request<String>| {
        let downstream = downstream.clone();
        async move {
            let (ctx, product_id) = req.into_parts();
            let call = Request::new(ctx.child("/test.Warehouse/Reserve"), product_id);

            match wire::received(downstream.oneshot(call).await) {
                Ok(reply) => Ok(format!("relayed: {reply}")),
                Err(status) => {
                    let remote = RemoteError::from_tonic(&status);
                    if remote.kind() == ErrorKind::Unknown {
                        return Err(HandlerError::opaque(Status::from(status)));
                    }
                    Err(HandlerError::App(remote.into_app_error()))
                }
            }
        }
    })))
}

pub fn request(product_id: &str) -> Request<String> {
    Request::new(CallContext::new(METHOD), product_id.to_owned())
}

pub fn violations(fields: &[(&str, &str)]) -> Vec<FieldViolation> {
    fields.iter().map(|(f, d)| FieldViolation::new(*f, *d)).collect()
}
