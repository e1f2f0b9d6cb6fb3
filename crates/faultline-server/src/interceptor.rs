use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Context, Poll};

use faultline_config::ServiceConfig;
use faultline_core::{AppError, internal_status, to_status};
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{Layer, Service};

use crate::context::Request;
use crate::error::{HandlerError, RpcError};

/// Method label for failures raised before a request is dispatched
const POLL_READY: &str = "<poll_ready>";

/// Tower layer that puts every handler call behind the error boundary
///
/// Typed errors are translated into statuses naming the service, opaque
/// errors pass through, and panics are recovered as internal errors whose
/// payload is only ever logged.
#[derive(Debug, Clone)]
pub struct ErrorLayer {
    boundary: Boundary,
}

impl ErrorLayer {
    pub fn new(service_name: impl Into<Arc<str>>) -> Self {
        Self {
            boundary: Boundary {
                service_name: service_name.into(),
                debug_mode: false,
            },
        }
    }

    /// Include a backtrace when logging recovered panics
    #[must_use]
    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.boundary.debug_mode = enabled;
        self
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.name.as_str()).with_debug_mode(config.debug_mode)
    }

    pub fn service_name(&self) -> &str {
        &self.boundary.service_name
    }
}

impl<S> Layer<S> for ErrorLayer {
    type Service = ErrorService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorService {
            inner,
            boundary: self.boundary.clone(),
        }
    }
}

/// Handler service wrapped by [`ErrorLayer`]
#[derive(Debug, Clone)]
pub struct ErrorService<S> {
    inner: S,
    boundary: Boundary,
}

impl<S> ErrorService<S> {
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, T> Service<Request<T>> for ErrorService<S>
where
    S: Service<Request<T>, Error = HandlerError>,
    S::Response: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = RpcError;
    type Future = BoxFuture<'static, Result<S::Response, RpcError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.inner.poll_ready(cx))) {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(ready)) => RequestOutcome::from(ready),
            Err(payload) => RequestOutcome::Panicked(payload),
        };

        Poll::Ready(self.boundary.respond(POLL_READY, outcome))
    }

    fn call(&mut self, request: Request<T>) -> Self::Future {
        let method = request.context().method_arc();
        let boundary = self.boundary.clone();

        // Handlers may panic before handing back a future
        let future = match panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(request))) {
            Ok(future) => future,
            Err(payload) => {
                let result = boundary.respond(&method, RequestOutcome::Panicked(payload));
                return Box::pin(futures::future::ready(result));
            }
        };

        Box::pin(async move {
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => RequestOutcome::from(result),
                Err(payload) => RequestOutcome::Panicked(payload),
            };
            boundary.respond(&method, outcome)
        })
    }
}

/// Terminal state of one handler invocation
enum RequestOutcome<R> {
    Success(R),
    Typed(AppError),
    Untyped(anyhow::Error),
    Panicked(Box<dyn Any + Send>),
}

impl<R> From<Result<R, HandlerError>> for RequestOutcome<R> {
    fn from(result: Result<R, HandlerError>) -> Self {
        match result {
            Ok(response) => Self::Success(response),
            Err(HandlerError::App(error)) => Self::Typed(error),
            Err(HandlerError::Opaque(error)) => Self::Untyped(error),
        }
    }
}

#[derive(Debug, Clone)]
struct Boundary {
    service_name: Arc<str>,
    debug_mode: bool,
}

impl Boundary {
    fn respond<R>(&self, method: &str, outcome: RequestOutcome<R>) -> Result<R, RpcError> {
        let service = &*self.service_name;

        match outcome {
            RequestOutcome::Success(response) => Ok(response),
            RequestOutcome::Typed(error) => {
                tracing::error!(
                    service,
                    method,
                    kind = %error.kind(),
                    error = error.message(),
                    location = %error.location(),
                    "app error"
                );
                Err(RpcError::Status(to_status(&error, service)))
            }
            RequestOutcome::Untyped(error) => {
                tracing::error!(service, method, error = %format_args!("{error:#}"), "unrecognized error");
                Err(RpcError::Opaque(error))
            }
            RequestOutcome::Panicked(payload) => {
                let panic = panic_message(&*payload);
                if self.debug_mode {
                    let backtrace = Backtrace::force_capture();
                    tracing::error!(service, method, panic, %backtrace, "recovered from panic");
                } else {
                    tracing::error!(service, method, panic, "recovered from panic");
                }
                Err(RpcError::Status(internal_status(service)))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use std::future::Ready;

    use faultline_core::{Code, ErrorInfo, InsufficientCredit, domain};
    use tower::{ServiceExt, service_fn};

    use super::*;
    use crate::context::CallContext;

    const SECRET: &str = "card 4111-1111-1111-1111";

    fn request(n: u32) -> Request<u32> {
        Request::new(CallContext::new("/shop.Charge/ChargeCustomer"), n)
    }

    async fn double(req: Request<u32>) -> Result<u32, HandlerError> {
        Ok(req.into_message() * 2)
    }

    async fn broke(_req: Request<u32>) -> Result<u32, HandlerError> {
        Err(domain::insufficient_credit().into())
    }

    async fn flaky(_req: Request<u32>) -> Result<u32, HandlerError> {
        Err(anyhow::anyhow!("connection reset by peer").into())
    }

    async fn explode(_req: Request<u32>) -> Result<u32, HandlerError> {
        panic!("{SECRET}");
    }

    /// Panics inside `call` instead of inside the returned future
    #[derive(Clone)]
    struct PanicsOnCall;

    impl Service<Request<u32>> for PanicsOnCall {
        type Response = u32;
        type Error = HandlerError;
        type Future = Ready<Result<u32, HandlerError>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), HandlerError>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<u32>) -> Self::Future {
            panic!("{SECRET}");
        }
    }

    /// Panics while reporting readiness
    #[derive(Clone)]
    struct PanicsWhenPolled;

    impl Service<Request<u32>> for PanicsWhenPolled {
        type Response = u32;
        type Error = HandlerError;
        type Future = Ready<Result<u32, HandlerError>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), HandlerError>> {
            panic!("{SECRET}");
        }

        fn call(&mut self, req: Request<u32>) -> Self::Future {
            std::future::ready(Ok(req.into_message()))
        }
    }

    fn assert_sanitized(status: &faultline_core::Status) {
        assert!(!status.message().contains(SECRET));
        for record in status.details() {
            assert!(!record.value.to_string().contains(SECRET));
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let svc = ErrorLayer::new("charge-service").layer(service_fn(double));
        assert_eq!(svc.oneshot(request(21)).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn typed_error_is_translated() {
        let svc = ErrorLayer::new("charge-service").layer(service_fn(broke));
        let err = svc.oneshot(request(1)).await.unwrap_err();

        let status = err.as_status().expect("typed errors become statuses");
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "insufficient credit");

        let info = status.find_detail::<ErrorInfo>().unwrap().unwrap();
        assert_eq!(info.reason, "BAD_REQUEST");
        assert_eq!(info.domain, "charge-service");
        assert!(status.find_detail::<InsufficientCredit>().is_some());
    }

    #[tokio::test]
    async fn untyped_error_passes_through_unchanged() {
        let svc = ErrorLayer::new("charge-service").layer(service_fn(flaky));
        let err = svc.oneshot(request(1)).await.unwrap_err();

        let RpcError::Opaque(inner) = err else {
            panic!("opaque errors must not be translated");
        };
        assert_eq!(inner.to_string(), "connection reset by peer");
    }

    #[tokio::test]
    async fn panic_in_future_becomes_internal_status() {
        let svc = ErrorLayer::new("charge-service").layer(service_fn(explode));
        let err = svc.oneshot(request(1)).await.unwrap_err();

        let status = err.into_status();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "Internal server error");

        let info = status.find_detail::<ErrorInfo>().unwrap().unwrap();
        assert_eq!(info.reason, "INTERNAL_SERVER_ERROR");
        assert_eq!(info.domain, "charge-service");
        assert_sanitized(&status);
    }

    #[tokio::test]
    async fn panic_in_call_becomes_internal_status() {
        let svc = ErrorLayer::new("charge-service").with_debug_mode(true).layer(PanicsOnCall);
        let status = svc.oneshot(request(1)).await.unwrap_err().into_status();

        assert_eq!(status.code(), Code::Internal);
        assert_sanitized(&status);
    }

    #[tokio::test]
    async fn panic_in_poll_ready_becomes_internal_status() {
        let svc = ErrorLayer::new("charge-service").layer(PanicsWhenPolled);
        let status = svc.oneshot(request(1)).await.unwrap_err().into_status();

        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "Internal server error");
        assert_sanitized(&status);
    }

    #[tokio::test]
    async fn not_ready_error_is_reported_like_a_handler_error() {
        #[derive(Clone)]
        struct Overloaded;

        impl Service<Request<u32>> for Overloaded {
            type Response = u32;
            type Error = HandlerError;
            type Future = Ready<Result<u32, HandlerError>>;

            fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), HandlerError>> {
                Poll::Ready(Err(AppError::too_many_requests().into()))
            }

            fn call(&mut self, req: Request<u32>) -> Self::Future {
                std::future::ready(Ok(req.into_message()))
            }
        }

        let svc = ErrorLayer::new("charge-service").layer(Overloaded);
        let status = svc.oneshot(request(1)).await.unwrap_err().into_status();

        assert_eq!(status.code(), Code::ResourceExhausted);
    }

    #[tokio::test]
    async fn non_string_panic_payload_is_recovered() {
        async fn odd(_req: Request<u32>) -> Result<u32, HandlerError> {
            std::panic::panic_any(0xdead_u32)
        }

        let svc = ErrorLayer::new("charge-service").layer(service_fn(odd));
        let status = svc.oneshot(request(1)).await.unwrap_err().into_status();

        assert_eq!(status.code(), Code::Internal);
    }

    #[tokio::test]
    async fn debug_mode_does_not_change_response() {
        let quiet = ErrorLayer::new("svc").layer(service_fn(explode));
        let verbose = ErrorLayer::new("svc").with_debug_mode(true).layer(service_fn(explode));

        let quiet = quiet.oneshot(request(1)).await.unwrap_err().into_status();
        let verbose = verbose.oneshot(request(1)).await.unwrap_err().into_status();

        assert_eq!(quiet, verbose);
    }

    #[tokio::test]
    async fn requests_are_handled_independently() {
        let layer = ErrorLayer::new("charge-service");
        let ok = layer.layer(service_fn(double));
        let failing = layer.layer(service_fn(explode));

        let calls = (0..16u32).map(|n| {
            let ok = ok.clone();
            let failing = failing.clone();
            tokio::spawn(async move {
                if n % 2 == 0 {
                    ok.oneshot(request(n)).await.map_err(RpcError::into_status)
                } else {
                    failing.oneshot(request(n)).await.map_err(RpcError::into_status)
                }
            })
        });

        for (n, handle) in (0..16u32).zip(calls.collect::<Vec<_>>()) {
            let result = handle.await.expect("panics never escape the boundary");
            if n % 2 == 0 {
                assert_eq!(result.unwrap(), n * 2);
            } else {
                assert_eq!(result.unwrap_err().code(), Code::Internal);
            }
        }
    }

    #[test]
    fn layer_reads_service_config() {
        let config = ServiceConfig {
            name: "order-service".to_owned(),
            debug_mode: true,
        };
        let layer = ErrorLayer::from_config(&config);

        assert_eq!(layer.service_name(), "order-service");
        assert!(layer.boundary.debug_mode);
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_i32);

        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*borrowed), "borrowed");
        assert_eq!(panic_message(&*other), "<non-string panic payload>");
    }
}
