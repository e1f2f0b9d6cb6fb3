use faultline_core::{AppError, Code, Status};
use thiserror::Error;

/// Error returned by a request handler
///
/// `App` errors belong to the taxonomy and are translated at the boundary;
/// anything else is `Opaque` and passes through untouched.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Opaque(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn opaque<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Opaque(anyhow::Error::new(error))
    }
}

/// Error leaving the interceptor
#[derive(Debug, Error)]
pub enum RpcError {
    /// Status built by translation or panic recovery
    #[error(transparent)]
    Status(Status),

    /// Error the taxonomy does not own, left for the transport to map
    #[error(transparent)]
    Opaque(anyhow::Error),
}

impl RpcError {
    pub const fn as_status(&self) -> Option<&Status> {
        match self {
            Self::Status(status) => Some(status),
            Self::Opaque(_) => None,
        }
    }

    /// Apply the transport's default mapping
    ///
    /// Opaque errors that wrap a status keep it; anything else becomes
    /// `Unknown` with the error's message.
    pub fn into_status(self) -> Status {
        match self {
            Self::Status(status) => status,
            Self::Opaque(error) => {
                if let Some(status) = error.downcast_ref::<Status>() {
                    status.clone()
                } else if let Some(status) = error.downcast_ref::<tonic::Status>() {
                    Status::from(status)
                } else {
                    Status::new(Code::Unknown, error.to_string())
                }
            }
        }
    }
}

impl From<RpcError> for tonic::Status {
    fn from(error: RpcError) -> Self {
        error.into_status().into()
    }
}
