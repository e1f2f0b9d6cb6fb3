//! Helpers that move statuses across the gRPC trailer encoding

use faultline_core::RemoteError;
use faultline_server::RpcError;
use tonic::codegen::http::HeaderMap;

/// Trailers a server would send for `status`
pub fn trailers(status: &tonic::Status) -> HeaderMap {
    let mut trailers = HeaderMap::new();
    status.add_header(&mut trailers).expect("status encodes into trailers");
    trailers
}

/// Encode `status` into trailers and decode it the way a client would
pub fn over_the_wire(status: tonic::Status) -> tonic::Status {
    tonic::Status::from_header_map(&trailers(&status)).expect("trailers carry a status")
}

/// Result of a call as seen by a remote client
pub fn received<R>(result: Result<R, RpcError>) -> Result<R, tonic::Status> {
    result.map_err(|e| over_the_wire(tonic::Status::from(e)))
}

/// Result of a call with the failure unwrapped into a [`RemoteError`]
pub fn unwrapped<R>(result: Result<R, RpcError>) -> Result<R, RemoteError> {
    received(result).map_err(|status| RemoteError::from_tonic(&status))
}
