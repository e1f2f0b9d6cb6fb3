use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use tonic::Code;
use tonic::metadata::{BinaryMetadataValue, MetadataMap};

use crate::detail::Detail;

/// Upper bound on the size of the details trailer of one status
///
/// Measured after base64 encoding, since that is what travels in the
/// header. gRPC peers commonly cap a single header at 8 KiB.
pub const MAX_DETAILS_LEN: usize = 8 * 1024;

/// Binary trailer carrying the JSON-encoded detail records
///
/// `grpc-status-details-bin` is reserved for a protobuf `google.rpc.Status`,
/// so the JSON records travel under their own key.
pub const DETAILS_TRAILER: &str = "faultline-details-bin";

/// Failure to attach or read a detail record
#[derive(Debug, Error)]
pub enum DetailError {
    #[error("failed to encode detail: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("encoded details are {len} bytes, limit is {limit}")]
    TooLarge { len: usize, limit: usize },

    #[error("expected a {expected} record, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("failed to decode {type_url}: {source}")]
    Decode {
        type_url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One typed record in a status's detail list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub type_url: String,
    pub value: serde_json::Value,
}

impl DetailRecord {
    /// Encode `detail` under its type URL
    ///
    /// # Errors
    ///
    /// Returns [`DetailError::Encode`] if the payload cannot be serialized
    pub fn encode<D: Detail>(detail: &D) -> Result<Self, DetailError> {
        let value = serde_json::to_value(detail).map_err(DetailError::Encode)?;
        Ok(Self {
            type_url: D::TYPE_URL.to_owned(),
            value,
        })
    }

    pub fn is<D: Detail>(&self) -> bool {
        self.type_url == D::TYPE_URL
    }

    /// Decode this record as `D`
    ///
    /// # Errors
    ///
    /// Returns [`DetailError::TypeMismatch`] if the record has a different
    /// type URL, or [`DetailError::Decode`] if its value does not fit `D`
    pub fn decode<D: Detail>(&self) -> Result<D, DetailError> {
        if !self.is::<D>() {
            return Err(DetailError::TypeMismatch {
                expected: D::TYPE_URL,
                found: self.type_url.clone(),
            });
        }

        D::deserialize(&self.value).map_err(|source| DetailError::Decode {
            type_url: self.type_url.clone(),
            source,
        })
    }
}

/// Transport-level outcome of a failed call
///
/// Mirrors the gRPC status: a code, a message and an ordered list of typed
/// detail records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("status: {code:?}, message: {message:?}")]
pub struct Status {
    code: Code,
    message: String,
    details: Vec<DetailRecord>,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Rebuild a status from already-encoded records
    pub fn from_parts(code: Code, message: impl Into<String>, details: Vec<DetailRecord>) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    /// Append `detail` after the existing records
    ///
    /// # Errors
    ///
    /// Fails if the payload cannot be encoded or if the details trailer would
    /// exceed [`MAX_DETAILS_LEN`]. The status is consumed either way; callers
    /// that need a fallback keep their own copy.
    pub fn with_detail<D: Detail>(mut self, detail: &D) -> Result<Self, DetailError> {
        self.details.push(DetailRecord::encode(detail)?);

        let len = self.trailer_len()?;
        if len > MAX_DETAILS_LEN {
            return Err(DetailError::TooLarge {
                len,
                limit: MAX_DETAILS_LEN,
            });
        }

        Ok(self)
    }

    pub const fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[DetailRecord] {
        &self.details
    }

    /// First record of type `D`, decoded
    ///
    /// Returns `None` when no record of that type is present.
    pub fn find_detail<D: Detail>(&self) -> Option<Result<D, DetailError>> {
        self.details.iter().find(|r| r.is::<D>()).map(DetailRecord::decode)
    }

    /// Serialize the detail list for the wire
    ///
    /// # Errors
    ///
    /// Returns [`DetailError::Encode`] if serialization fails
    pub fn encode_details(&self) -> Result<Vec<u8>, DetailError> {
        serde_json::to_vec(&self.details).map_err(DetailError::Encode)
    }

    /// Parse a wire detail list
    ///
    /// Empty or malformed input yields no records; a peer that does not send
    /// details is not an error.
    pub fn decode_details(bytes: &[u8]) -> Vec<DetailRecord> {
        if bytes.is_empty() {
            return Vec::new();
        }

        serde_json::from_slice(bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, len = bytes.len(), "discarding undecodable status details");
            Vec::new()
        })
    }

    /// Size of the details trailer once base64-encoded
    fn trailer_len(&self) -> Result<usize, DetailError> {
        self.encode_details().map(|bytes| bytes.len().div_ceil(3) * 4)
    }
}

fn trailer_records(metadata: &MetadataMap) -> Vec<DetailRecord> {
    let Some(value) = metadata.get_bin(DETAILS_TRAILER) else {
        return Vec::new();
    };

    match value.to_bytes() {
        Ok(bytes) => Status::decode_details(&bytes),
        Err(e) => {
            tracing::warn!(error = %e, "discarding undecodable details trailer");
            Vec::new()
        }
    }
}

impl From<Status> for tonic::Status {
    fn from(status: Status) -> Self {
        let encoded = if status.details.is_empty() {
            None
        } else {
            status
                .encode_details()
                .inspect_err(|e| tracing::debug!(error = %e, "sending status without details"))
                .ok()
        };

        let mut wire = Self::new(status.code, status.message);
        if let Some(bytes) = encoded {
            wire.metadata_mut()
                .insert_bin(DETAILS_TRAILER, BinaryMetadataValue::from_bytes(&bytes));
        }
        wire
    }
}

impl From<&tonic::Status> for Status {
    fn from(status: &tonic::Status) -> Self {
        Self::from_parts(status.code(), status.message(), trailer_records(status.metadata()))
    }
}

impl From<tonic::Status> for Status {
    fn from(status: tonic::Status) -> Self {
        Self::from(&status)
    }
}
