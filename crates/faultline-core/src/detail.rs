//! Structured detail records carried by a [`Status`](crate::Status)
//!
//! Records are JSON payloads tagged with a `type.faultline.dev` type URL. The
//! error info and bad request records mirror the fields of their
//! `google.rpc` namesakes but are not protobuf-encoded.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A payload that can be attached to a status as a typed record
pub trait Detail: Serialize + DeserializeOwned {
    /// Identifies the record type on the wire
    const TYPE_URL: &'static str;
}

/// Primary record describing why a call failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Kind of failure, e.g. `NOT_FOUND`
    pub reason: String,
    /// Service that produced the failure
    pub domain: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Detail for ErrorInfo {
    const TYPE_URL: &'static str = "type.faultline.dev/faultline.ErrorInfo";
}

/// Invalid request fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadRequest {
    #[serde(default)]
    pub field_violations: Vec<FieldViolation>,
}

impl Detail for BadRequest {
    const TYPE_URL: &'static str = "type.faultline.dev/faultline.BadRequest";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub description: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            description: description.into(),
        }
    }
}

impl<F: Into<String>, D: Into<String>> From<(F, D)> for FieldViolation {
    fn from((field, description): (F, D)) -> Self {
        Self::new(field, description)
    }
}

/// The customer cannot cover the requested charge
///
/// Amounts are in minor currency units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsufficientCredit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
}

impl Detail for InsufficientCredit {
    const TYPE_URL: &'static str = "type.faultline.dev/faultline.InsufficientCredit";
}

/// An upstream payment gateway could not be reached
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayUnreachable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

impl Detail for GatewayUnreachable {
    const TYPE_URL: &'static str = "type.faultline.dev/faultline.GatewayUnreachable";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_uses_camel_case_fields() {
        let detail = BadRequest {
            field_violations: vec![FieldViolation::new("order_id", "must be numeric")],
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fieldViolations": [{ "field": "order_id", "description": "must be numeric" }]
            })
        );
    }

    #[test]
    fn empty_metadata_is_omitted() {
        let info = ErrorInfo {
            reason: "NOT_FOUND".to_owned(),
            domain: "order-service".to_owned(),
            metadata: BTreeMap::new(),
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json, serde_json::json!({ "reason": "NOT_FOUND", "domain": "order-service" }));
    }

    #[test]
    fn missing_optional_fields_decode_as_none() {
        let credit: InsufficientCredit = serde_json::from_str("{}").unwrap();
        assert_eq!(credit, InsufficientCredit::default());
    }
}
