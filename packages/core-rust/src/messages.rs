//! Reply message sent by the external application back to the bridge.
//!
//! # Wire format
//!
//! One JSON document per accepted connection:
//!
//! ```json
//! { "cb": 5, "error": true, "message": ["bad", 42, "path"] }
//! ```
//!
//! `cb` is required and must be a non-negative integer. `error` defaults to
//! `false` when absent and is read by truthiness: `null`, `0`, `""` and
//! `false` are success, anything else is a failure. `message` is optional and
//! may be any JSON value; only strings and arrays carry meaning (see
//! [`Reply::error_message`]).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::correlation::CorrelationId;

/// Fallback text for an error reply that carried no usable message.
pub const UNSPECIFIED_REMOTE_ERROR: &str = "unspecified remote error";

/// Completion signal for one launched command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Correlation identifier copied from the `socketcb=` argument.
    pub cb: CorrelationId,
    /// Whether the external application reports a failure.
    #[serde(default, deserialize_with = "truthy")]
    pub error: bool,
    /// Optional detail: a string, or a list whose string elements are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

impl Reply {
    /// A successful reply for `cb`.
    #[must_use]
    pub fn success(cb: CorrelationId) -> Self {
        Self {
            cb,
            error: false,
            message: None,
        }
    }

    /// An error reply for `cb` carrying `message` verbatim.
    #[must_use]
    pub fn failure(cb: CorrelationId, message: impl Into<Value>) -> Self {
        Self {
            cb,
            error: true,
            message: Some(message.into()),
        }
    }

    /// Parses a complete reply document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the bytes are not valid JSON, the
    /// document is incomplete, or `cb` is missing or not an integer.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encodes the reply as a single JSON document.
    ///
    /// # Errors
    ///
    /// Only fails if a contained value cannot be serialized, which does not
    /// happen for `serde_json::Value`.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Normalized failure text for an error reply.
    ///
    /// Lists keep only their string elements joined by `", "`. Strings pass
    /// through unchanged. Any other value is rendered as JSON text, and a
    /// missing or null message becomes [`UNSPECIFIED_REMOTE_ERROR`].
    #[must_use]
    pub fn error_message(&self) -> String {
        normalize_message(self.message.as_ref())
    }
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Normalizes an optional reply message into caller-facing text.
#[must_use]
pub fn normalize_message(message: Option<&Value>) -> String {
    match message {
        None | Some(Value::Null) => UNSPECIFIED_REMOTE_ERROR.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn list_message_keeps_only_strings() {
        let reply = Reply::from_slice(br#"{"cb": 5, "error": true, "message": ["bad", 42, "path"]}"#)
            .unwrap();
        assert_eq!(reply.cb, CorrelationId(5));
        assert!(reply.error);
        assert_eq!(reply.error_message(), "bad, path");
    }

    #[test]
    fn string_message_passes_through() {
        let reply = Reply::failure(CorrelationId(1), "disk full");
        assert_eq!(reply.error_message(), "disk full");
    }

    #[test]
    fn list_without_strings_is_empty_text() {
        let reply = Reply::failure(CorrelationId(1), json!([1, null, {"a": 1}]));
        assert_eq!(reply.error_message(), "");
    }

    #[test]
    fn missing_message_uses_fallback() {
        let reply = Reply::from_slice(br#"{"cb": 3, "error": true}"#).unwrap();
        assert_eq!(reply.error_message(), UNSPECIFIED_REMOTE_ERROR);
    }

    #[test]
    fn scalar_message_rendered_as_json() {
        let reply = Reply::failure(CorrelationId(1), json!(17));
        assert_eq!(reply.error_message(), "17");
    }

    #[test]
    fn error_flag_defaults_to_false() {
        let reply = Reply::from_slice(br#"{"cb": 5}"#).unwrap();
        assert_eq!(reply, Reply::success(CorrelationId(5)));
    }

    #[test]
    fn null_error_flag_is_success() {
        let reply = Reply::from_slice(br#"{"cb": 4, "error": null}"#).unwrap();
        assert_eq!(reply, Reply::success(CorrelationId(4)));
    }

    #[test]
    fn error_flag_follows_truthiness() {
        for (doc, expected) in [
            (r#"{"cb": 1, "error": 0}"#, false),
            (r#"{"cb": 1, "error": ""}"#, false),
            (r#"{"cb": 1, "error": 1}"#, true),
            (r#"{"cb": 1, "error": "yes"}"#, true),
            (r#"{"cb": 1, "error": {}}"#, true),
        ] {
            assert_eq!(Reply::from_slice(doc.as_bytes()).unwrap().error, expected, "{doc}");
        }
    }

    #[test]
    fn missing_cb_is_rejected() {
        assert!(Reply::from_slice(br#"{"error": false}"#).is_err());
    }

    #[test]
    fn non_integer_cb_is_rejected() {
        assert!(Reply::from_slice(br#"{"cb": "5"}"#).is_err());
        assert!(Reply::from_slice(br#"{"cb": -1}"#).is_err());
    }

    #[test]
    fn truncated_document_reports_eof() {
        let err = Reply::from_slice(br#"{"cb": 5, "err"#).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn success_reply_omits_message_on_the_wire() {
        let bytes = Reply::success(CorrelationId(9)).to_vec().unwrap();
        assert_eq!(bytes, br#"{"cb":9,"error":false}"#);
    }
}
