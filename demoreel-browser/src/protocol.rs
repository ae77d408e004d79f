//! CDP wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An outgoing CDP command.
#[derive(Debug, Serialize)]
pub(crate) struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// An incoming message: either a command response (has `id`) or an event
/// (has `method`).
#[derive(Debug, Deserialize)]
pub(crate) struct CdpMessage {
    pub id: Option<u64>,
    pub method: Option<String>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorBody>,
    #[serde(rename = "sessionId")]
    #[allow(dead_code)]
    pub session_id: Option<String>,
}

/// Error body inside a command response.
#[derive(Debug, Deserialize)]
pub(crate) struct CdpErrorBody {
    pub code: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_absent_fields() {
        let req = CdpRequest {
            id: 7,
            method: "Page.enable".to_string(),
            params: None,
            session_id: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"id":7,"method":"Page.enable"}"#);
    }

    #[test]
    fn test_message_parses_response_and_event() {
        let resp: CdpMessage =
            serde_json::from_str(r#"{"id": 3, "result": {"frameId": "F1"}}"#).unwrap();
        assert_eq!(resp.id, Some(3));
        assert!(resp.error.is_none());

        let event: CdpMessage = serde_json::from_str(
            r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.0}, "sessionId": "S"}"#,
        )
        .unwrap();
        assert!(event.id.is_none());
        assert_eq!(event.method.as_deref(), Some("Page.loadEventFired"));
    }

    #[test]
    fn test_error_body() {
        let resp: CdpMessage = serde_json::from_str(
            r#"{"id": 4, "error": {"code": -32000, "message": "Target closed"}}"#,
        )
        .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "Target closed");
    }
}
