//! Session relay DTOs
//!
//! Wire types for the interactive browser session endpoints. Coordinates in
//! input events are expressed in the session's fixed logical viewport space;
//! the UI client scales from rendered pixels before relaying.

use serde::{Deserialize, Serialize};

/// Request to open (or replace) the live session for a demo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSession {
    pub url: String,
}

/// An input event relayed onto the live page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    Click { x: f64, y: f64 },
    Type { text: String },
    Key { name: String },
    Navigate { url: String },
    Scroll { x: f64, y: f64, delta_y: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_event_tagged_wire_shape() {
        let click: InputEvent =
            serde_json::from_str(r#"{"kind": "click", "x": 320.0, "y": 240.0}"#).unwrap();
        assert!(matches!(click, InputEvent::Click { x, y } if x == 320.0 && y == 240.0));

        let key: InputEvent = serde_json::from_str(r#"{"kind": "key", "name": "Enter"}"#).unwrap();
        assert!(matches!(key, InputEvent::Key { name } if name == "Enter"));

        let scroll: InputEvent =
            serde_json::from_str(r#"{"kind": "scroll", "x": 10, "y": 20, "delta_y": 120}"#)
                .unwrap();
        assert!(matches!(scroll, InputEvent::Scroll { delta_y, .. } if delta_y == 120.0));
    }

    #[test]
    fn test_unknown_event_kind_rejected() {
        let result: Result<InputEvent, _> =
            serde_json::from_str(r#"{"kind": "hover", "x": 1, "y": 2}"#);
        assert!(result.is_err());
    }
}
