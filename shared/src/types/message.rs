//! Messages exchanged with a relay worker
//!
//! Both messages travel as two-element sequences: `[payload, args]` inbound
//! and `[result, elapsed_ms]` outbound, where `result` pairs the raw return
//! value with its decoded [`ModuleResult`].

use serde::{Deserialize, Serialize};

use crate::wasm::ModuleResult;

/// A single relay request: the file bytes and the module's argument string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Vec<u8>, String)", into = "(Vec<u8>, String)")]
pub struct InboundMessage {
    /// Opaque file contents handed to the module
    pub payload: Vec<u8>,

    /// Argument string, e.g. `-s5 -epng`
    pub args: String,
}

impl InboundMessage {
    pub fn new(payload: impl Into<Vec<u8>>, args: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            args: args.into(),
        }
    }
}

impl From<(Vec<u8>, String)> for InboundMessage {
    fn from((payload, args): (Vec<u8>, String)) -> Self {
        Self { payload, args }
    }
}

impl From<InboundMessage> for (Vec<u8>, String) {
    fn from(msg: InboundMessage) -> Self {
        (msg.payload, msg.args)
    }
}

/// The relay's reply: what the module returned plus the round-trip time.
///
/// Serializes as `[[raw, result], elapsed_ms]`, so the entry point's return
/// value travels unmodified next to its decoded form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "((i32, ModuleResult), f64)", into = "((i32, ModuleResult), f64)")]
pub struct OutboundMessage {
    /// Entry point return value, exactly as the module produced it
    pub raw: i32,

    pub result: ModuleResult,

    /// Milliseconds between receipt of the request and this reply
    pub elapsed_ms: f64,
}

impl From<((i32, ModuleResult), f64)> for OutboundMessage {
    fn from(((raw, result), elapsed_ms): ((i32, ModuleResult), f64)) -> Self {
        Self {
            raw,
            result,
            elapsed_ms,
        }
    }
}

impl From<OutboundMessage> for ((i32, ModuleResult), f64) {
    fn from(msg: OutboundMessage) -> Self {
        ((msg.raw, msg.result), msg.elapsed_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_serializes_as_pair() {
        let msg = InboundMessage::new(vec![1u8, 2, 3], "-s2");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"[[1,2,3],"-s2"]"#);

        let back: InboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_outbound_serializes_as_pair() {
        let msg = OutboundMessage {
            raw: -2,
            result: ModuleResult::Error(-2),
            elapsed_ms: 1.5,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[0][0], serde_json::json!(-2));
        assert_eq!(value[1], serde_json::json!(1.5));

        let back: OutboundMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_outbound_keeps_unreadable_raw_value() {
        let msg = OutboundMessage {
            raw: 70000,
            result: ModuleResult::Unreadable(70000),
            elapsed_ms: 0.25,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value[0][0], serde_json::json!(70000));
        assert_eq!(value[0][1], serde_json::json!({ "unreadable": 70000 }));
    }

    #[test]
    fn test_inbound_rejects_missing_field() {
        let result: Result<InboundMessage, _> = serde_json::from_str(r#"[[1,2,3]]"#);
        assert!(result.is_err());
    }
}
