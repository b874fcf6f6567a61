//! JSON method codec.
//!
//! Call:            `{"method": "start", "args": {"dataDir": "/tmp/a"}}`
//! Success reply:   `[result]`
//! Error reply:     `[code, message, details]`
//! Not implemented: empty reply

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{MethodCall, MethodResult};

/// Error code for messages that don't decode as a call.
pub const BAD_MESSAGE: &str = "bad_message";

#[derive(Serialize, Deserialize)]
struct WireCall {
    method: String,
    #[serde(default)]
    args: Value,
}

pub fn decode_method_call(message: &[u8]) -> Result<MethodCall> {
    let wire: WireCall =
        serde_json::from_slice(message).context("failed to decode method call")?;
    Ok(MethodCall {
        method: wire.method,
        arguments: wire.args,
    })
}

pub fn encode_method_call(call: &MethodCall) -> Vec<u8> {
    let wire = WireCall {
        method: call.method.clone(),
        args: call.arguments.clone(),
    };
    serde_json::to_vec(&wire).unwrap_or_default()
}

pub fn encode_result(result: &MethodResult) -> Vec<u8> {
    let envelope = match result {
        MethodResult::Success { result } => json!([result]),
        MethodResult::Error {
            code,
            message,
            details,
        } => json!([code, message, details]),
        MethodResult::NotImplemented => return Vec::new(),
    };
    serde_json::to_vec(&envelope).unwrap_or_default()
}

/// Host-side decoding of a reply envelope.
pub fn decode_result(reply: &[u8]) -> Result<MethodResult> {
    if reply.is_empty() {
        return Ok(MethodResult::NotImplemented);
    }

    let envelope: Vec<Value> =
        serde_json::from_slice(reply).context("failed to decode reply envelope")?;

    match envelope.as_slice() {
        [result] => Ok(MethodResult::Success {
            result: result.clone(),
        }),
        [Value::String(code), message, details] => Ok(MethodResult::Error {
            code: code.clone(),
            message: message.as_str().unwrap_or_default().to_string(),
            details: details.clone(),
        }),
        _ => anyhow::bail!("invalid reply envelope of {} elements", envelope.len()),
    }
}
