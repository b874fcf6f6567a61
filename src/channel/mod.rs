//! Named method channels between a host shell and native handlers.
//!
//! A host delivers [`MethodCall`]s on a channel name and expects a
//! [`MethodResult`] back. Handlers are registered on a [`BinaryMessenger`]
//! the caller owns, so there is no process-wide registry.

pub mod codec;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use serde::Serialize;
use serde_json::Value;

/// An incoming call: method name plus its (possibly null) arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Look up a named argument. Missing keys, `null` and non-map arguments
    /// all yield `None`.
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key).filter(|v| !v.is_null())
    }
}

/// Reply to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResult {
    Success {
        result: Value,
    },
    Error {
        code: String,
        message: String,
        details: Value,
    },
    /// The handler does not know the method.
    NotImplemented,
}

impl MethodResult {
    pub fn success(result: impl Into<Value>) -> Self {
        MethodResult::Success {
            result: result.into(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        MethodResult::Error {
            code: code.into(),
            message: message.into(),
            details: Value::Null,
        }
    }
}

/// Something that answers calls on a channel.
pub trait MethodCallHandler: Send + Sync {
    fn on_method_call(&self, call: MethodCall) -> MethodResult;
}

/// The host side of the channel: where handlers get registered.
pub trait BinaryMessenger {
    /// Install `handler` for `channel`, or clear it with `None`.
    fn set_method_call_handler(&self, channel: &str, handler: Option<Arc<dyn MethodCallHandler>>);
}

/// In-process [`BinaryMessenger`] that routes calls by channel name.
#[derive(Default)]
pub struct ChannelRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn MethodCallHandler>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, channel: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(channel)
    }

    /// Route `call` to the handler on `channel`. No handler means not implemented.
    pub fn dispatch(&self, channel: &str, call: MethodCall) -> MethodResult {
        // Clone the handler out so the lock isn't held across the call.
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned();

        match handler {
            Some(h) => h.on_method_call(call),
            None => {
                debug!("[channel] no handler on '{}' for '{}'", channel, call.method);
                MethodResult::NotImplemented
            }
        }
    }

    /// Decode an encoded call, dispatch it and encode the reply.
    pub fn handle_message(&self, channel: &str, message: &[u8]) -> Vec<u8> {
        let reply = match codec::decode_method_call(message) {
            Ok(call) => self.dispatch(channel, call),
            Err(e) => MethodResult::error(codec::BAD_MESSAGE, format!("{:#}", e)),
        };
        codec::encode_result(&reply)
    }
}

impl BinaryMessenger for ChannelRegistry {
    fn set_method_call_handler(&self, channel: &str, handler: Option<Arc<dyn MethodCallHandler>>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match handler {
            Some(h) => {
                handlers.insert(channel.to_string(), h);
            }
            None => {
                handlers.remove(channel);
            }
        }
    }
}
