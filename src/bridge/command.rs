use anyhow::Result;
use serde_json::Value;

use crate::channel::{MethodCall, MethodResult};

pub const START: &str = "start";

/// Every method the bridge answers. Anything else is not implemented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the daemon (once) and report its port.
    Start { data_dir: String },
}

impl Command {
    /// Parse a channel call. `Ok(None)` means the method is unknown.
    pub fn parse(call: &MethodCall) -> Result<Option<Command>> {
        match call.method.as_str() {
            START => {
                let data_dir = match call.argument("dataDir") {
                    None => String::new(),
                    Some(Value::String(dir)) => dir.clone(),
                    Some(other) => anyhow::bail!("dataDir must be a string, got {}", other),
                };
                Ok(Some(Command::Start { data_dir }))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Port(u16),
}

impl From<Response> for MethodResult {
    fn from(response: Response) -> Self {
        match response {
            Response::Port(port) => MethodResult::success(port),
        }
    }
}
