//! The bridge between a host's method channel and the daemon handle.

mod adapter;
pub mod command;

pub use adapter::Bridge;
pub use command::{Command, Response};
