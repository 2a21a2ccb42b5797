//! JSON host bridge: versioned envelopes, command routing and the
//! newline-delimited stdio transport.

pub mod contract;
pub mod handler;
pub mod stdio;

pub use contract::{CommandEnvelope, CommandName, EVENT_VERSION, ResponseEnvelope};
pub use handler::HostHandler;
pub use stdio::{run_bridge, run_stdio_bridge};
