//! Gateway tool client

mod descriptor;
mod output;
mod session;

pub use descriptor::{RemoteToolDescriptor, TARGET_SEPARATOR};
pub use output::ToolOutput;
pub use session::{GatewaySession, SEARCH_TOOL};
