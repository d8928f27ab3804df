//! Agent bridge
//!
//! Presents remote gateway tools and in-process tools to an agent through
//! one uniform interface: a name-ordered [`Toolset`] of [`Capability`]
//! values, each with a [`ToolSpec`] and an `invoke` returning a
//! [`ToolOutput`](crate::gateway::ToolOutput).

mod agent;
mod capability;
mod toolset;

pub use agent::AgentBridge;
pub use capability::{Capability, LocalTool, RemoteTool, ToolHandler, ToolSpec};
pub use toolset::{Toolset, build_toolset};
