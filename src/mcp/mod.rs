//! JSON-RPC 2.0 client for the collaborator services (`spec.md` §4.1).
//!
//! The agent drives two collaborators — a browser-control service exposing
//! `ui.*` tools, and a data-control service exposing backend tools — through
//! the same wire protocol. This module is transport-agnostic: [`McpTransport`]
//! is the seam, [`HttpMcpTransport`] the one real implementation.

pub mod registry;
pub mod transport;
pub mod wire;

pub use registry::ToolRegistry;
pub use transport::{HttpMcpTransport, McpTransport};
pub use wire::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
