//! Agent Client Protocol surface: JSON-RPC over stdio.

pub mod rpc;
pub mod server;

pub use rpc::{JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse, methods};
pub use server::{AcpServer, Outbound, PROTOCOL_VERSION};
