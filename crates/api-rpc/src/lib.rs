//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 server exposing recommendation, assignment lifecycle and
//! admin methods of the dispatch engine.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use rate_limiter::RateLimiter;
pub use jsonrpsee::server::ServerHandle;
pub use server::{RpcServer, RpcServerConfig, ServerError};
