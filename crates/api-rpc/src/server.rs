//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP on a TCP socket.

use crate::handler::RpcHandler;
use crate::types::{
    AssignRequest, CancelJobRequest, HistoryRequest, ReassignRequest, RecommendRequest,
    TransitionRequest,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9650;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind JSON-RPC server on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Failed to register method: {0}")]
    Register(String),
}

fn register_error(err: impl std::fmt::Display) -> ServerError {
    ServerError::Register(err.to_string())
}

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Method table of the dispatch API
    pub fn into_module(self) -> Result<RpcModule<()>, ServerError> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("dispatch.recommend.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RecommendRequest = params.parse()?;
                    handler.recommend(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("dispatch.assign.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: AssignRequest = params.parse()?;
                    handler.assign(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("dispatch.transition.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: TransitionRequest = params.parse()?;
                    handler.transition(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("dispatch.reassign.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ReassignRequest = params.parse()?;
                    handler.reassign(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("dispatch.cancel_job.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CancelJobRequest = params.parse()?;
                    handler.cancel_job(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("dispatch.history.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: HistoryRequest = params.parse()?;
                    handler.history(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.stats.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.stats().await }
            })
            .map_err(register_error)?;

        Ok(module)
    }

    /// Bind and start serving. Returns the handle and the bound address
    /// (useful when `port` is 0).
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = server
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let module = self.into_module()?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((handle, local_addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::handler;
    use serde_json::{json, Value};

    async fn serve() -> (ServerHandle, String) {
        let config = RpcServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let (handle, addr) = RpcServer::new(config, handler().await)
            .start()
            .await
            .unwrap();
        (handle, format!("http://{}", addr))
    }

    async fn call(url: &str, method: &str, params: Value) -> Value {
        reqwest::Client::new()
            .post(url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_stats_without_params() {
        let (handle, url) = serve().await;

        let response = call(&url, "admin.stats.v1", json!({})).await;

        assert_eq!(response["result"]["jobs"]["PENDING"], 1);
        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_assign_and_accept_over_http() {
        let (handle, url) = serve().await;

        let created = call(
            &url,
            "dispatch.assign.v1",
            json!({
                "job_id": "job-1",
                "contractor_id": "c-1",
                "actor_id": "disp-1",
                "actor_role": "dispatcher"
            }),
        )
        .await;
        assert_eq!(created["result"]["status"], "PENDING");

        let accepted = call(
            &url,
            "dispatch.transition.v1",
            json!({
                "assignment_id": created["result"]["assignment_id"],
                "target_state": "ACCEPTED",
                "actor_id": "c-1",
                "actor_role": "contractor"
            }),
        )
        .await;
        assert_eq!(accepted["result"]["status"], "ACCEPTED");
        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_application_error_codes_reach_the_wire() {
        let (handle, url) = serve().await;

        let missing = call(&url, "dispatch.history.v1", json!({ "job_id": "job-404" })).await;
        assert_eq!(missing["error"]["code"], 4001);

        let bad_role = call(
            &url,
            "dispatch.assign.v1",
            json!({
                "job_id": "job-1",
                "contractor_id": "c-1",
                "actor_id": "x",
                "actor_role": "admin"
            }),
        )
        .await;
        assert_eq!(bad_role["error"]["code"], -32602);
        handle.stop().unwrap();
    }
}
