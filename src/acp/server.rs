//! ACP agent server over newline-delimited JSON-RPC.
//!
//! One reader loop parses frames from the client; every outbound frame
//! (responses and `session/update` notifications) is queued to a single
//! writer task, so updates of a turn reach the client in emission order and
//! always before that turn's `session/prompt` response. Prompts run as
//! spawned tasks so `session/cancel` is read while a turn is in flight.

use super::rpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, methods};
use crate::agent::{
    Agent, ChannelUpdateSink, PromptBlock, SessionNotification, StopReason, UpdateSink,
};
use crate::error::{BuddyError, SessionError};
use anyhow::Result;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const PROTOCOL_VERSION: u32 = 1;
const AGENT_NAME: &str = "code-buddy";
const AGENT_TITLE: &str = "Coding Buddy Agent";
const OUTBOUND_QUEUE: usize = 256;

/// A frame waiting for the writer task.
#[derive(Debug)]
pub enum Outbound {
    Response(JsonRpcResponse),
    Update(SessionNotification),
}

impl Outbound {
    fn to_line(&self) -> serde_json::Result<String> {
        let mut line = match self {
            Self::Response(response) => serde_json::to_string(response)?,
            Self::Update(notification) => serde_json::to_string(&JsonRpcNotification::new(
                methods::SESSION_UPDATE,
                notification,
            ))?,
        };
        line.push('\n');
        Ok(line)
    }
}

impl From<SessionNotification> for Outbound {
    fn from(notification: SessionNotification) -> Self {
        Self::Update(notification)
    }
}

impl From<JsonRpcResponse> for Outbound {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

// ── Params ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSessionParams {
    cwd: PathBuf,
    /// Accepted for protocol compatibility; external tool servers are not
    /// connected.
    #[serde(default)]
    mcp_servers: Vec<Value>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptParams {
    session_id: String,
    prompt: Vec<PromptBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelParams {
    session_id: String,
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

fn rpc_error(err: BuddyError) -> JsonRpcError {
    match err {
        BuddyError::Session(SessionError::NotFound(id)) => JsonRpcError::session_not_found(&id),
        BuddyError::Session(err @ SessionError::Duplicate(_)) => {
            JsonRpcError::invalid_params(err.to_string())
        }
        other => JsonRpcError::internal_error(other.to_string()),
    }
}

/// ACP names a finished turn `end_turn`.
fn wire_stop_reason(reason: StopReason) -> &'static str {
    match reason {
        StopReason::Completed => "end_turn",
        StopReason::Cancelled => "cancelled",
    }
}

// ── Server ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AcpServer {
    agent: Arc<Agent>,
    model_id: Arc<str>,
}

impl AcpServer {
    pub fn new(agent: Arc<Agent>, model_id: impl Into<Arc<str>>) -> Self {
        Self {
            agent,
            model_id: model_id.into(),
        }
    }

    /// Serve the client on this process's stdin/stdout until stdin closes.
    pub async fn serve_stdio(self) -> Result<()> {
        tracing::info!("ACP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one client connection. Returns once the reader hits EOF and
    /// every in-flight turn has answered.
    pub async fn serve<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, queue) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE);
        let writer_task = tokio::spawn(write_frames(writer, queue));
        let mut turns = JoinSet::new();

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            while turns.try_join_next().is_some() {}

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("unparseable frame from client: {e}");
                    let error = JsonRpcError::parse_error(format!("Invalid JSON: {e}"));
                    let response = JsonRpcResponse::error(None, error);
                    if outbound.send(response.into()).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            self.dispatch(request, &outbound, &mut turns).await;
        }

        tracing::info!(in_flight = turns.len(), "ACP client closed input");
        while turns.join_next().await.is_some() {}
        drop(outbound);
        writer_task.await?
    }

    async fn dispatch(
        &self,
        request: JsonRpcRequest,
        outbound: &mpsc::Sender<Outbound>,
        turns: &mut JoinSet<()>,
    ) {
        let JsonRpcRequest { id, method, params, .. } = request;
        tracing::debug!(method = %method, "ACP request");

        let Some(id) = id else {
            self.notification(&method, params);
            return;
        };

        let result = match method.as_str() {
            methods::INITIALIZE => Ok(self.initialize()),
            methods::SESSION_NEW => self.new_session(params).await,
            methods::SESSION_PROMPT => {
                let server = self.clone();
                let outbound = outbound.clone();
                turns.spawn(async move {
                    let result = server.prompt(params, outbound.clone()).await;
                    let response = JsonRpcResponse::from_result(id, result);
                    if outbound.send(response.into()).await.is_err() {
                        tracing::warn!("client gone before prompt response");
                    }
                });
                return;
            }
            methods::SESSION_CANCEL => self.cancel(params).map(|()| Value::Null),
            other => Err(JsonRpcError::method_not_found(other)),
        };

        let response = JsonRpcResponse::from_result(id, result);
        if outbound.send(response.into()).await.is_err() {
            tracing::warn!(method = %method, "client gone before response");
        }
    }

    fn notification(&self, method: &str, params: Value) {
        match method {
            methods::SESSION_CANCEL => {
                if let Err(e) = self.cancel(params) {
                    tracing::debug!("ignored cancel: {}", e.message);
                }
            }
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "agentCapabilities": {
                "loadSession": false,
                "promptCapabilities": {
                    "image": false,
                    "audio": false,
                    "embeddedContext": false
                }
            },
            "agentInfo": {
                "name": AGENT_NAME,
                "title": AGENT_TITLE,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn new_session(&self, params: Value) -> Result<Value, JsonRpcError> {
        let params: NewSessionParams = parse_params(params)?;
        if !params.mcp_servers.is_empty() {
            tracing::debug!(count = params.mcp_servers.len(), "ignoring MCP servers");
        }

        let session = self
            .agent
            .create_session(params.cwd, params.session_id)
            .await
            .map_err(|e| rpc_error(e.into()))?;

        Ok(json!({
            "sessionId": session.id(),
            "modes": {
                "currentModeId": "auto",
                "availableModes": [{
                    "id": "auto",
                    "name": "Auto",
                    "description": "Autonomous coding agent mode"
                }]
            },
            "models": {
                "currentModelId": &*self.model_id,
                "availableModels": [{
                    "modelId": &*self.model_id,
                    "name": &*self.model_id
                }]
            }
        }))
    }

    async fn prompt(
        &self,
        params: Value,
        outbound: mpsc::Sender<Outbound>,
    ) -> Result<Value, JsonRpcError> {
        let params: PromptParams = parse_params(params)?;
        let sink: Arc<dyn UpdateSink> = Arc::new(ChannelUpdateSink::new(outbound));
        let outcome = self
            .agent
            .submit_turn(&params.session_id, &params.prompt, sink)
            .await
            .map_err(rpc_error)?;
        Ok(json!({ "stopReason": wire_stop_reason(outcome.stop_reason) }))
    }

    fn cancel(&self, params: Value) -> Result<(), JsonRpcError> {
        let params: CancelParams = parse_params(params)?;
        self.agent
            .cancel_turn(&params.session_id)
            .map_err(|e| rpc_error(e.into()))
    }
}

async fn write_frames<W>(mut writer: W, mut queue: mpsc::Receiver<Outbound>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queue.recv().await {
        let line = frame.to_line()?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
