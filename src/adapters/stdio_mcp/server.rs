//! MCP stdio server implementing JSON-RPC 2.0 over stdin/stdout.
//!
//! Exposes a butler's registered tool surface as native Claude Code tools.
//! Every `tools/call` is routed through the Approval Gate, so a module's
//! handler only ever runs after the gate has decided (or recorded) the
//! call's approval outcome.
//!
//! Protocol: newline-delimited JSON-RPC 2.0 on stdin/stdout. Logging goes
//! to stderr — stdout is reserved for protocol messages.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::models::ToolDescriptor;
use crate::domain::ports::ToolHandler;
use crate::services::approval_gate::{ApprovalGate, GateOutcome};

/// A resolvable tool: its descriptor plus the handler the gate should
/// dispatch to when execution proceeds inline.
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub handler: Arc<dyn ToolHandler>,
}

/// MCP stdio server for a single running worker session.
pub struct StdioMcpServer {
    gate: Arc<ApprovalGate>,
    tools: Vec<RegisteredTool>,
    session_id: Option<Uuid>,
}

impl StdioMcpServer {
    pub fn new(gate: Arc<ApprovalGate>, tools: Vec<RegisteredTool>, session_id: Option<Uuid>) -> Self {
        Self { gate, tools, session_id }
    }

    fn find_tool(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.descriptor.name == name)
    }

    /// Run the stdio server loop against this process's own stdin/stdout.
    /// Used when the butler binary itself is invoked as the MCP endpoint.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.run_io(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Run the stdio server loop over an arbitrary reader/writer pair,
    /// reading JSON-RPC requests from `reader` and writing responses to
    /// `writer`. Used to bridge the gate into a worker subprocess's own
    /// stdio: the worker writes `tools/call` requests on what it thinks is
    /// its stdout, and this reads them from the parent's end of that pipe;
    /// responses go back over the worker's stdin.
    pub async fn run_io<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut lines = BufReader::new(reader).lines();

        info!("mcp stdio server started");

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            let response = self.handle_message(&line).await;
            if response.is_empty() {
                continue;
            }
            let mut response_bytes = response.into_bytes();
            response_bytes.push(b'\n');
            writer.write_all(&response_bytes).await?;
            writer.flush().await?;
        }

        info!("mcp stdio server stopped");
        Ok(())
    }

    async fn handle_message(&self, line: &str) -> String {
        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return self.error_response(Value::Null, -32700, &format!("Parse error: {e}")),
        };

        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(Value::as_str).unwrap_or("");
        let params = request.get("params").cloned().unwrap_or_else(|| serde_json::json!({}));

        match method {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, &params).await,
            "notifications/initialized" => String::new(),
            _ => self.error_response(id, -32601, &format!("Method not found: {method}")),
        }
    }

    fn handle_initialize(&self, id: Value) -> String {
        let result = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "butler", "version": env!("CARGO_PKG_VERSION") }
        });
        self.success_response(id, result)
    }

    fn handle_tools_list(&self, id: Value) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.descriptor.name,
                    "description": t.descriptor.description,
                    "inputSchema": { "type": "object", "additionalProperties": true }
                })
            })
            .collect();
        self.success_response(id, serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> String {
        let tool_name = params.get("name").and_then(Value::as_str).unwrap_or("");
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| serde_json::json!({}));

        let Some(tool) = self.find_tool(tool_name) else {
            return self.error_response(id, -32602, &format!("Unknown tool: {tool_name}"));
        };

        let dispatch_result =
            self.gate.dispatch(tool_name, arguments, Some(tool.handler.clone()), self.session_id, None).await;

        let outcome = match dispatch_result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(tool = tool_name, error = %e, "gate dispatch failed");
                return self.error_response(id, -32000, &e.to_string());
            }
        };

        let (text, is_error) = match outcome {
            GateOutcome::Ok(value) => (value.to_string(), false),
            GateOutcome::PendingApproval { action_id, message } => {
                (serde_json::json!({ "action_id": action_id, "message": message }).to_string(), false)
            }
            GateOutcome::Error { error, error_type } => {
                (serde_json::json!({ "error": error, "error_type": error_type }).to_string(), true)
            }
        };

        let result = serde_json::json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error
        });
        self.success_response(id, result)
    }

    fn success_response(&self, id: Value, result: Value) -> String {
        serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
    }

    fn error_response(&self, id: Value, code: i32, message: &str) -> String {
        serde_json::json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } }).to_string()
    }
}
