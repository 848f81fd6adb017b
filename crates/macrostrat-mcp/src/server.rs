//! MCP dispatch router and stdio transport
//!
//! The server reads one JSON-RPC message per newline-delimited frame and
//! answers each request before reading the next one. A frame that is not
//! valid UTF-8 JSON gets a parse error; the stream keeps going. Notifications
//! (messages without an `id`) are acknowledged silently. All state is the
//! immutable [`Gateway`], so the router itself holds nothing that changes
//! between requests.

use macrostrat_lib::{Gateway, GatewayConfig};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::types::{
    CallToolParams, GetPromptParams, InitializeResult, ListPromptsResult, ListToolsResult,
    ReadResourceParams, Request, Response, ServerInfo, JSONRPC_VERSION, PROTOCOL_VERSION,
    SERVER_NAME,
};
use crate::{prompts, resources, tools, Error, Result};

/// Protocol request kinds the router understands, with parsed parameters
#[derive(Debug, Clone)]
pub enum CapabilityRequest {
    Initialize,
    Ping,
    ListTools,
    CallTool(CallToolParams),
    ListPrompts,
    GetPrompt(GetPromptParams),
    ListResources,
    ReadResource(ReadResourceParams),
    ListRoots,
}

impl CapabilityRequest {
    /// Map a JSON-RPC method and its params onto a request kind
    pub fn parse(method: &str, params: Option<Value>) -> Result<Self> {
        Ok(match method {
            "initialize" => CapabilityRequest::Initialize,
            "ping" => CapabilityRequest::Ping,
            "tools/list" => CapabilityRequest::ListTools,
            "tools/call" => CapabilityRequest::CallTool(parse_required_params(method, params)?),
            "prompts/list" => CapabilityRequest::ListPrompts,
            "prompts/get" => CapabilityRequest::GetPrompt(parse_required_params(method, params)?),
            "resources/list" => CapabilityRequest::ListResources,
            "resources/read" => {
                CapabilityRequest::ReadResource(parse_required_params(method, params)?)
            }
            "roots/list" => CapabilityRequest::ListRoots,
            other => return Err(Error::method_not_found(other)),
        })
    }
}

fn parse_required_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T> {
    match params {
        Some(value) => serde_json::from_value(value)
            .map_err(|err| Error::invalid_param("params", format!("{method}: {err}"))),
        None => Err(Error::invalid_param(
            "params",
            format!("{method}: missing parameters"),
        )),
    }
}

/// Main server state shared by every request
#[derive(Debug, Clone)]
pub struct McpServerState {
    gateway: Gateway,
}

impl McpServerState {
    /// Server against the public Macrostrat endpoints
    pub fn new() -> Result<Self> {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Result<Self> {
        Ok(Self::with_gateway(Gateway::new(config)?))
    }

    pub fn with_gateway(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Answer one capability request
    pub async fn dispatch(&self, request: CapabilityRequest) -> Result<Value> {
        let value = match request {
            CapabilityRequest::Initialize => serde_json::to_value(InitializeResult {
                protocol_version: PROTOCOL_VERSION,
                capabilities: json!({
                    "tools": {},
                    "prompts": {},
                    "resources": {},
                    "roots": {}
                }),
                server_info: ServerInfo {
                    name: SERVER_NAME,
                    version: env!("CARGO_PKG_VERSION"),
                },
            })?,
            CapabilityRequest::Ping => json!({}),
            CapabilityRequest::ListTools => serde_json::to_value(ListToolsResult {
                tools: tools::list_tools(),
            })?,
            CapabilityRequest::CallTool(params) => {
                serde_json::to_value(tools::call_tool(&self.gateway, params).await?)?
            }
            CapabilityRequest::ListPrompts => serde_json::to_value(ListPromptsResult {
                prompts: prompts::list_prompts(),
            })?,
            CapabilityRequest::GetPrompt(params) => {
                serde_json::to_value(prompts::get_prompt(&self.gateway, params).await?)?
            }
            CapabilityRequest::ListResources => serde_json::to_value(resources::list_resources())?,
            CapabilityRequest::ReadResource(params) => {
                serde_json::to_value(resources::read_resource(&params.uri)?)?
            }
            CapabilityRequest::ListRoots => {
                serde_json::to_value(resources::list_roots(self.gateway.config()))?
            }
        };
        Ok(value)
    }

    /// Handle one inbound line; `None` means nothing is written back.
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        self.handle_frame(line.as_bytes()).await
    }

    /// Handle one raw frame. Bytes are decoded as JSON directly, so invalid
    /// UTF-8 is reported as a parse error rather than an I/O failure.
    pub async fn handle_frame(&self, frame: &[u8]) -> Option<Response> {
        let frame = frame.trim_ascii();
        if frame.is_empty() {
            return None;
        }

        let message: Value = match serde_json::from_slice(frame) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "unparseable message");
                return Some(Response::error(Value::Null, Error::parse_error(err.to_string())));
            }
        };
        let fallback_id = message.get("id").cloned().unwrap_or(Value::Null);

        let request: Request = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "invalid request");
                return Some(Response::error(
                    fallback_id,
                    Error::invalid_request(err.to_string()),
                ));
            }
        };
        if let Some(version) = request.jsonrpc.as_deref() {
            if version != JSONRPC_VERSION {
                return Some(Response::error(
                    fallback_id,
                    Error::invalid_request(format!("unsupported jsonrpc version {version}")),
                ));
            }
        }

        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);

        info!(method = %request.method, "request");
        let outcome = match CapabilityRequest::parse(&request.method, request.params) {
            Ok(kind) => self.dispatch(kind).await,
            Err(err) => Err(err),
        };
        Some(match outcome {
            Ok(result) => Response::success(id, result),
            Err(err) => {
                warn!(method = %request.method, code = err.code, error = %err, "request failed");
                Response::error(id, err)
            }
        })
    }

    /// Serve requests from `reader` until EOF, one response line per request
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let Some(response) = self.handle_frame(&buf).await else {
                continue;
            };
            let mut frame = serde_json::to_string(&response).map_err(std::io::Error::other)?;
            frame.push('\n');
            writer.write_all(frame.as_bytes()).await?;
            writer.flush().await?;
        }
        info!("input closed, shutting down");
        Ok(())
    }

    /// Serve over the process stdin/stdout
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_state() -> McpServerState {
        McpServerState::with_config(GatewayConfig::with_endpoints(
            "http://127.0.0.1:9/api",
            "http://127.0.0.1:9/tiles",
        ))
        .unwrap()
    }

    async fn roundtrip(state: &McpServerState, line: &str) -> Value {
        let response = state.handle_line(line).await.expect("a response");
        serde_json::to_value(response).unwrap()
    }

    #[test]
    fn test_server_creation() {
        let state = McpServerState::new().unwrap();
        assert_eq!(state.gateway().config().timescale_id, 11);
    }

    #[test]
    fn test_parse_unknown_method() {
        let err = CapabilityRequest::parse("tools/destroy", None).unwrap_err();
        assert_eq!(err.rpc_code(), crate::error::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_parse_missing_params() {
        let err = CapabilityRequest::parse("resources/read", None).unwrap_err();
        assert_eq!(err.rpc_code(), crate::error::INVALID_PARAMS);
        let err =
            CapabilityRequest::parse("tools/call", Some(json!({"arguments": {}}))).unwrap_err();
        assert!(err.message.contains("tools/call"));
    }

    #[tokio::test]
    async fn test_initialize() {
        let value = roundtrip(
            &offline_state(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        )
        .await;
        assert_eq!(value["id"], 1);
        assert_eq!(value["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(value["result"]["serverInfo"]["name"], "macrostrat");
        for capability in ["tools", "prompts", "resources", "roots"] {
            assert!(value["result"]["capabilities"].get(capability).is_some());
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let value = roundtrip(
            &offline_state(),
            r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#,
        )
        .await;
        assert_eq!(value["id"], "a");
        assert_eq!(value["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let value = roundtrip(&offline_state(), "{not json").await;
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_invalid_request_keeps_id() {
        let value = roundtrip(&offline_state(), r#"{"jsonrpc":"2.0","id":4}"#).await;
        assert_eq!(value["id"], 4);
        assert_eq!(value["error"]["code"], -32600);

        let value = roundtrip(
            &offline_state(),
            r#"{"jsonrpc":"1.0","id":5,"method":"ping"}"#,
        )
        .await;
        assert_eq!(value["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_notifications_and_blank_lines_are_silent() {
        let state = offline_state();
        assert!(state
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
        assert!(state.handle_line("   ").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let value = roundtrip(
            &offline_state(),
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"volcanoes"}}"#,
        )
        .await;
        assert_eq!(value["error"]["code"], -32602);
        assert_eq!(value["error"]["data"]["code"], 404);
        assert_eq!(value["error"]["message"], "Unknown tool: volcanoes");
    }

    #[tokio::test]
    async fn test_lat_lng_to_tile_over_router() {
        let value = roundtrip(
            &offline_state(),
            &json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {
                    "name": "lat-lng-to-tile",
                    "arguments": {"lat": 40, "lng": -105, "zoom": 10}
                }
            })
            .to_string(),
        )
        .await;
        let content = &value["result"]["content"];
        assert_eq!(content[0]["type"], "text");
        let tile: Value = serde_json::from_str(content[0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(tile["x"], 213);
        assert_eq!(tile["y"], 387);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_internal_error() {
        let value = roundtrip(
            &offline_state(),
            &json!({
                "jsonrpc": "2.0",
                "id": 6,
                "method": "tools/call",
                "params": {"name": "find-units", "arguments": {"lat": 40, "lng": -105}}
            })
            .to_string(),
        )
        .await;
        assert_eq!(value["error"]["code"], -32603);
        assert_eq!(value["error"]["data"]["code"], 502);
        assert_eq!(value["error"]["data"]["context"]["status"], Value::Null);
    }

    #[tokio::test]
    async fn test_serve_answers_each_request_until_eof() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"roots/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        offline_state()
            .serve(input.as_bytes(), &mut output)
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], 2);
        assert_eq!(lines[1]["result"]["roots"][0]["uri"], "http://127.0.0.1:9/api");
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8_frame() {
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        input.extend_from_slice(b"\n");

        let mut output = Vec::new();
        offline_state()
            .serve(input.as_slice(), &mut output)
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], Value::Null);
        assert_eq!(lines[1]["error"]["code"], -32700);
        assert_eq!(lines[2]["id"], 2);
        assert!(lines[2]["result"].is_object());
    }

    #[tokio::test]
    async fn test_final_frame_without_newline_is_answered() {
        let input = br#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#;
        let mut output = Vec::new();
        offline_state()
            .serve(&input[..], &mut output)
            .await
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.ends_with('\n'));
        let response: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(response["id"], 7);
    }
}
