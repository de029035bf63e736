//! Model Context Protocol server exposing Tableau content over stdio.
//!
//! Each `tools/call` signs in to Tableau, runs one tool against the signed-in site and signs
//! out again. Results pass through the configured bounded context before they reach the agent.

mod auth;
pub mod config;
mod error;
mod rest;
mod tools;
mod transport;
mod util;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::Subcommand;
use serde_json::{Map, Value, json};
use tableau_mcp_core::bounded::ConstrainedResult;
use tableau_mcp_core::error::codes;
use tokio::io::{self, BufReader};
use tracing::Instrument;
use uuid::Uuid;

pub use auth::Credentials;
pub use config::{AuthMethod, RuntimeConfig, TableauArgs, ToolFilter};
pub use error::{ConfigError, RestError, ToolError};
pub use rest::{ListQuery, RestClient, RestSession, SiteApi};

use error::RpcError;
use tools::{SCOPE_CONTENT_READ, ToolCall, ToolContext, ToolOutput, tool_definitions};
use transport::{read_framed_json, write_framed_json};
use util::to_pretty_json;

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "tableau-mcp";

#[derive(Subcommand, Clone, Copy, Debug)]
pub enum McpCommands {
    /// Run the Tableau MCP server over stdio
    Serve,
    /// Sign in once with the configured credentials and report the site and user
    Diagnose,
}

pub async fn run(args: TableauArgs, command: McpCommands) -> i32 {
    let config = match RuntimeConfig::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            let payload = json!({
                "error": "config_error",
                "message": err.to_string(),
            });
            eprintln!("{}", to_pretty_json(&payload));
            return 1;
        }
    };

    match command {
        McpCommands::Serve => {
            tracing::info!(config = %config.summary(), "starting tableau-mcp server");
            let server = McpServer::new(config);
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": err,
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
        McpCommands::Diagnose => {
            let server = McpServer::new(config);
            match server.diagnose().await {
                Ok(report) => {
                    println!("{}", to_pretty_json(&report));
                    0
                }
                Err(err) => {
                    eprintln!("{}", to_pretty_json(&err.to_value()));
                    1
                }
            }
        }
    }
}

struct McpServer {
    rest: RestClient,
    tools: ToolFilter,
    context: ToolContext,
}

impl McpServer {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            rest: RestClient::new(
                &config.server,
                &config.api_version,
                &config.site_name,
                config.credentials,
            ),
            tools: config.tools,
            context: ToolContext {
                bounded: config.bounded,
                max_result_limit: config.max_result_limit,
            },
        }
    }

    async fn serve_stdio(&self) -> Result<(), String> {
        let mut reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();

        loop {
            let incoming = read_framed_json(&mut reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some((incoming, framing)) = incoming else {
                tracing::info!("stdin closed, shutting down");
                break;
            };

            let responses = self.handle_incoming_message(incoming).await;
            for response in responses {
                write_framed_json(&mut stdout, &response, framing)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }

        Ok(())
    }

    async fn diagnose(&self) -> Result<Value, ToolError> {
        let session = self.rest.sign_in(&[SCOPE_CONTENT_READ]).await?;
        let report = json!({
            "status": "ready",
            "server": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "api_base": self.rest.api_base(),
            "site_id": session.site_id(),
            "user_id": session.user_id(),
            "tools": tool_definitions()
                .iter()
                .filter(|tool| self.tools.allows(tool.name))
                .map(|tool| tool.name)
                .collect::<Vec<_>>(),
        });
        if let Err(err) = session.sign_out().await {
            tracing::warn!(error = %err, "sign-out failed");
        }
        Ok(report)
    }

    async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A response to something we never sent.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            tracing::debug!(method, "notification ignored");
            None
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                },
                "resources": {
                    "listChanged": false
                },
                "prompts": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Read-only access to Tableau content for the signed-in user. Use the list-* tools to find workbooks, views, datasources, favorites and custom views, then fetch data (CSV) or images (PNG) by id. Content outside this server's configured projects, workbooks and datasources is never returned."
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = tool_definitions()
            .iter()
            .filter(|tool| self.tools.allows(tool.name))
            .map(|tool| tool.to_value())
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let span = tracing::info_span!("tool_call", tool = %name, request_id = %Uuid::now_v7());
        Ok(self.call_tool(name, &args).instrument(span).await)
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Value {
        if tools::tool_names().contains(&name) && !self.tools.allows(name) {
            let err = ToolError::new(
                codes::TOOL_DISABLED,
                format!("Tool '{name}' is disabled on this server"),
            )
            .with_field("name")
            .with_docs_hint("See INCLUDE_TOOLS / EXCLUDE_TOOLS in the server configuration.");
            return tool_error_response(name, &err);
        }

        let call = match ToolCall::parse(name, args) {
            Ok(call) => call,
            Err(err) => {
                tracing::info!(error = %err.code, "tool call rejected");
                return tool_error_response(name, &err);
            }
        };

        tracing::info!("tool call started");
        match self.invoke(&call).await {
            Ok(output) => tool_output_response(name, output),
            Err(err) => {
                tracing::warn!(error = %err.code, message = %err.message, "tool call failed");
                tool_error_response(name, &err)
            }
        }
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let session = self.rest.sign_in(call.scopes()).await?;
        let result = tools::execute(call, &session, &self.context).await;
        if let Err(err) = session.sign_out().await {
            tracing::warn!(error = %err, "sign-out failed");
        }
        result
    }
}

fn build_tool_call_response(envelope: &Value, text: String, is_error: bool) -> Value {
    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

fn tool_error_response(tool: &str, err: &ToolError) -> Value {
    let envelope = json!({
        "status": "error",
        "tool": tool,
        "error": err.to_value()
    });
    build_tool_call_response(&envelope, to_pretty_json(&envelope), true)
}

fn tool_output_response(tool: &str, output: ToolOutput) -> Value {
    match output {
        ToolOutput::Constrained(ConstrainedResult::Success(data)) | ToolOutput::Item(data) => {
            if let Some(items) = data.as_array() {
                tracing::info!(outcome = "success", items = items.len(), "tool call finished");
            } else {
                tracing::info!(outcome = "success", "tool call finished");
            }
            let envelope = json!({
                "status": "success",
                "tool": tool,
                "data": data
            });
            build_tool_call_response(&envelope, to_pretty_json(&envelope), false)
        }
        ToolOutput::Constrained(empty) => {
            tracing::info!(outcome = "empty", "tool call finished");
            let text = empty.empty_message().unwrap_or_default().to_string();
            let envelope = json!({
                "status": "empty",
                "tool": tool,
                "data": empty.to_value()
            });
            build_tool_call_response(&envelope, text, false)
        }
        ToolOutput::Csv(csv) => {
            tracing::info!(outcome = "success", bytes = csv.len(), "tool call finished");
            json!({
                "content": [{ "type": "text", "text": csv }]
            })
        }
        ToolOutput::Png(bytes) => {
            tracing::info!(outcome = "success", bytes = bytes.len(), "tool call finished");
            json!({
                "content": [{
                    "type": "image",
                    "data": BASE64.encode(&bytes),
                    "mimeType": "image/png"
                }]
            })
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> TableauArgs {
        TableauArgs {
            server: Some("http://127.0.0.1:9".to_string()),
            api_version: "3.24".to_string(),
            pat_name: Some("mcp".to_string()),
            pat_value: Some("secret".to_string()),
            ..TableauArgs::default()
        }
    }

    fn server_with(args: TableauArgs) -> McpServer {
        McpServer::new(RuntimeConfig::from_args(args).unwrap())
    }

    fn server() -> McpServer {
        server_with(args())
    }

    fn request(id: u64, method: &str, params: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
    }

    async fn call(server: &McpServer, name: &str, arguments: Value) -> Value {
        let response = server
            .handle_single_message(request(
                1,
                "tools/call",
                json!({ "name": name, "arguments": arguments }),
            ))
            .await
            .unwrap();
        response["result"].clone()
    }

    #[tokio::test]
    async fn initialize_advertises_tools_capability() {
        let response = server()
            .handle_single_message(request(1, "initialize", json!({})))
            .await
            .unwrap();
        assert_eq!(response["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], "tableau-mcp");
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn tools_list_honours_exclusions() {
        let mut args = args();
        args.exclude_tools = Some("get-view-image,get-custom-view-image".to_string());
        let response = server_with(args)
            .handle_single_message(request(2, "tools/list", Value::Null))
            .await
            .unwrap();
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 12);
        assert!(!names.contains(&"get-view-image"));
        assert!(names.contains(&"list-custom-views"));
    }

    #[tokio::test]
    async fn protocol_errors() {
        let server = server();

        let unknown = server
            .handle_single_message(request(3, "sampling/createMessage", json!({})))
            .await
            .unwrap();
        assert_eq!(unknown["error"]["code"], -32601);

        let wrong_version = server
            .handle_single_message(json!({ "jsonrpc": "1.0", "id": 4, "method": "ping" }))
            .await
            .unwrap();
        assert_eq!(wrong_version["error"]["code"], -32600);
        assert_eq!(wrong_version["id"], 4);

        let bad_params = server
            .handle_single_message(request(5, "tools/call", json!({ "arguments": {} })))
            .await
            .unwrap();
        assert_eq!(bad_params["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn notifications_and_empty_batches() {
        let server = server();
        let note = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        assert!(server.handle_single_message(note).await.is_none());

        let responses = server.handle_incoming_message(json!([])).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32600);

        let batch = json!([
            request(6, "ping", Value::Null),
            { "jsonrpc": "2.0", "method": "notifications/cancelled" },
            request(7, "prompts/list", Value::Null)
        ]);
        let responses = server.handle_incoming_message(batch).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1]["result"]["prompts"], json!([]));
    }

    #[tokio::test]
    async fn validation_errors_never_reach_the_network() {
        let result = call(&server(), "get-custom-view-data", json!({ "maxAge": 5 })).await;
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["status"], "error");
        assert_eq!(
            result["structuredContent"]["error"]["error"],
            codes::VALIDATION_FAILED
        );
        assert_eq!(result["structuredContent"]["error"]["field"], "customViewId");
    }

    #[tokio::test]
    async fn unknown_and_disabled_tools() {
        let result = call(&server(), "delete-workbook", json!({})).await;
        assert_eq!(
            result["structuredContent"]["error"]["error"],
            codes::UNKNOWN_TOOL
        );

        let mut args = args();
        args.include_tools = Some("list-workbooks".to_string());
        let result = call(&server_with(args), "list-views", json!({})).await;
        assert_eq!(result["isError"], true);
        assert_eq!(
            result["structuredContent"]["error"]["error"],
            codes::TOOL_DISABLED
        );
    }

    #[tokio::test]
    async fn failed_rest_call_surfaces_as_tool_error() {
        let mut site = tools::fake::FakeSite::new("u1");
        site.offline = true;
        let server = server();
        let call = ToolCall::parse("list-workbooks", &Map::new()).unwrap();
        let err = tools::execute(&call, &site, &server.context)
            .await
            .err()
            .unwrap();

        let result = tool_error_response("list-workbooks", &err);
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["status"], "error");
        assert_eq!(result["structuredContent"]["tool"], "list-workbooks");
        assert_eq!(
            result["structuredContent"]["error"]["error"],
            codes::REST_ERROR
        );
    }

    #[test]
    fn empty_results_are_text_not_errors() {
        let output = ToolOutput::Constrained(ConstrainedResult::FilteredEmpty {
            message: "all filtered".to_string(),
        });
        let response = tool_output_response("list-workbooks", output);
        assert!(response.get("isError").is_none());
        assert_eq!(response["content"][0]["text"], "all filtered");
        assert_eq!(response["structuredContent"]["data"]["reason"], "filtered");
    }

    #[test]
    fn success_inlines_the_envelope() {
        let output = ToolOutput::Constrained(ConstrainedResult::Success(json!([{ "id": "w1" }])));
        let response = tool_output_response("list-workbooks", output);
        let text = response["content"][0]["text"].as_str().unwrap();
        let inlined: Value = serde_json::from_str(text).unwrap();
        assert_eq!(inlined["data"][0]["id"], "w1");
        assert_eq!(response["structuredContent"]["status"], "success");
    }

    #[test]
    fn images_are_base64_png_blocks() {
        let response = tool_output_response("get-view-image", ToolOutput::Png(vec![1, 2, 3]));
        let block = &response["content"][0];
        assert_eq!(block["type"], "image");
        assert_eq!(block["mimeType"], "image/png");
        assert_eq!(block["data"], "AQID");
    }

    #[test]
    fn csv_is_returned_as_text() {
        let response = tool_output_response("get-view-data", ToolOutput::Csv("a,b\n1,2\n".into()));
        assert_eq!(response["content"][0]["type"], "text");
        assert_eq!(response["content"][0]["text"], "a,b\n1,2\n");
    }
}
