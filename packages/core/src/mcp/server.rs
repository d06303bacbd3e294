//! MCP stdio Server
//!
//! Async Tokio task that handles JSON-RPC 2.0 requests over stdin/stdout.
//! One request per line; one response line per request. Notifications get
//! no response.

use crate::mcp::handlers::{initialize, tools};
use crate::mcp::types::{MCPError, MCPNotification, MCPRequest, MCPResponse};
use crate::services::BlueprintService;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, error, info, instrument, warn};

/// Callback type for handling successful responses
///
/// Receives (method_name, result_value) after successful operation execution.
pub type ResponseCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Run the MCP stdio server
///
/// Runs until EOF on stdin.
#[instrument(skip(service))]
pub async fn run_mcp_server(service: Arc<BlueprintService>) -> anyhow::Result<()> {
    run_mcp_server_with_callback(service, None).await
}

/// Run the MCP stdio server with an optional response callback
#[instrument(skip(service, callback))]
pub async fn run_mcp_server_with_callback(
    service: Arc<BlueprintService>,
    callback: Option<ResponseCallback>,
) -> anyhow::Result<()> {
    info!("🔌 MCP stdio server started");

    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    serve(service, reader, writer, callback).await?;

    info!("🔌 MCP stdio server stopped (stdin closed)");
    Ok(())
}

/// Serve newline-delimited JSON-RPC from `reader` to `writer` until EOF
pub async fn serve<R, W>(
    service: Arc<BlueprintService>,
    reader: R,
    mut writer: W,
    callback: Option<ResponseCallback>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("📥 MCP request: {}", line);

        let request: MCPRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                if let Ok(notification) = serde_json::from_str::<MCPNotification>(&line) {
                    debug!("🔔 MCP notification: {}", notification.method);
                    continue;
                }
                warn!("❌ Failed to parse JSON-RPC request: {}", e);
                let error_response = MCPResponse::error(
                    0, // Unknown ID since parsing failed
                    MCPError::parse_error(format!("Invalid JSON: {}", e)),
                );
                write_response(&mut writer, &error_response).await?;
                continue;
            }
        };

        let request_id = request.id;
        let method = request.method.clone();

        let response = handle_request(&service, request).await;

        if let Some(ref callback) = callback {
            if let Some(ref result) = response.result {
                callback(&method, result);
            }
        }

        debug!(
            "📤 MCP response for method '{}' (id={})",
            method, request_id
        );
        write_response(&mut writer, &response).await?;
    }

    Ok(())
}

/// Handle a JSON-RPC request and return a response
#[instrument(skip(service, request), fields(method = %request.method, id = %request.id))]
pub async fn handle_request(service: &Arc<BlueprintService>, request: MCPRequest) -> MCPResponse {
    let result = match request.method.as_str() {
        "initialize" => initialize::handle_initialize(request.params),
        "ping" => Ok(serde_json::json!({})),
        "tools/list" => tools::handle_tools_list(request.params),
        "tools/call" => tools::handle_tools_call(service, request.params).await,
        method if tools::is_tool(method) => tools::call_tool(service, method, request.params).await,
        _ => {
            warn!("⚠️  Unknown MCP method: {}", request.method);
            Err(MCPError::method_not_found(&request.method))
        }
    };

    match result {
        Ok(result) => {
            debug!("✅ MCP request {} succeeded", request.id);
            MCPResponse::success(request.id, result)
        }
        Err(error) => {
            error!(
                "❌ MCP request {} failed: {} (code: {})",
                request.id, error.message, error.code
            );
            MCPResponse::error(request.id, error)
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &MCPResponse) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::services::ServiceConfig;
    use crate::mcp::types::{METHOD_NOT_FOUND, PARSE_ERROR};

    fn service() -> Arc<BlueprintService> {
        Arc::new(
            BlueprintService::new(Arc::new(MemoryStore::new()), ServiceConfig::default())
                .unwrap(),
        )
    }

    async fn run_lines(input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve(service(), input.as_bytes(), &mut output, None)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_response_per_request() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"create_blueprint","params":{"name":"Step 1"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"list_blueprints"}"#,
            "\n",
        );

        let responses = run_lines(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["name"], "Step 1");
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"]["count"], 1);
    }

    #[tokio::test]
    async fn test_parse_errors_and_unknown_methods() {
        let input = concat!(
            "not json\n",
            r#"{"jsonrpc":"2.0","id":7,"method":"teleport_edge","params":{}}"#,
            "\n",
        );

        let responses = run_lines(input).await;
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[1]["id"], 7);
        assert_eq!(responses[1]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_callback_sees_successful_results() {
        use std::sync::Mutex;

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ResponseCallback = Arc::new(move |method, _| {
            sink.lock().unwrap().push(method.to_string());
        });

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"list_blueprints"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"get_blueprint_edges","params":{"blueprint_id":"nope"}}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve(service(), input.as_bytes(), &mut output, Some(callback))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["list_blueprints".to_string()]);
    }
}
