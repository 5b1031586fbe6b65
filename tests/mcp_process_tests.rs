// MCP process tests - JSON-RPC session against a scripted stdio server
//
// The server is a small POSIX shell script that answers requests by matching
// on the compact JSON the client writes, one message per line.
#![cfg(unix)]

use lastmile_agent::config::ServerConfig;
use lastmile_agent::tooling::{
    McpProcess, ResourceContents, ToolContent, ToolInvokeError, ToolServerInterface,
};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio::time::timeout;

const STUB_SERVER: &str = r##"
echo "lastmile stub server ready"
generation=1
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"protocolVersion":"2025-06-18","capabilities":{"tools":{"listChanged":true}},"serverInfo":{"name":"lastmile-stub","version":"0.1.0"},"instructions":"Check merchant load before rerouting."}}\n' "$id"
      ;;
    *'"method":"tools/list"'*)
      if [ "$generation" = 2 ]; then
        printf '{"jsonrpc":"2.0","id":"%s","result":{"tools":[{"name":"notify_customer"}]}}\n' "$id"
      else
        case "$line" in
          *'"cursor":"page-2"'*)
            printf '{"jsonrpc":"2.0","id":"%s","result":{"tools":[{"name":"get_merchant_status","description":"Current merchant load"}],"nextCursor":"page-2"}}\n' "$id"
            ;;
          *)
            printf '{"jsonrpc":"2.0","id":"%s","result":{"tools":[{"name":"lookup_order"}],"nextCursor":"page-2"}}\n' "$id"
            ;;
        esac
      fi
      ;;
    *'"method":"resources/list"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"resources":[{"uri":"incidents://open","name":"Open incidents","mimeType":"application/json"}]}}\n' "$id"
      ;;
    *'"method":"resources/read"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"contents":[{"uri":"incidents://open","mimeType":"text/plain","text":"order 42 late"}]}}\n' "$id"
      ;;
    *'"method":"tools/call"'*)
      case "$line" in
        *'"name":"ping_me"'*)
          printf '{"jsonrpc":"2.0","id":"srv-1","method":"ping"}\n'
          IFS= read -r pong
          printf '{"jsonrpc":"2.0","id":"srv-2","method":"sampling/createMessage","params":{}}\n'
          IFS= read -r refusal
          ping=missing
          unknown=missing
          case "$pong" in *'"result":{}'*) ping=ok ;; esac
          case "$refusal" in *'-32601'*) unknown=ok ;; esac
          printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"ping=%s unknown=%s"}]}}\n' "$id" "$ping" "$unknown"
          ;;
        *'"name":"refresh"'*)
          generation=2
          printf '{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}\n'
          printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"refreshed"}]}}\n' "$id"
          ;;
        *'"name":"crash"'*)
          exit 0
          ;;
        *'"name":"lookup_order"'*)
          printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"order 42 is 20 minutes late"}]}}\n' "$id"
          ;;
        *)
          printf '{"jsonrpc":"2.0","id":"%s","error":{"code":-32602,"message":"Unknown tool"}}\n' "$id"
          ;;
      esac
      ;;
  esac
done
"##;

const LIMIT: Duration = Duration::from_secs(10);

async fn connect_stub() -> (TempDir, McpProcess) {
    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("server.sh");
    fs::write(&script, STUB_SERVER).expect("write server script");

    let config = ServerConfig {
        name: "lastMile".into(),
        command: PathBuf::from("sh"),
        args: vec![script.to_string_lossy().into_owned()],
        env: HashMap::new(),
        workdir: None,
    };
    let process = timeout(LIMIT, McpProcess::connect(config))
        .await
        .expect("handshake in time")
        .expect("connects");
    (dir, process)
}

fn text_of(content: &[ToolContent]) -> String {
    content
        .iter()
        .filter_map(|item| match item {
            ToolContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn handshake_keeps_server_instructions() {
    let (_dir, process) = connect_stub().await;

    assert_eq!(process.server_name(), "lastMile");
    assert_eq!(
        process.instructions().await.as_deref(),
        Some("Check merchant load before rerouting.")
    );
    process.shutdown().await;
}

#[tokio::test]
async fn tool_pages_are_joined_and_repeated_cursor_stops() {
    let (_dir, process) = connect_stub().await;

    let tools = timeout(LIMIT, process.list_tools())
        .await
        .expect("listing finishes")
        .expect("tools listed");
    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["lookup_order", "get_merchant_status"]);
    assert_eq!(tools[1].description_or_default(), "Current merchant load");
    assert_eq!(tools[0].input_schema, json!({"type": "object", "properties": {}}));

    process.shutdown().await;
}

#[tokio::test]
async fn list_changed_notification_refreshes_tools() {
    let (_dir, process) = connect_stub().await;

    let before = process.list_tools().await.expect("tools listed");
    assert_eq!(before.len(), 2);

    let refreshed = timeout(LIMIT, process.call_tool("refresh", json!({})))
        .await
        .expect("call finishes")
        .expect("call succeeds");
    assert_eq!(text_of(&refreshed.content), "refreshed");

    let after = process.list_tools().await.expect("tools listed again");
    let names: Vec<&str> = after.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["notify_customer"]);

    process.shutdown().await;
}

#[tokio::test]
async fn server_requests_get_ping_and_method_not_found_replies() {
    let (_dir, process) = connect_stub().await;

    let result = timeout(LIMIT, process.call_tool("ping_me", json!(null)))
        .await
        .expect("call finishes")
        .expect("call succeeds");
    assert_eq!(text_of(&result.content), "ping=ok unknown=ok");

    process.shutdown().await;
}

#[tokio::test]
async fn resources_are_listed_and_read() {
    let (_dir, process) = connect_stub().await;

    let resources = process.list_resources().await.expect("resources listed");
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].uri, "incidents://open");
    assert_eq!(resources[0].mime_type.as_deref(), Some("application/json"));

    let contents = process
        .read_resource("incidents://open")
        .await
        .expect("resource read");
    assert_eq!(
        contents,
        vec![ResourceContents::Text {
            uri: "incidents://open".into(),
            mime_type: Some("text/plain".into()),
            text: "order 42 late".into(),
        }]
    );

    process.shutdown().await;
}

#[tokio::test]
async fn tool_results_and_rejections() {
    let (_dir, process) = connect_stub().await;

    let result = process
        .call_tool("lookup_order", json!({"order": 42}))
        .await
        .expect("call succeeds");
    assert!(!result.is_error);
    assert_eq!(result.render(), "order 42 is 20 minutes late");

    let err = process
        .call_tool("cancel_everything", json!({}))
        .await
        .expect_err("server rejects unknown tool");
    assert!(matches!(err, ToolInvokeError::Rpc { code: -32602, .. }));
    assert!(err.is_server_rejection());

    process.shutdown().await;
}

#[tokio::test]
async fn server_exit_fails_the_request_in_flight() {
    let (_dir, process) = connect_stub().await;

    let err = timeout(LIMIT, process.call_tool("crash", json!({})))
        .await
        .expect("call finishes")
        .expect_err("server exited");
    assert!(matches!(err, ToolInvokeError::Terminated { .. }));
    assert!(!err.is_server_rejection());

    process.shutdown().await;
}

#[tokio::test]
async fn requests_after_shutdown_fail() {
    let (_dir, process) = connect_stub().await;
    process.shutdown().await;

    let err = process
        .list_resources()
        .await
        .expect_err("session closed");
    assert!(matches!(err, ToolInvokeError::Terminated { .. }));
}
