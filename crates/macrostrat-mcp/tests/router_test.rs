//! Router tests against a local mock of the Macrostrat API
//!
//! These go through `McpServerState::handle_line`, so they exercise the same
//! path as the stdio loop without spawning the binary.

use macrostrat_lib::test_utils::{MockUpstream, PNG_BYTES};
use macrostrat_mcp::McpServerState;
use serde_json::{json, Value};

async fn call(state: &McpServerState, method: &str, params: Value) -> Value {
    let line = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}).to_string();
    let response = state.handle_line(&line).await.expect("response");
    serde_json::to_value(response).unwrap()
}

fn prompt_text(response: &Value) -> &str {
    response["result"]["messages"][0]["content"]["text"]
        .as_str()
        .expect("prompt text")
}

#[tokio::test]
async fn test_find_columns_returns_data() {
    let mock = MockUpstream::start();
    let state = McpServerState::with_config(mock.config()).unwrap();

    let response = call(
        &state,
        "tools/call",
        json!({"name": "find-columns", "arguments": {"lat": 40.01, "lng": -105.27}}),
    )
    .await;

    assert_eq!(
        mock.requests(),
        vec!["/api/columns?lat=40.01&lng=-105.27&adjacents=false&response=long"]
    );
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    let data: Value = serde_json::from_str(text).unwrap();
    assert_eq!(data[0]["col_name"], "Boulder");
}

#[tokio::test]
async fn test_upstream_failure_reaches_caller() {
    let mock = MockUpstream::start_failing();
    let state = McpServerState::with_config(mock.config()).unwrap();

    let response = call(
        &state,
        "tools/call",
        json!({"name": "find-columns", "arguments": {"lat": 40.0, "lng": -105.0}}),
    )
    .await;

    assert_eq!(response["error"]["code"], -32603);
    assert_eq!(response["error"]["data"]["context"]["status"], 503);
    assert_eq!(
        response["error"]["data"]["context"]["status_text"],
        "Service Unavailable"
    );
}

#[tokio::test]
async fn test_map_tiles_embeds_image() {
    let mock = MockUpstream::start();
    let state = McpServerState::with_config(mock.config()).unwrap();

    let response = call(
        &state,
        "tools/call",
        json!({
            "name": "map-tiles",
            "arguments": {"z": 10, "x": 213, "y": 387, "fetch_image": true}
        }),
    )
    .await;

    assert_eq!(mock.requests(), vec!["/tiles/carto/10/213/387.png"]);
    let content = response["result"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content[1]["type"], "image");
    assert_eq!(content[1]["mimeType"], "image/png");
    let data = content[1]["data"].as_str().unwrap();
    assert_eq!(data.len(), (PNG_BYTES.len() + 2) / 3 * 4);
}

#[tokio::test]
async fn test_bedrock_prompt_appends_map_unit_digest() {
    let mock = MockUpstream::start();
    let state = McpServerState::with_config(mock.config()).unwrap();

    let response = call(
        &state,
        "prompts/get",
        json!({
            "name": "bedrock",
            "arguments": {"location": "Boulder, CO", "lat": "40", "lng": "-105.3"}
        }),
    )
    .await;

    assert_eq!(
        mock.requests(),
        vec!["/api/geologic_units/map?lat=40&lng=-105.3&response=long"]
    );
    let text = prompt_text(&response);
    assert!(text.contains("Boulder, CO"));
    assert!(text.contains("2 unit(s) returned."));
    assert!(text.contains("**Dakota Group**"));
    assert!(text.contains("youngest base 113 Ma, oldest top 100.5 Ma"));
}

#[tokio::test]
async fn test_geologic_history_with_age_uses_units_endpoint() {
    let mock = MockUpstream::start();
    let state = McpServerState::with_config(mock.config()).unwrap();

    let response = call(
        &state,
        "prompts/get",
        json!({
            "name": "geologic-history",
            "arguments": {"location": "Denver", "lat": "40", "lng": "-105", "age": "70"}
        }),
    )
    .await;

    assert_eq!(
        mock.requests(),
        vec!["/api/units?lat=40&lng=-105&response=long&age=70"]
    );
    let text = prompt_text(&response);
    assert!(text.contains("around 70 Ma"));
    assert!(text.contains("**Pierre Shale**"));
}

#[tokio::test]
async fn test_prompt_fetch_failure_still_renders() {
    let mock = MockUpstream::start_failing();
    let state = McpServerState::with_config(mock.config()).unwrap();

    let response = call(
        &state,
        "prompts/get",
        json!({
            "name": "bedrock",
            "arguments": {"location": "Boulder", "lat": "40", "lng": "-105"}
        }),
    )
    .await;

    assert!(response.get("error").is_none());
    let text = prompt_text(&response);
    assert!(text.contains("I'm sorry"));
    assert!(text.contains("503 Service Unavailable"));
}

#[tokio::test]
async fn test_roots_point_at_configured_upstream() {
    let mock = MockUpstream::start();
    let state = McpServerState::with_config(mock.config()).unwrap();

    let response = call(&state, "roots/list", json!({})).await;
    let roots = response["result"]["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 6);
    assert!(roots[1]["uri"].as_str().unwrap().ends_with("/api/geologic_units/map"));
    assert!(mock.requests().is_empty());
}
