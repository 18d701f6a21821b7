//! End-to-end flows through the public API: handler, store and router.

use std::sync::Arc;

use agent_tools::output::{byte_threshold, OutputClassifier};
use agent_tools::{
    extract_actual_content, LargeOutputRouter, OutputDisposition, OutputError, SessionOutputStore,
    ToolOutputHandler,
};
use agent_core::tools::ToolError;
use serde_json::json;
use tempfile::tempdir;

/// A JSON document of exactly `len` characters.
fn json_payload(len: usize) -> String {
    let wrapper = r#"{"data":""}"#.len();
    format!(r#"{{"data":"{}"}}"#, "a".repeat(len - wrapper))
}

fn handler_with_threshold(root: &std::path::Path, threshold: u32) -> ToolOutputHandler {
    let store = Arc::new(SessionOutputStore::new(root, "flow"));
    store.set_threshold(threshold);
    ToolOutputHandler::new(store, OutputClassifier::default())
}

#[tokio::test]
async fn large_json_is_stored_under_tool_name() {
    let dir = tempdir().unwrap();
    // 250 tokens is a 1000 byte budget when no model is known
    let handler = handler_with_threshold(dir.path(), 250);
    assert_eq!(byte_threshold(250), 1000);

    let payload = json_payload(2000);
    assert_eq!(payload.chars().count(), 2000);

    let disposition = handler.process("test_large_tool", &payload, None).await.unwrap();
    let OutputDisposition::Offloaded { stored, .. } = disposition else {
        panic!("2000 characters should exceed a 1000 byte budget");
    };

    let name = stored.reference.as_str();
    assert!(name.starts_with("tool_"), "{name}");
    assert!(name.ends_with("_test_large_tool.json"), "{name}");
    // tool_YYYYMMDD_HHMMSS_
    assert!(name[5..20].chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));

    let content = handler.store().read(name).await.unwrap();
    assert_eq!(content.chars().count(), 2000);
    assert_eq!(content, payload);
}

#[tokio::test]
async fn payload_below_threshold_creates_no_file() {
    let dir = tempdir().unwrap();
    let handler = handler_with_threshold(dir.path(), 250);

    for payload in [String::new(), "tiny".to_string(), json_payload(999)] {
        let disposition = handler.process("small", &payload, None).await.unwrap();
        assert!(!disposition.is_offloaded());
    }
    assert!(handler.store().list().await.unwrap().is_empty());
    assert!(!handler.store().session_dir().exists());
}

#[tokio::test]
async fn search_finds_each_line_once() {
    let dir = tempdir().unwrap();
    let handler = handler_with_threshold(dir.path(), 1);
    let content = (1..=5)
        .map(|i| format!("This is Line {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let stored = handler.store().write(&content, "lines").await.unwrap();

    let output = handler
        .router()
        .dispatch(
            "search_large_output",
            json!({
                "filename": stored.reference.as_str(),
                "pattern": "line",
                "case_sensitive": false,
                "max_results": 10
            }),
        )
        .await
        .unwrap()
        .result;

    assert!(output.starts_with("Found 5 match(es)"), "{output}");
    assert!(output.contains("5. line 5"), "{output}");
    assert!(!output.contains("6. "), "{output}");
}

#[tokio::test]
async fn raw_query_returns_unquoted_string() {
    let dir = tempdir().unwrap();
    let handler = handler_with_threshold(dir.path(), 1);
    let stored = handler
        .store()
        .write(r#"{"items":[{"value":"test1"},{"value":"test2"}]}"#, "items")
        .await
        .unwrap();

    let output = handler
        .router()
        .dispatch(
            "query_large_output",
            json!({"filename": stored.reference.as_str(), "query": ".items[0].value", "raw": true}),
        )
        .await
        .unwrap()
        .result;
    assert_eq!(output, "test1");
}

#[tokio::test]
async fn read_clamps_and_returns_empty_past_end() {
    let dir = tempdir().unwrap();
    let handler = handler_with_threshold(dir.path(), 1);
    let stored = handler.store().write("0123456789", "digits").await.unwrap();
    let router = handler.router();
    let name = stored.reference.as_str();

    let head = router
        .dispatch("read_large_output", json!({"filename": name, "start": 1, "end": 4}))
        .await
        .unwrap()
        .result;
    assert_eq!(head, "0123");

    let clamped = router
        .dispatch("read_large_output", json!({"filename": name, "start": 1, "end": 500}))
        .await
        .unwrap()
        .result;
    assert_eq!(clamped, "0123456789");

    let past_end = router
        .dispatch("read_large_output", json!({"filename": name, "start": 11, "end": 20}))
        .await
        .unwrap()
        .result;
    assert_eq!(past_end, "");
}

#[tokio::test]
async fn disabling_virtual_tools_blocks_known_files() {
    let dir = tempdir().unwrap();
    let handler = handler_with_threshold(dir.path(), 1);
    let stored = handler.store().write("{\"ok\":true}", "status").await.unwrap();
    let name = stored.reference.as_str();

    handler.set_virtual_tools_enabled(false);
    let router = handler.router();
    assert!(router.list_tools().is_empty());

    let calls = [
        ("read_large_output", json!({"filename": name, "start": 1, "end": 5})),
        ("search_large_output", json!({"filename": name, "pattern": "ok"})),
        ("query_large_output", json!({"filename": name, "query": ".ok"})),
    ];
    for (tool, args) in calls {
        let error = router.dispatch(tool, args).await.unwrap_err();
        assert!(matches!(error, ToolError::FeatureDisabled(_)), "{tool}");
    }
}

#[tokio::test]
async fn routers_with_different_flags_coexist() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SessionOutputStore::new(dir.path(), "flags"));
    let on = LargeOutputRouter::new(Arc::clone(&store), true);
    let off = LargeOutputRouter::new(store, false);

    assert_eq!(on.list_tools().len(), 3);
    assert!(off.list_tools().is_empty());
}

#[tokio::test]
async fn traversal_rejected_even_when_target_exists() {
    let dir = tempdir().unwrap();
    let handler = handler_with_threshold(dir.path(), 1);
    std::fs::write(dir.path().join("secret.json"), "{}").unwrap();
    let store = handler.store();

    for name in ["../secret.json", "flow/../../secret.json", "..\\secret.json"] {
        assert_eq!(
            store.resolve(name),
            Err(OutputError::InvalidReference(name.to_string()))
        );
    }
}

#[test]
fn text_envelope_is_unescaped_once() {
    let wrapped = r#"{"type":"text","text":"{\"key\": \"value\"}"}"#;
    assert_eq!(extract_actual_content(wrapped), r#"{"key": "value"}"#);
}
