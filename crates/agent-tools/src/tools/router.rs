use std::sync::Arc;

use agent_core::tools::{
    parse_tool_args, Tool, ToolCall, ToolError, ToolExecutor, ToolRegistry, ToolResult, ToolSchema,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::output::{OutputError, SessionOutputStore};

use super::{QueryLargeOutputTool, ReadLargeOutputTool, SearchLargeOutputTool};

/// The fixed set of virtual tools over stored outputs, in advertised order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LargeOutputTool {
    Read,
    Search,
    Query,
}

impl LargeOutputTool {
    pub const ALL: [LargeOutputTool; 3] = [
        LargeOutputTool::Read,
        LargeOutputTool::Search,
        LargeOutputTool::Query,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LargeOutputTool::Read => ReadLargeOutputTool::NAME,
            LargeOutputTool::Search => SearchLargeOutputTool::NAME,
            LargeOutputTool::Query => QueryLargeOutputTool::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Build the tool implementation bound to `store`.
    pub fn build(self, store: Arc<SessionOutputStore>) -> Arc<dyn Tool> {
        match self {
            LargeOutputTool::Read => Arc::new(ReadLargeOutputTool::new(store)),
            LargeOutputTool::Search => Arc::new(SearchLargeOutputTool::new(store)),
            LargeOutputTool::Query => Arc::new(QueryLargeOutputTool::new(store)),
        }
    }
}

/// Whether `name` is one of the virtual tools, regardless of the flag.
pub fn is_large_output_tool(name: &str) -> bool {
    LargeOutputTool::from_name(name).is_some()
}

/// Dispatches virtual tool calls to the session store.
///
/// The enabled flag is captured at construction so advertisement and
/// dispatch always agree for the lifetime of one router.
pub struct LargeOutputRouter {
    store: Arc<SessionOutputStore>,
    registry: ToolRegistry,
    enabled: bool,
}

impl LargeOutputRouter {
    pub fn new(store: Arc<SessionOutputStore>, enabled: bool) -> Self {
        let registry = ToolRegistry::new();
        for tool in LargeOutputTool::ALL {
            // Names in ALL are distinct and non-empty
            let _ = registry.register_shared(tool.build(Arc::clone(&store)));
        }

        Self {
            store,
            registry,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store(&self) -> &Arc<SessionOutputStore> {
        &self.store
    }

    /// Schemas to advertise; empty when the feature is off.
    pub fn list_tools(&self) -> Vec<ToolSchema> {
        if !self.enabled {
            return Vec::new();
        }
        LargeOutputTool::ALL
            .into_iter()
            .filter_map(|tool| self.registry.get(tool.name()))
            .map(|tool| tool.to_schema())
            .collect()
    }

    pub async fn dispatch(&self, name: &str, args: Value) -> Result<ToolResult, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| OutputError::UnknownTool(name.to_string()))?;
        if !self.enabled {
            return Err(OutputError::FeatureDisabled.into());
        }

        log::debug!("Dispatching virtual tool {name}");
        tool.execute(args).await
    }
}

#[async_trait]
impl ToolExecutor for LargeOutputRouter {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let args = parse_tool_args(&call.function.arguments)?;
        self.dispatch(&call.function.name, args).await
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        LargeOutputRouter::list_tools(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tempfile::tempdir;

    fn router(enabled: bool) -> (tempfile::TempDir, LargeOutputRouter) {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionOutputStore::new(dir.path(), "session"));
        (dir, LargeOutputRouter::new(store, enabled))
    }

    #[test]
    fn catalog_names_round_trip() {
        for tool in LargeOutputTool::ALL {
            assert_eq!(LargeOutputTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(LargeOutputTool::from_name("read_file"), None);
    }

    #[test]
    fn built_tools_report_catalog_names() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionOutputStore::new(dir.path(), "session"));
        for tool in LargeOutputTool::ALL {
            assert_eq!(tool.build(Arc::clone(&store)).name(), tool.name());
        }
    }

    #[test]
    fn advertises_all_three_when_enabled() {
        let (_dir, router) = router(true);
        let names: Vec<String> = router
            .list_tools()
            .into_iter()
            .map(|schema| schema.function.name)
            .collect();
        assert_eq!(
            names,
            vec!["read_large_output", "search_large_output", "query_large_output"]
        );
    }

    #[test]
    fn advertises_nothing_when_disabled() {
        let (_dir, router) = router(false);
        assert!(router.list_tools().is_empty());
    }

    #[tokio::test]
    async fn disabled_router_rejects_dispatch() {
        let (_dir, router) = router(false);
        let error = router
            .dispatch("read_large_output", json!({"filename": "x", "start": 1, "end": 2}))
            .await
            .unwrap_err();
        assert_eq!(error, ToolError::from(OutputError::FeatureDisabled));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let (_dir, router) = router(true);
        let error = router.dispatch("delete_output", json!({})).await.unwrap_err();
        assert_eq!(
            error,
            ToolError::from(OutputError::UnknownTool("delete_output".to_string()))
        );
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_io() {
        let (_dir, router) = router(true);
        let error = router
            .dispatch(
                "read_large_output",
                json!({"filename": "../../etc/passwd", "start": 1, "end": 10}),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, ToolError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn executes_as_tool_executor() {
        let (_dir, router) = router(true);
        let stored = router.store().write("hello world", "greeting").await.unwrap();

        let call = ToolCall::new(
            "call_1",
            "read_large_output",
            json!({"filename": stored.reference.as_str(), "start": 1, "end": 5}).to_string(),
        );
        let result = router.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.result, "hello");

        let missing = ToolCall::new(
            "call_2",
            "read_large_output",
            json!({"filename": "tool_20250101_000000_gone.txt", "start": 1, "end": 5}).to_string(),
        );
        let error = router.execute(&missing).await.unwrap_err();
        assert!(matches!(error, ToolError::NotFound(_)));
    }
}
