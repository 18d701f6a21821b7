use std::sync::Arc;

use agent_core::tools::{ToolCall, ToolError, ToolExecutor, ToolResult, ToolSchema};
use async_trait::async_trait;

use super::handler::ToolOutputHandler;
use crate::tools::is_large_output_tool;

/// Wraps an executor so large results are offloaded and the virtual
/// tools are served next to the wrapped tools.
pub struct OffloadingToolExecutor<E> {
    inner: E,
    handler: Arc<ToolOutputHandler>,
    model_id: Option<String>,
}

impl<E: ToolExecutor> OffloadingToolExecutor<E> {
    pub fn new(inner: E, handler: Arc<ToolOutputHandler>) -> Self {
        Self {
            inner,
            handler,
            model_id: None,
        }
    }

    /// Model whose tokenizer decides what counts as large.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn handler(&self) -> &Arc<ToolOutputHandler> {
        &self.handler
    }
}

#[async_trait]
impl<E: ToolExecutor> ToolExecutor for OffloadingToolExecutor<E> {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        if is_large_output_tool(&call.function.name) {
            // Virtual tool results are already bounded; never re-offload them.
            return self.handler.router().execute(call).await;
        }

        let result = self.inner.execute(call).await?;
        Ok(self
            .handler
            .process_tool_result(call, result, self.model_id.as_deref())
            .await)
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        let mut tools = self.inner.list_tools();
        tools.extend(self.handler.router().list_tools());
        tools
    }
}
