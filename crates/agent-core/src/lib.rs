pub mod agent;
pub mod budget;
pub mod tools;

pub use agent::events::AgentEvent;
pub use budget::{HeuristicTokenCounter, ModelTokenCounters, TokenCounter};
pub use tools::{
    parse_tool_args, FunctionCall, FunctionSchema, SharedTool, Tool, ToolCall, ToolError,
    ToolExecutor, ToolRegistry, ToolResult, ToolSchema,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
