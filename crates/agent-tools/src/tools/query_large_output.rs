use std::sync::Arc;

use agent_core::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use jaq_interpret::{Ctx, FilterT, ParseCtx, RcIter, Val};
use serde_json::{json, Value};

use crate::output::{OutputError, SessionOutputStore};

use super::args::{optional_bool, required_str};

/// jq query over a stored JSON output.
pub struct QueryLargeOutputTool {
    store: Arc<SessionOutputStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLargeOutputArgs {
    pub filename: String,
    pub query: String,
    pub compact: bool,
    pub raw: bool,
}

impl QueryLargeOutputArgs {
    pub fn from_value(args: &Value) -> Result<Self, OutputError> {
        let filename = required_str(args, "filename")?.to_string();
        let query = required_str(args, "query")?.to_string();

        if query.trim().is_empty() {
            return Err(OutputError::InvalidArguments(
                "invalid jq query: empty".to_string(),
            ));
        }
        if query.contains('\0') {
            return Err(OutputError::InvalidArguments(
                "invalid jq query: contains null byte".to_string(),
            ));
        }

        Ok(Self {
            filename,
            query,
            compact: optional_bool(args, "compact", false)?,
            raw: optional_bool(args, "raw", false)?,
        })
    }
}

impl QueryLargeOutputTool {
    pub const NAME: &'static str = "query_large_output";

    pub fn new(store: Arc<SessionOutputStore>) -> Self {
        Self { store }
    }

    /// Validate `args`, load the referenced file and run the query on it.
    pub async fn query(&self, args: &Value) -> Result<String, OutputError> {
        let args = QueryLargeOutputArgs::from_value(args)?;
        let content = self.store.read(&args.filename).await?;
        Self::run_query(&content, &args.query, args.compact, args.raw)
    }

    /// Evaluate `query` against `content` and render every output on its own line.
    pub fn run_query(
        content: &str,
        query: &str,
        compact: bool,
        raw: bool,
    ) -> Result<String, OutputError> {
        let input: Value = serde_json::from_str(content).map_err(|e| {
            OutputError::QueryFailed(format!("file content is not valid JSON: {e}"))
        })?;

        let outputs = evaluate(input, query)?;
        if outputs.iter().all(Value::is_null) {
            return Err(OutputError::QueryFailed(format!(
                "query '{query}' produced no results"
            )));
        }

        let rendered = outputs
            .iter()
            .map(|value| render(value, compact, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join("\n"))
    }
}

#[async_trait]
impl Tool for QueryLargeOutputTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Execute jq queries on large JSON tool output files"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name of the JSON tool output file"
                },
                "query": {
                    "type": "string",
                    "description": "jq query to execute (e.g., '.name', '.items[]')"
                },
                "compact": {
                    "type": "boolean",
                    "description": "Output compact JSON format",
                    "default": false
                },
                "raw": {
                    "type": "boolean",
                    "description": "Output raw string values",
                    "default": false
                }
            },
            "required": ["filename", "query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(self.query(&args).await?))
    }
}

fn evaluate(input: Value, query: &str) -> Result<Vec<Value>, OutputError> {
    let mut defs = ParseCtx::new(Vec::new());
    defs.insert_natives(jaq_core::core());
    defs.insert_defs(jaq_std::std());

    let (parsed, errs) = jaq_parse::parse(query, jaq_parse::main());
    if !errs.is_empty() {
        return Err(OutputError::InvalidArguments(format!(
            "invalid jq query: {} syntax error(s) in '{query}'",
            errs.len()
        )));
    }
    let parsed = parsed.ok_or_else(|| {
        OutputError::InvalidArguments(format!("invalid jq query: '{query}'"))
    })?;

    let filter = defs.compile(parsed);
    if !defs.errs.is_empty() {
        return Err(OutputError::InvalidArguments(format!(
            "invalid jq query: {} undefined filter(s) or variable(s) in '{query}'",
            defs.errs.len()
        )));
    }

    let inputs = RcIter::new(core::iter::empty());
    let mut outputs = Vec::new();
    for result in filter.run((Ctx::new([], &inputs), Val::from(input))) {
        let value =
            result.map_err(|e| OutputError::QueryFailed(format!("query '{query}' failed: {e}")))?;
        outputs.push(Value::from(value));
    }
    Ok(outputs)
}

fn render(value: &Value, compact: bool, raw: bool) -> Result<String, OutputError> {
    if raw {
        if let Value::String(text) = value {
            return Ok(text.clone());
        }
    }

    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    rendered.map_err(|e| OutputError::QueryFailed(format!("failed to render result: {e}")))
}
