use std::sync::Arc;

use agent_core::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use regex::RegexBuilder;
use serde::Serialize;
use serde_json::{json, Value};

use crate::output::{OutputError, SessionOutputStore};

use super::args::{optional_bool, optional_int, required_str};

/// Default cap on returned matches.
pub const DEFAULT_MAX_RESULTS: usize = 50;
/// Hard cap regardless of what the caller asks for.
pub const MAX_RESULTS_LIMIT: usize = 1000;
/// Characters of context shown on each side of a match.
pub const CONTEXT_CHARS: usize = 80;
/// Longest matched text echoed back verbatim.
const MAX_MATCH_DISPLAY_CHARS: usize = 200;
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Regex search over a stored output.
pub struct SearchLargeOutputTool {
    store: Arc<SessionOutputStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLargeOutputArgs {
    pub filename: String,
    pub pattern: String,
    pub case_sensitive: bool,
    pub max_results: usize,
}

impl SearchLargeOutputArgs {
    pub fn from_value(args: &Value) -> Result<Self, OutputError> {
        let filename = required_str(args, "filename")?.to_string();
        let pattern = required_str(args, "pattern")?.to_string();

        if pattern.contains('\0') {
            return Err(OutputError::InvalidArguments(
                "invalid pattern: contains null byte".to_string(),
            ));
        }

        let case_sensitive = optional_bool(args, "case_sensitive", true)?;
        let max_results = match optional_int(args, "max_results")? {
            None => DEFAULT_MAX_RESULTS,
            Some(n) if n < 1 => {
                return Err(OutputError::InvalidArguments(
                    "'max_results' must be 1 or greater".to_string(),
                ))
            }
            Some(n) => (n as usize).min(MAX_RESULTS_LIMIT),
        };

        Ok(Self {
            filename,
            pattern,
            case_sensitive,
            max_results,
        })
    }
}

/// One match, positioned so it can be fed straight into `read_large_output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    /// 1-based line number
    pub line_number: usize,
    /// 1-based character offset of the first matched character in the file
    pub start: usize,
    /// 1-based character offset of the last matched character (inclusive)
    pub end: usize,
    pub matched: String,
    /// Bounded window of the surrounding line
    pub context: String,
}

/// Matches found, and whether more existed past the cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub matches: Vec<SearchMatch>,
    pub truncated: bool,
}

impl SearchLargeOutputTool {
    pub const NAME: &'static str = "search_large_output";

    pub fn new(store: Arc<SessionOutputStore>) -> Self {
        Self { store }
    }

    /// Validate `args`, search the referenced file and format the matches.
    pub async fn search_output(&self, args: &Value) -> Result<String, OutputError> {
        let args = SearchLargeOutputArgs::from_value(args)?;
        let content = self.store.read(&args.filename).await?;
        let outcome =
            Self::search(&content, &args.pattern, args.case_sensitive, args.max_results)?;
        Ok(Self::format_results(&args, &outcome))
    }

    /// Find up to `max_results` non-empty matches of `pattern` in `content`.
    ///
    /// Character positions are tracked with a cursor that only moves
    /// forward, so a long single-line document is scanned once.
    pub fn search(
        content: &str,
        pattern: &str,
        case_sensitive: bool,
        max_results: usize,
    ) -> Result<SearchOutcome, OutputError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| OutputError::InvalidArguments(format!("Invalid regex pattern: {e}")))?;

        let mut matches = Vec::new();
        let mut line_offset = 0usize;

        for (index, line) in content.split('\n').enumerate() {
            // (byte, char) position inside the line
            let mut byte_cursor = 0usize;
            let mut char_cursor = 0usize;

            for found in regex.find_iter(line) {
                if found.start() == found.end() {
                    continue;
                }
                if matches.len() >= max_results {
                    return Ok(SearchOutcome {
                        matches,
                        truncated: true,
                    });
                }

                char_cursor += line[byte_cursor..found.start()].chars().count();
                byte_cursor = found.start();

                let matched_chars = found.as_str().chars().count();
                let start = line_offset + char_cursor + 1;

                matches.push(SearchMatch {
                    line_number: index + 1,
                    start,
                    end: start + matched_chars - 1,
                    matched: truncate_chars(found.as_str(), MAX_MATCH_DISPLAY_CHARS),
                    context: context_window(line, found.start(), found.end(), char_cursor),
                });

                char_cursor += matched_chars;
                byte_cursor = found.end();
            }

            // +1 for the newline consumed by split
            line_offset += char_cursor + line[byte_cursor..].chars().count() + 1;
        }

        Ok(SearchOutcome {
            matches,
            truncated: false,
        })
    }

    fn format_results(args: &SearchLargeOutputArgs, outcome: &SearchOutcome) -> String {
        if outcome.matches.is_empty() {
            return format!(
                "No matches found for pattern '{}' in {}.",
                args.pattern, args.filename
            );
        }

        let mut output = format!(
            "Found {} match(es) in {}",
            outcome.matches.len(),
            args.filename
        );
        if outcome.truncated {
            output.push_str(&format!(
                " (limited to {}; more matches exist)",
                args.max_results
            ));
        }
        output.push_str(":\n\n");

        for (i, m) in outcome.matches.iter().enumerate() {
            output.push_str(&format!(
                "{}. line {}, chars {}-{}: {:?}\n   {}\n",
                i + 1,
                m.line_number,
                m.start,
                m.end,
                m.matched,
                m.context
            ));
        }

        output
    }
}

#[async_trait]
impl Tool for SearchLargeOutputTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search for regex patterns in large tool output files. Returns line numbers, character positions usable with read_large_output, and a short context for each match"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name of the tool output file to search"
                },
                "pattern": {
                    "type": "string",
                    "description": "Search pattern (regex supported)"
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Case sensitive search",
                    "default": true
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "default": DEFAULT_MAX_RESULTS
                }
            },
            "required": ["filename", "pattern"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(self.search_output(&args).await?))
    }
}

/// Up to [`CONTEXT_CHARS`] characters either side of `line[start..end]`.
///
/// `chars_before` is the character count of `line[..start]`.
fn context_window(line: &str, start: usize, end: usize, chars_before: usize) -> String {
    let mut lead: Vec<char> = line[..start].chars().rev().take(CONTEXT_CHARS).collect();
    lead.reverse();

    let mut trail: Vec<char> = line[end..].chars().take(CONTEXT_CHARS + 1).collect();
    let trail_cut = trail.len() > CONTEXT_CHARS;
    trail.truncate(CONTEXT_CHARS);

    let mut window = String::new();
    if chars_before > CONTEXT_CHARS {
        window.push('…');
    }
    window.extend(lead);
    window.push_str(&truncate_chars(&line[start..end], MAX_MATCH_DISPLAY_CHARS));
    window.extend(trail);
    if trail_cut {
        window.push('…');
    }
    window
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let mut truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        truncated.push('…');
    }
    truncated
}
