//! Virtual tools that give the model bounded access to stored outputs.

mod args;
pub mod query_large_output;
pub mod read_large_output;
pub mod router;
pub mod search_large_output;

pub use query_large_output::QueryLargeOutputTool;
pub use read_large_output::ReadLargeOutputTool;
pub use router::{is_large_output_tool, LargeOutputRouter, LargeOutputTool};
pub use search_large_output::{SearchLargeOutputTool, SearchMatch, SearchOutcome};
