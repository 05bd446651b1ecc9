//! Tool schemas handed through to backends.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function schema the model may call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    /// Function name.
    pub name: CompactString,

    /// What the function does.
    pub description: String,

    /// JSON schema of the parameters.
    pub parameters: Value,
}

/// Source of tool schemas, implemented by the function-call registry.
pub trait ToolSource: Send + Sync {
    /// The schemas to attach to the next request.
    fn tools(&self) -> Vec<Tool>;
}

/// `()` is the empty tool source.
impl ToolSource for () {
    fn tools(&self) -> Vec<Tool> {
        Vec::new()
    }
}
