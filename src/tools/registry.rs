use super::common::truncate_args_for_log;
use super::traits::{Tool, ToolContext, ToolSpec};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed tool table. Resolution is a lookup; failures become text.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let tool: Arc<dyn Tool> = Arc::from(tool);
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Return sorted list of registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Specs for all registered tools, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one tool call and return the text handed back to the model.
    ///
    /// Unknown tools and tool failures are reported in the returned text.
    pub async fn dispatch(&self, name: &str, args: &Map<String, Value>, ctx: &ToolContext) -> String {
        tracing::info!(tool = name, args = %truncate_args_for_log(args), "executing tool");

        let Some(tool) = self.resolve(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return format!("Error: Unknown tool '{name}'");
        };

        match tool.execute(Value::Object(args.clone()), ctx).await {
            Ok(output) => {
                tracing::debug!(tool = name, bytes = output.len(), "tool finished");
                output
            }
            Err(e) => {
                tracing::warn!(tool = name, "tool failed: {e}");
                format!("Error: {e}")
            }
        }
    }
}
