use super::{
    FileReadTool, FileWriteTool, GrepSearchTool, ListDirectoryTool, ProcessTable,
    ReadCommandOutputTool, ReplaceFileContentTool, RunCommandTool, SendCommandInputTool, Tool,
    ToolRegistry,
};
use crate::config::ToolsConfig;
use std::sync::Arc;

/// Create the default tool set. Process tools share `processes`.
pub fn default_tools(processes: &Arc<ProcessTable>, config: &ToolsConfig) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(RunCommandTool::new(Arc::clone(processes), config.clone())),
        Box::new(ReadCommandOutputTool::new(Arc::clone(processes))),
        Box::new(SendCommandInputTool::new(Arc::clone(processes))),
        Box::new(GrepSearchTool::new(config.grep_timeout_secs)),
        Box::new(ReplaceFileContentTool::new()),
        Box::new(FileReadTool::new()),
        Box::new(FileWriteTool::new()),
        Box::new(ListDirectoryTool::new()),
    ]
}

pub fn default_registry(processes: &Arc<ProcessTable>, config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in default_tools(processes, config) {
        registry.register(tool);
    }
    registry
}
