use super::input::{FileResourceReader, ResourceReader};
use crate::config::Config;
use crate::llm::{Provider, create_provider};
use crate::session::CompactionConfig;
use crate::tools::{ProcessTable, ToolRegistry, ToolSpec, default_registry};
use std::sync::Arc;

/// Everything a turn needs besides the session itself.
///
/// Built once by whatever composes the process and passed to the
/// orchestrator; `shutdown` is the matching teardown.
pub struct AgentContext {
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    tool_specs: Vec<ToolSpec>,
    resources: Arc<dyn ResourceReader>,
    processes: Arc<ProcessTable>,
    compaction: CompactionConfig,
}

impl AgentContext {
    pub fn new(provider: Arc<dyn Provider>, tools: ToolRegistry) -> Self {
        let tool_specs = tools.specs();
        Self {
            provider,
            tools,
            tool_specs,
            resources: Arc::new(FileResourceReader),
            processes: Arc::new(ProcessTable::new()),
            compaction: CompactionConfig::default(),
        }
    }

    /// Provider, default tools and file resource reader from `config`.
    pub fn from_config(config: &Config) -> Self {
        let processes =
            Arc::new(ProcessTable::new().with_output_limit(config.tools.max_output_bytes));
        let tools = default_registry(&processes, &config.tools);
        tracing::info!(tools = tools.len(), "tool registry ready");
        Self::new(create_provider(config), tools)
            .with_processes(processes)
            .with_compaction(config.compaction.clone())
    }

    pub fn with_resource_reader(mut self, resources: Arc<dyn ResourceReader>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_processes(mut self, processes: Arc<ProcessTable>) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = compaction;
        self
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tool_specs(&self) -> &[ToolSpec] {
        &self.tool_specs
    }

    pub fn resources(&self) -> &dyn ResourceReader {
        self.resources.as_ref()
    }

    pub fn processes(&self) -> &Arc<ProcessTable> {
        &self.processes
    }

    pub fn compaction(&self) -> &CompactionConfig {
        &self.compaction
    }

    /// Kill background processes left behind by tools.
    pub async fn shutdown(&self) {
        let live = self.processes.len();
        self.processes.shutdown().await;
        tracing::info!(killed = live, "agent context shut down");
    }
}
