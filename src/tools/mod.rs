pub mod common;
pub mod factory;
pub mod file_read;
pub mod file_write;
pub mod grep_search;
pub mod list_directory;
pub mod process;
pub mod registry;
pub mod replace_file_content;
pub mod shell;
pub mod traits;

pub use common::truncate_args_for_log;
pub use factory::{default_registry, default_tools};
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use grep_search::GrepSearchTool;
pub use list_directory::ListDirectoryTool;
pub use process::{ProcessError, ProcessStatus, ProcessTable};
pub use registry::ToolRegistry;
pub use replace_file_content::ReplaceFileContentTool;
pub use shell::{ReadCommandOutputTool, RunCommandTool, SendCommandInputTool};
pub use traits::{Tool, ToolContext, ToolSpec};
