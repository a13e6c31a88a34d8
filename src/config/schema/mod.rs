mod core;
mod tools;

pub use self::core::{Config, ProviderKind};
pub use tools::ToolsConfig;
