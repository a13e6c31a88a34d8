pub mod schema;

pub use schema::{Config, ProviderKind, ToolsConfig};
