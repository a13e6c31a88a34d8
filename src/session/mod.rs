pub mod compaction;
pub mod registry;
pub mod types;

pub use compaction::{CompactionConfig, MIN_KEEP_TRAILING, compact, summarize};
pub use registry::SessionRegistry;
pub use types::{CancelFlag, Session};
