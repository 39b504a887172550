pub mod engine;
pub mod source;

pub use engine::HashEngine;
pub use source::{compute_content_hash, FsSourceProvider, MemorySourceProvider, SourceProvider};
