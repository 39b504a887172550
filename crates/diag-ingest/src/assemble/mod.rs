pub mod files;
pub mod reports;

pub use files::FileRegistry;
pub use reports::{assemble, AssembledReports};
