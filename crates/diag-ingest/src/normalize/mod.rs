pub mod checker_table;
pub mod normalizer;

pub use checker_table::{CheckerTable, CheckerTableHandle};
pub use normalizer::normalize;
