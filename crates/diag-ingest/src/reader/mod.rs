pub mod bundle;
pub mod plist;

pub use bundle::{read_bundle, read_bundle_file};
