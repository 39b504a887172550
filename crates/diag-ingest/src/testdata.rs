//! Analyzer output fixtures shared by the unit tests.
//!
//! Three plists report the same three defects in `test.cpp` / `test.h`, as
//! written by three analyzer generations: no checker names, checker names,
//! and checker names with embedded hashes.

pub const EMPTY_FILE: &str = include_str!("../testdata/empty_file");
pub const CLANG37_NOERROR: &str = include_str!("../testdata/clang-3.7-noerror.plist");
pub const CLANG36_UNNAMED: &str = include_str!("../testdata/clang-3.6-unnamed.plist");
pub const CLANG37: &str = include_str!("../testdata/clang-3.7.plist");
pub const CLANG40: &str = include_str!("../testdata/clang-4.0.plist");

pub const TEST_CPP: &str = include_str!("../testdata/test.cpp");
pub const TEST_H: &str = include_str!("../testdata/test.h");

// Expected identity hashes with the default configuration.
pub const GOLDEN_DIV_ZERO_CONTENT: &str = "6f2e0f938ecd2e7ff89bd195f01a8296";
pub const GOLDEN_DIV_ZERO_CONTEXT: &str = "0278ec084327cfe82eb8db56fa9f73c4";
pub const GOLDEN_STACK_NAMED_CONTENT: &str = "b177e22b675574e026f8b59048d35c91";
pub const GOLDEN_STACK_NAMED_CONTEXT: &str = "2a45dff4e329a0a489c744e79f4ed9db";
pub const GOLDEN_STACK_UNRESOLVED_CONTENT: &str = "9b3217b78ddb71d9641ce9499563bd4f";
pub const GOLDEN_DEAD_STORE_CONTENT: &str = "977e40c3a6d4c0e17aeaee8d37f7b795";
pub const GOLDEN_DEAD_STORE_CONTEXT: &str = "a325761a91a9a0a93980faa0ee28a9a9";
