// common/test_prelude.rs

// Re-export commonly used items for integration tests.
pub use assert_cmd::Command;
pub use predicates::prelude::*;
pub use predicates::str::contains;

pub use super::test_utils::{fixture, fixture_text, heapcheck_cmd, TestProject};
