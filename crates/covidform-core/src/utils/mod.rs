//! Utility functions for string formatting and manipulation.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{camel_to_snake_case, keys_to_camel_case, snake_to_camel_case, truncate_string};
