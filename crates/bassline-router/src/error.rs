//! Router error types.

use thiserror::Error;

/// Errors raised by path and route-table operations.
///
/// These are programmer errors: a handler indexed a path it had not checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A segment index fell outside `[-count, count - 1]`.
    #[error("path component index {index} out of range for {count} components")]
    IndexOutOfRange {
        /// The requested index.
        index: isize,
        /// Number of components in the path.
        count: usize,
    },
}
