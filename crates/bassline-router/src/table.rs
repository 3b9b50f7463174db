//! Nested route tables.

use std::collections::HashMap;

use crate::PathComponents;

/// An entry in a [`RouteTable`].
#[derive(Debug, Clone)]
pub enum Route<T> {
    /// A terminal target. Resolution stops here.
    Leaf(T),
    /// A sub-table consulted with the remaining path.
    Table(RouteTable<T>),
}

/// The result of [`RouteTable::resolve`].
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution<'a, T> {
    /// A leaf matched.
    Found {
        /// The matched target.
        target: &'a T,
        /// The path left after consuming every matched key.
        rest: PathComponents,
    },
    /// No key matched the next segment, or the path ended at a table with
    /// no index entry.
    NotFound,
}

/// A table mapping the first path segment to a target or nested table.
///
/// Keys are lowercase segment names. The special index entry matches the
/// root path (no segments left).
///
/// Resolution is iterative, so deeply nested tables do not grow the stack.
#[derive(Debug, Clone)]
pub struct RouteTable<T> {
    index: Option<T>,
    entries: HashMap<String, Route<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            index: None,
            entries: HashMap::new(),
        }
    }
}

impl<T> RouteTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target for the root path.
    pub fn index(mut self, target: T) -> Self {
        self.index = Some(target);
        self
    }

    /// Adds a terminal route for `segment`.
    pub fn route(mut self, segment: &str, target: T) -> Self {
        self.entries
            .insert(segment.to_lowercase(), Route::Leaf(target));
        self
    }

    /// Adds a nested table for `segment`.
    pub fn nest(mut self, segment: &str, table: RouteTable<T>) -> Self {
        self.entries
            .insert(segment.to_lowercase(), Route::Table(table));
        self
    }

    /// Returns the number of direct entries, excluding the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has neither entries nor an index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.index.is_none()
    }

    /// Resolves `path` against this table.
    ///
    /// Each nested table consumes one segment. A leaf consumes its own
    /// segment and returns whatever remains, which may be the root.
    pub fn resolve(&self, path: &PathComponents) -> Resolution<'_, T> {
        let mut table = self;
        let mut path = path.clone();

        loop {
            let Some(child) = path.child() else {
                return match &table.index {
                    Some(target) => Resolution::Found { target, rest: path },
                    None => Resolution::NotFound,
                };
            };

            match path.first().and_then(|segment| table.entries.get(segment)) {
                None => return Resolution::NotFound,
                Some(Route::Leaf(target)) => {
                    return Resolution::Found {
                        target,
                        rest: child,
                    }
                }
                Some(Route::Table(nested)) => {
                    table = nested;
                    path = child;
                }
            }
        }
    }
}
