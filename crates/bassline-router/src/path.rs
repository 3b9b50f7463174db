//! Parsed request paths.
//!
//! [`PathComponents`] is the value handlers consume while routing. It is
//! immutable: narrowing a path with [`PathComponents::child`] produces a new
//! value and leaves the original untouched.

use std::fmt;

use smallvec::SmallVec;

use crate::RouterError;

/// Number of segments stored inline before spilling to the heap.
const INLINE_SEGMENTS: usize = 6;

/// An ordered, root-anchored sequence of lowercase path segments.
///
/// Empty segments are discarded while parsing, so segments never contain `/`
/// and are never empty. The canonical form is `/` followed by the segments
/// joined with `/`.
///
/// # Example
///
/// ```rust
/// use bassline_router::PathComponents;
///
/// let path = PathComponents::parse("//Site/admin//Theme/");
/// assert_eq!(path.count(), 3);
/// assert_eq!(path.path(), "/site/admin/theme");
/// assert!(path.is_dir());
/// assert_eq!(path.at(-1).unwrap(), "theme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathComponents {
    segments: SmallVec<[String; INLINE_SEGMENTS]>,
    is_dir: bool,
}

impl PathComponents {
    /// Parses a URI path.
    ///
    /// Segments are lower-cased, empty segments are dropped, and a trailing
    /// `/` is recorded as [`is_dir`](Self::is_dir).
    #[must_use]
    pub fn parse(uri_path: &str) -> Self {
        let segments = uri_path
            .split('/')
            .filter(|piece| !piece.is_empty())
            .map(str::to_lowercase)
            .collect();

        Self {
            segments,
            is_dir: uri_path.ends_with('/'),
        }
    }

    /// Parses the path portion of a request URI, ignoring query and fragment.
    #[must_use]
    pub fn from_uri(uri: &http::Uri) -> Self {
        Self::parse(uri.path())
    }

    /// Creates the root path (`/`).
    #[must_use]
    pub fn root() -> Self {
        Self {
            segments: SmallVec::new(),
            is_dir: true,
        }
    }

    /// Returns `true` if the original path ended with `/`.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Returns `true` if there are no segments.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn count(&self) -> usize {
        self.segments.len()
    }

    /// Returns the segment at `index`.
    ///
    /// Non-negative indices count from the front, negative indices from the
    /// back (`-1` is the last segment).
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::IndexOutOfRange`] when `index` is outside
    /// `[-count, count - 1]`.
    pub fn at(&self, index: isize) -> Result<&str, RouterError> {
        let count = self.count();
        let out_of_range = RouterError::IndexOutOfRange { index, count };

        let position = if index >= 0 {
            index.unsigned_abs()
        } else {
            count
                .checked_sub(index.unsigned_abs())
                .ok_or(out_of_range.clone())?
        };

        self.segments
            .get(position)
            .map(String::as_str)
            .ok_or(out_of_range)
    }

    /// Returns the first segment, or `None` at the root.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Returns the path with the first segment removed, or `None` at the root.
    #[must_use]
    pub fn child(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        Some(Self {
            segments: self.segments.iter().skip(1).cloned().collect(),
            is_dir: self.is_dir,
        })
    }

    /// Returns the path with the last segment removed. The root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        let keep = self.count().saturating_sub(1);
        Self {
            segments: self.segments.iter().take(keep).cloned().collect(),
            is_dir: true,
        }
    }

    /// Appends the segments of a relative path.
    ///
    /// A `..` segment removes the last segment instead of being appended.
    #[must_use]
    pub fn join(&self, sub: &str) -> Self {
        let mut segments = self.segments.clone();
        for piece in sub.split('/').filter(|piece| !piece.is_empty()) {
            if piece == ".." {
                segments.pop();
            } else {
                segments.push(piece.to_lowercase());
            }
        }

        Self {
            segments,
            is_dir: sub.ends_with('/'),
        }
    }

    /// Returns the canonical path string, always starting with `/`.
    #[must_use]
    pub fn path(&self) -> String {
        let mut out = String::with_capacity(self.segments.iter().map(|s| s.len() + 1).sum());
        if self.segments.is_empty() {
            out.push('/');
        }
        for segment in &self.segments {
            out.push('/');
            out.push_str(segment);
        }
        out
    }

    /// Iterates over the segments from front to back.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl fmt::Display for PathComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
