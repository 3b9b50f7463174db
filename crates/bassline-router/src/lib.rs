//! Segment-at-a-time routing primitives for Bassline.
//!
//! This crate provides the two value types that the dispatcher in
//! `bassline-core` is built on:
//!
//! - [`PathComponents`]: a parsed, lowercase, root-anchored request path that
//!   handlers consume one segment at a time with [`PathComponents::child`].
//! - [`RouteTable`]: a nested table keyed by the first path segment whose
//!   leaves are arbitrary targets (in practice, handlers).
//!
//! # Example
//!
//! ```rust
//! use bassline_router::{PathComponents, Resolution, RouteTable};
//!
//! let table = RouteTable::new()
//!     .index("landing")
//!     .nest("site", RouteTable::new().nest("admin", RouteTable::new().route("theme", "themes")));
//!
//! let path = PathComponents::parse("/Site/Admin/Theme/Edit");
//! match table.resolve(&path) {
//!     Resolution::Found { target, rest } => {
//!         assert_eq!(*target, "themes");
//!         assert_eq!(rest.path(), "/edit");
//!     }
//!     Resolution::NotFound => unreachable!(),
//! }
//! ```
//!
//! # Architecture
//!
//! Route tables are trees; resolution walks them iteratively:
//!
//! ```text
//!                    (root)
//!                      │
//!              ┌───────┴───────┐
//!              │               │
//!             "."            "site"
//!          (landing)           │
//!                           "admin"
//!                              │
//!                   ┌──────────┼──────────┐
//!                "theme"   "groups"    "users"
//!               (handler) (handler)  (handler)
//! ```

#![doc(html_root_url = "https://docs.rs/bassline-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod path;
mod table;

pub use error::RouterError;
pub use path::PathComponents;
pub use table::{Resolution, Route, RouteTable};
