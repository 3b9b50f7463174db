//! # Bassline
//!
//! The Bassline shell application: admin editors for themes, palettes,
//! groups, users and the authentication configuration, each guarded by the
//! save-token edit-session protocol. Apps configured under `site.apps` are
//! mounted at their key; the shell serves every other path.
//!
//! ```text
//! /                          landing and mounted apps
//! /login/                    sign-in methods
//! /login/attempt             sign in              (POST)
//! /logout/                   sign out
//! /<app>/...                 a mounted app
//! /site/admin/               editors the caller may open
//! /site/admin/theme/         themes            (edit_themes)
//! /site/admin/color_palette/ palettes          (edit_themes)
//! /site/admin/groups/        groups            (edit_security)
//! /site/admin/users/         users             (edit_security)
//! /site/admin/auth_config/   auth config       (edit_security)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use bassline::App;
//! use bassline_config::BasslineConfig;
//! use http_body_util::Full;
//!
//! # tokio_test::block_on(async {
//! let app = App::new(BasslineConfig::default());
//! let transport = app.transport();
//!
//! let request = http::Request::get("/").body(Full::new(bytes::Bytes::new())).unwrap();
//! let response = transport.handle(request).await;
//! assert_eq!(response.status(), http::StatusCode::OK);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/bassline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
pub mod editor;
pub mod login;
pub mod resources;
pub mod seed;
pub mod shell;

pub use app::{telemetry_config, App};
pub use editor::EditorHandler;
pub use resources::ResourceSchema;

// Re-export the workspace crates
pub use bassline_config as config;
pub use bassline_core as core;
pub use bassline_server as server;
pub use bassline_session as session;
pub use bassline_telemetry as telemetry;
