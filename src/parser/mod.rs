//! Parsers for HDHomeRun JSON responses
//!
//! One submodule per upstream endpoint. Each exposes a `parse_*` function
//! converting the raw response body into domain types. Whole-body JSON
//! failures are fatal for the calling stage; individually invalid entries
//! are dropped, not errors.

pub mod discover;
pub mod guide;
pub mod lineup;

pub use discover::parse_device_auth;
pub use guide::parse_guide_window;
pub use lineup::parse_lineup;
