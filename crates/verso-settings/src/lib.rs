//! # verso-settings
//!
//! Settings are loaded from three layers, lowest priority first:
//! 1. compiled defaults ([`VersoSettings::default()`])
//! 2. `~/.verso/settings.json`, deep-merged over the defaults
//! 3. `VERSO_*` environment variables
//!
//! There is no global instance; the binary loads settings once and passes
//! the pieces each component needs.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, expand_home, load_settings, load_settings_from_path, settings_path};
pub use types::*;
