//! Configuration module.
//!
//! Provides `CoreConfig` (top-level settings), sub-configs for each
//! subsystem, `AppPaths` for cross-platform data directories, and TOML
//! persistence via `CoreConfig::load` / `CoreConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    CoreConfig, ModelSize, ProvidersSettings, StorageSettings, TranscriptionSettings,
};
