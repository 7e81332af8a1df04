//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\copilot-core\
//!   macOS:   ~/Library/Application Support/copilot-core/
//!   Linux:   ~/.config/copilot-core/
//!
//! Data dir (encrypted store + key file):
//!   Windows: %LOCALAPPDATA%\copilot-core\
//!   macOS:   ~/Library/Application Support/copilot-core/
//!   Linux:   ~/.local/share/copilot-core/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory of the encrypted sled store.
    pub store_dir: PathBuf,
    /// Key file used by the file key backend.
    pub key_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "copilot-core";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let store_dir = data_dir.join("store");
        let key_file = data_dir.join("store.key");

        Self {
            config_dir,
            settings_file,
            store_dir,
            key_file,
        }
    }

    /// Keyring service name used by the keyring key backend.
    pub fn keyring_service() -> &'static str {
        Self::APP_NAME
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
