use crate::persistence::get_config_dir;
use crate::session::SessionOptions;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings schema version - increment when making breaking changes
pub const APP_SETTINGS_VERSION: u32 = 1;

/// Application-wide options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Schema version for migration support
    #[serde(default)]
    pub version: u32,

    /// Close a session window once its remote session has ended
    #[serde(default)]
    pub close_window_after_disconnect: bool,

    /// Span all displays when a session goes full screen
    #[serde(default)]
    pub use_multiple_monitors: bool,
}

impl AppSettings {
    /// The subset of options a session controller cares about.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            close_window_after_disconnect: self.close_window_after_disconnect,
            use_multiple_monitors: self.use_multiple_monitors,
        }
    }
}

/// Get the settings file path
pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

pub fn load_app_settings() -> AppSettings {
    load_app_settings_from(&get_settings_path())
}

/// Load settings from `path`, falling back to defaults for anything missing
/// or unreadable.
pub fn load_app_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        log::info!("Settings file not found at {}, using defaults", path.display());
        return AppSettings::default();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::error!("Failed to read settings file {}: {}", path.display(), e);
            return AppSettings::default();
        }
    };

    match serde_json::from_str::<AppSettings>(&content) {
        Ok(settings) => return migrate_app_settings(settings),
        Err(e) => {
            log::warn!("Failed to parse settings directly: {}, attempting partial recovery", e);
        }
    }

    match recover_settings_from_json(&content) {
        Ok(settings) => {
            log::info!("Recovered settings with partial data");
            migrate_app_settings(settings)
        }
        Err(e) => {
            log::error!("Failed to recover settings from {}: {:#}", path.display(), e);
            AppSettings::default()
        }
    }
}

/// Pull individually valid fields out of a malformed settings file.
fn recover_settings_from_json(content: &str) -> Result<AppSettings> {
    let value: serde_json::Value =
        serde_json::from_str(content).context("Settings file is not valid JSON")?;
    let obj = value
        .as_object()
        .context("Settings file root is not a JSON object")?;

    let mut settings = AppSettings::default();

    if let Some(v) = obj.get("version").and_then(|v| v.as_u64()) {
        settings.version = u32::try_from(v).unwrap_or(APP_SETTINGS_VERSION);
    }

    match obj.get("close_window_after_disconnect").map(|v| v.as_bool()) {
        Some(Some(v)) => settings.close_window_after_disconnect = v,
        Some(None) => log::warn!("Could not parse close_window_after_disconnect, using default"),
        None => {}
    }

    match obj.get("use_multiple_monitors").map(|v| v.as_bool()) {
        Some(Some(v)) => settings.use_multiple_monitors = v,
        Some(None) => log::warn!("Could not parse use_multiple_monitors, using default"),
        None => {}
    }

    Ok(settings)
}

/// Migrate settings from older versions to the current version
fn migrate_app_settings(mut settings: AppSettings) -> AppSettings {
    let original_version = settings.version;

    if settings.version == 0 {
        log::info!("Migrating settings from pre-versioning (v0) to v1");
        settings.version = 1;
    }

    if original_version != settings.version {
        log::info!("Settings migrated from v{} to v{}", original_version, settings.version);
    }

    settings
}

pub fn save_app_settings(settings: &AppSettings) -> Result<()> {
    save_app_settings_to(&get_settings_path(), settings)
}

pub fn save_app_settings_to(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
