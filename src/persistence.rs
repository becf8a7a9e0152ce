use crate::tree::{SettingsDocument, SETTINGS_DOCUMENT_VERSION};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Opaque storage for the encoded settings document.
pub trait SettingsBlobStore {
    /// Returns `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<u8>>>;
    fn save(&self, blob: &[u8]) -> Result<()>;
}

/// Get the config directory path
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rdpdeck")
}

/// Get the connection tree file path
pub fn get_connections_path() -> PathBuf {
    get_config_dir().join("connections.json")
}

/// Blob store backed by a single JSON file.
pub struct FileBlobStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn default_location() -> Self {
        Self::new(get_connections_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsBlobStore for FileBlobStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.lock();
        if !self.path.exists() {
            log::info!("Connection file not found at {}, starting empty", self.path.display());
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(Some(bytes))
    }

    fn save(&self, blob: &[u8]) -> Result<()> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Passwords are stored verbatim; write a private temp file and swap it in
        let tmp_path = self.path.with_extension("tmp");
        write_private(&tmp_path, blob)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn write_private(path: &Path, blob: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(blob)?;
    file.sync_all()?;

    // `mode` only applies on creation; a stale temp file keeps its old mode
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Blob store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.blob.lock().clone()
    }
}

impl SettingsBlobStore for MemoryBlobStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().clone())
    }

    fn save(&self, blob: &[u8]) -> Result<()> {
        *self.blob.lock() = Some(blob.to_vec());
        Ok(())
    }
}

pub fn encode_document(document: &SettingsDocument) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(document).context("Failed to encode settings document")
}

/// Decode and migrate a persisted document. Structural repairs happen later
/// in `TreeStore::from_document`.
pub fn decode_document(blob: &[u8]) -> Result<SettingsDocument> {
    let document: SettingsDocument =
        serde_json::from_slice(blob).context("Settings document is not valid")?;
    Ok(migrate_document(document))
}

/// Migrate a settings document from older versions to the current version
pub(crate) fn migrate_document(mut document: SettingsDocument) -> SettingsDocument {
    let original_version = document.version;

    // v0 stored desktop sizes as legacy text; DesktopSize reads both forms,
    // so the bump is all that's left to do.
    if document.version == 0 {
        log::info!("Migrating settings document from pre-versioning (v0) to v1");
        document.version = 1;
    }

    if document.version > SETTINGS_DOCUMENT_VERSION {
        log::warn!(
            "Settings document v{} is newer than supported v{}, loading anyway",
            document.version,
            SETTINGS_DOCUMENT_VERSION
        );
    }

    if original_version != document.version {
        log::info!(
            "Settings document migrated from v{} to v{}",
            original_version,
            document.version
        );
    }

    document
}
