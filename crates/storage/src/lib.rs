use directories::ProjectDirs;
use pdf_annotator_core::ViewerSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local config directory")]
    NoConfigDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("settings schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Settings file location.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    #[serde(default)]
    settings: ViewerSettings,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfAnnotator", "PdfAnnotator")
            .ok_or(StorageError::NoConfigDirectory)?;

        Ok(Self { root: dirs.config_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Stored settings, or the defaults when nothing was saved yet.
    pub fn load_settings(&self) -> Result<ViewerSettings, StorageError> {
        load_settings_file(&self.settings_path())
    }

    pub fn save_settings(&self, settings: &ViewerSettings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.settings_path(), bytes)?;
        Ok(())
    }
}

/// Reads a settings envelope from an explicit path. A missing file yields defaults.
pub fn load_settings_file(path: &Path) -> Result<ViewerSettings, StorageError> {
    if !path.exists() {
        return Ok(ViewerSettings::default());
    }

    let bytes = fs::read(path)?;
    let envelope: SettingsEnvelope = serde_json::from_slice(&bytes)?;
    if envelope.version > SETTINGS_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: envelope.version,
            supported: SETTINGS_SCHEMA_VERSION,
        });
    }

    Ok(envelope.settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_annotator_core::Palette;

    #[test]
    fn settings_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path().join("nested"));

        let settings = ViewerSettings {
            default_color: Palette::Green,
            zoom_step: 0.25,
            initial_pages: 4,
            ..ViewerSettings::default()
        };

        store.save_settings(&settings).expect("save should succeed");
        let loaded = store.load_settings().expect("load should succeed");

        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_settings().expect("load should succeed");
        assert_eq!(loaded, ViewerSettings::default());
    }

    #[test]
    fn partial_envelope_fills_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"version": 1, "settings": {"scroll_batch": 6}}"#).expect("write");

        let loaded = load_settings_file(&path).expect("load should succeed");
        assert_eq!(loaded.scroll_batch, 6);
        assert_eq!(loaded.default_color, Palette::Yellow);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"version": 7, "settings": {}}"#).expect("write");

        let err = load_settings_file(&path).expect_err("version 7 is unsupported");
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 7, supported: 1 }));
    }
}
