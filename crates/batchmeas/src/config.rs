//! User configuration stored as YAML.
//!
//! ```yaml
//! measure:
//!   recstep: 0.1
//!   spike_threshold: -20.0
//!   syn_time: 200.0
//! recording:
//!   time_scale: 1000.0
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use batchmeas_core::{MeasureConfig, RecordingUnits, StoreError};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "batchmeas.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub measure: MeasureConfig,
    pub recording: RecordingUnits,
}

impl AppConfig {
    /// Default location inside the data directory
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Load from `path`, falling back to defaults when the file is absent or
    /// cannot be parsed
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_saphyr::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable config, using defaults");
                Self::default()
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String, StoreError> {
        serde_saphyr::to_string(self)
            .map_err(|e| StoreError::Serialize(format!("Failed to serialize config: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let yaml = self.to_yaml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("Failed to create {}: {e}", parent.display())))?;
        }
        fs::write(path, yaml)
            .map_err(|e| StoreError::Io(format!("Failed to write {}: {e}", path.display())))
    }
}
