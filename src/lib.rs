pub mod capture;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod utils;

use std::path::Path;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use capture::{Camera, CameraProperties, ImageShape, Pulled, SampleType, SimulatedCamera, SimulatedKind};
pub use device::DeviceState;
pub use error::{Error, Result};
pub use pipeline::{AbortHandle, Acquisition, AcquisitionSettings};
pub use storage::{Storage, StorageKind, StorageProperties};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub storage: StorageConfig,
    pub acquisition: AcquisitionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub kind: SimulatedKind,
    pub properties: CameraProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub properties: StorageProperties,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            kind: SimulatedKind::Pattern,
            properties: CameraProperties::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Trash,
            properties: StorageProperties::default(),
        }
    }
}

impl Config {
    /// Layers an optional TOML file under `CAMSTREAM__*` environment overrides,
    /// e.g. `CAMSTREAM__CAMERA__PROPERTIES__BINNING=2`.
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix("CAMSTREAM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.camera.kind, SimulatedKind::Pattern);
        assert_eq!(config.camera.properties.shape.x, 1920);
        assert_eq!(config.camera.properties.shape.y, 1080);
        assert_eq!(config.camera.properties.pixel_type, SampleType::U8);
        assert_eq!(config.storage.kind, StorageKind::Trash);
        assert_eq!(config.storage.properties.filename, Path::new("out.raw"));
        assert_eq!(config.acquisition.max_frame_count, 10);
    }

    #[test]
    fn loads_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camstream.toml");
        fs::write(
            &path,
            r#"
[camera]
kind = "random"

[camera.properties]
binning = 2
pixel_type = "u8"
shape = { x = 64, y = 48 }

[storage]
kind = "frame_check"

[storage.properties]
first_frame_id = 3

[acquisition]
max_frame_count = 25
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.camera.kind, SimulatedKind::Random);
        assert_eq!(config.camera.properties.binning, 2);
        assert_eq!(config.camera.properties.shape.x, 64);
        assert_eq!(config.camera.properties.exposure_time_us, 10_000.0);
        assert_eq!(config.storage.kind, StorageKind::FrameCheck);
        assert_eq!(config.storage.properties.first_frame_id, 3);
        assert_eq!(config.acquisition.max_frame_count, 25);
        assert_eq!(config.acquisition.queue_depth, 8);
    }

    #[test]
    fn global_config_swaps() {
        let mut config = Config::default();
        config.acquisition.max_frame_count = 99;
        CONFIG.store(std::sync::Arc::new(config));
        assert_eq!(CONFIG.load().acquisition.max_frame_count, 99);
        CONFIG.store(std::sync::Arc::new(Config::default()));
    }
}
