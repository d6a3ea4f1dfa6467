//! Storage backends: sinks for runs of `VideoFrame` records
//!
//! Backends hold no threads and no locks; each instance must be driven by a
//! single writer.

pub mod framecheck;
pub mod raw;
pub mod trash;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::error;

pub use framecheck::FrameCheck;
pub use raw::Raw;
pub use trash::Trash;

use crate::capture::ImageShape;
use crate::device::DeviceState;
use crate::error::{Error, Result};

/// Pixel size in micrometers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelScale {
    pub x: f64,
    pub y: f64,
}

impl Default for PixelScale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageProperties {
    pub filename: PathBuf,
    pub first_frame_id: i64,
    pub pixel_scale_um: PixelScale,
    /// Opaque JSON carried alongside the acquisition.
    pub external_metadata_json: Option<String>,
}

impl Default for StorageProperties {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("out.raw"),
            first_frame_id: 0,
            pixel_scale_um: PixelScale::default(),
            external_metadata_json: None,
        }
    }
}

/// Capabilities a backend advertises beyond sequential append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoragePropertyMetadata {
    /// Whether `reserve_image_shape` hints are acted upon.
    pub uses_shape_hint: bool,
}

/// Device contract implemented by every storage backend.
pub trait Storage: Send {
    fn name(&self) -> &'static str;

    fn state(&self) -> DeviceState;

    /// Validates and copies `properties`. Armed on success, otherwise
    /// AwaitingConfiguration.
    fn configure(&mut self, properties: &StorageProperties) -> Result<DeviceState>;

    fn query(&self) -> &StorageProperties;

    fn metadata(&self) -> StoragePropertyMetadata {
        StoragePropertyMetadata::default()
    }

    fn start(&mut self) -> Result<DeviceState>;

    /// Consumes a run of concatenated `VideoFrame` records and returns the
    /// number of bytes accepted. Errors report the accepted prefix through
    /// `Error::bytes_consumed`.
    fn append(&mut self, frames: &[u8]) -> Result<usize>;

    /// Flushes and closes; always lands in Armed from Running.
    fn stop(&mut self) -> DeviceState;

    /// Releases all resources, stopping first if needed. Idempotent.
    fn destroy(&mut self);

    /// Advisory pre-allocation hint.
    fn reserve_image_shape(&mut self, _shape: &ImageShape) {}
}

/// Backend selector used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Raw,
    Trash,
    FrameCheck,
}

impl StorageKind {
    pub fn create(self) -> Box<dyn Storage> {
        match self {
            Self::Raw => Box::new(Raw::new()),
            Self::Trash => Box::new(Trash::new()),
            Self::FrameCheck => Box::new(FrameCheck::new()),
        }
    }
}

pub(crate) fn expect_state(found: DeviceState, expected: DeviceState) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        error!("Expected state {expected}, found {found}");
        Err(Error::InvalidState { expected, found })
    }
}

/// Configuration is accepted until the backend starts running.
pub(crate) fn expect_configurable(found: DeviceState) -> Result<()> {
    match found {
        DeviceState::AwaitingConfiguration | DeviceState::Armed => Ok(()),
        _ => expect_state(found, DeviceState::Armed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_each_backend() {
        for (kind, name) in [
            (StorageKind::Raw, "raw"),
            (StorageKind::Trash, "trash"),
            (StorageKind::FrameCheck, "framecheck"),
        ] {
            let storage = kind.create();
            assert_eq!(storage.name(), name);
            assert_eq!(storage.state(), DeviceState::AwaitingConfiguration);
            assert!(!storage.metadata().uses_shape_hint);
        }
    }

    #[test]
    fn properties_default() {
        let p = StorageProperties::default();
        assert_eq!(p.filename, PathBuf::from("out.raw"));
        assert_eq!(p.first_frame_id, 0);
        assert_eq!(p.pixel_scale_um, PixelScale { x: 1.0, y: 1.0 });
    }
}
