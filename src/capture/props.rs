//! Camera properties and their metadata

use serde::{Deserialize, Serialize};

use super::shape::{SampleType, SampleTypeSet};
use crate::device::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    #[default]
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEdge {
    #[default]
    Rising,
    Falling,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Trigger {
    pub enable: bool,
    pub line: u8,
    pub kind: SignalKind,
    pub edge: TriggerEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputTriggers {
    pub frame_start: Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraProperties {
    pub exposure_time_us: f32,
    pub line_interval_us: f32,
    pub readout_direction: Direction,
    /// Power of two in 1..=8; 0 is read as 1.
    pub binning: u8,
    pub pixel_type: SampleType,
    pub shape: Extent,
    pub offset: Extent,
    pub input_triggers: InputTriggers,
}

impl Default for CameraProperties {
    fn default() -> Self {
        Self {
            exposure_time_us: 10_000.0,
            line_interval_us: 0.0,
            readout_direction: Direction::Forward,
            binning: 1,
            pixel_type: SampleType::U8,
            shape: Extent { x: 1920, y: 1080 },
            offset: Extent::default(),
            input_triggers: InputTriggers::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtentBounds {
    pub x: Bounds,
    pub y: Bounds,
}

/// Input/output capability of a trigger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerCapability {
    pub input: bool,
    pub output: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerCapabilities {
    pub frame_start: TriggerCapability,
}

/// Bounds and capabilities derived from a camera's current configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraPropertyMetadata {
    pub exposure_time_us: Bounds,
    pub line_interval_us: Bounds,
    pub readout_direction: Bounds,
    pub binning: Bounds,
    pub shape: ExtentBounds,
    pub offset: ExtentBounds,
    pub supported_pixel_types: SampleTypeSet,
    pub digital_lines: Vec<String>,
    pub triggers: TriggerCapabilities,
}

impl CameraPropertyMetadata {
    /// Index of the named digital line, e.g. `"software"`.
    pub fn digital_line(&self, name: &str) -> Option<u8> {
        self.digital_lines
            .iter()
            .position(|n| n == name)
            .and_then(|i| u8::try_from(i).ok())
    }
}
