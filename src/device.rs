use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle shared by cameras and storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    AwaitingConfiguration,
    Armed,
    Running,
    /// Terminal: the device released its resources.
    Closed,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingConfiguration => "AwaitingConfiguration",
            Self::Armed => "Armed",
            Self::Running => "Running",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Range and writability of a single numeric property.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub low: f32,
    pub high: f32,
    pub writable: bool,
}

impl Bounds {
    pub const READ_ONLY: Self = Self {
        low: 0.0,
        high: 0.0,
        writable: false,
    };

    pub fn writable(low: f32, high: f32) -> Self {
        Self {
            low,
            high,
            writable: true,
        }
    }
}
