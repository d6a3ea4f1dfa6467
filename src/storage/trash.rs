//! Discarding sink

use tracing::debug;

use super::{expect_configurable, expect_state, Storage, StorageProperties};
use crate::capture::Records;
use crate::device::DeviceState;
use crate::error::Result;

pub struct Trash {
    state: DeviceState,
    properties: StorageProperties,
    iframe: i64,
}

impl Trash {
    pub fn new() -> Self {
        Self {
            state: DeviceState::AwaitingConfiguration,
            properties: StorageProperties::default(),
            iframe: 0,
        }
    }

    /// Id the next record would carry if the stream were gap-free.
    pub fn next_frame_id(&self) -> i64 {
        self.iframe
    }
}

impl Default for Trash {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for Trash {
    fn name(&self) -> &'static str {
        "trash"
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    fn configure(&mut self, properties: &StorageProperties) -> Result<DeviceState> {
        expect_configurable(self.state)?;
        self.properties = properties.clone();
        self.state = DeviceState::Armed;
        Ok(self.state)
    }

    fn query(&self) -> &StorageProperties {
        &self.properties
    }

    fn start(&mut self) -> Result<DeviceState> {
        expect_state(self.state, DeviceState::Armed)?;
        self.iframe = self.properties.first_frame_id;
        self.state = DeviceState::Running;
        Ok(self.state)
    }

    fn append(&mut self, frames: &[u8]) -> Result<usize> {
        expect_state(self.state, DeviceState::Running)?;
        for record in Records::new(frames) {
            // Nothing is validated; a bad length just ends the count.
            if record.is_err() {
                debug!("trash: stopped counting at a malformed record");
                break;
            }
            self.iframe += 1;
        }
        Ok(frames.len())
    }

    fn stop(&mut self) -> DeviceState {
        if self.state == DeviceState::Running {
            self.state = DeviceState::Armed;
        }
        self.state
    }

    fn destroy(&mut self) {
        self.stop();
        self.state = DeviceState::Closed;
    }
}
