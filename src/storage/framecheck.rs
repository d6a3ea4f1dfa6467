//! Sink that accepts only gap-free, increasing frame ids

use tracing::{error, instrument};

use super::{expect_configurable, expect_state, Storage, StorageProperties};
use crate::capture::Records;
use crate::device::DeviceState;
use crate::error::{Error, Result};

pub struct FrameCheck {
    state: DeviceState,
    properties: StorageProperties,
    iframe: i64,
}

impl FrameCheck {
    pub fn new() -> Self {
        Self {
            state: DeviceState::AwaitingConfiguration,
            properties: StorageProperties::default(),
            iframe: 0,
        }
    }

    /// Id the next record must carry.
    pub fn expected_frame_id(&self) -> i64 {
        self.iframe
    }
}

impl Default for FrameCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for FrameCheck {
    fn name(&self) -> &'static str {
        "framecheck"
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

    #[instrument(skip_all, fields(nbytes = frames.len()))]
    fn append(&mut self, frames: &[u8]) -> Result<usize> {
        expect_state(self.state, DeviceState::Running)?;
        for record in Records::new(frames) {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    error!("framecheck: {e}");
                    self.stop();
                    return Err(e);
                }
            };
            if record.header.frame_id != self.iframe {
                error!(
                    "framecheck: expected frame id {} but got {} at byte {}",
                    self.iframe, record.header.frame_id, record.offset
                );
                self.stop();
                return Err(Error::FrameSequence {
                    expected: self.iframe,
                    actual: record.header.frame_id,
                    consumed: record.offset,
                });
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

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::capture::frame::tests::record;

    fn started(first_frame_id: i64) -> FrameCheck {
        let mut check = FrameCheck::new();
        check
            .configure(&StorageProperties {
                first_frame_id,
                ..StorageProperties::default()
            })
            .unwrap();
        check.start().unwrap();
        check
    }

    /// Records with ids `first..first + k`, payload lengths varying per record.
    fn run(first: i64, k: usize) -> (BytesMut, Vec<usize>) {
        let mut out = BytesMut::new();
        let mut offsets = Vec::new();
        for i in 0..k {
            offsets.push(out.len());
            out.extend_from_slice(&record(first + i as i64, &vec![i as u8; 3 + 7 * i]));
        }
        (out, offsets)
    }

    #[test]
    fn accepts_consecutive_ids() {
        let mut check = started(5);
        let (buf, _) = run(5, 6);
        assert_eq!(check.append(&buf).unwrap(), buf.len());
        assert_eq!(check.expected_frame_id(), 11);
        assert_eq!(check.state(), DeviceState::Running);

        // Ordering carries across calls.
        let (more, _) = run(11, 2);
        assert_eq!(check.append(&more).unwrap(), more.len());
    }

    #[test]
    fn stops_at_first_bad_id() {
        for j in 0..6 {
            let mut check = started(5);
            let (mut buf, offsets) = run(5, 6);
            let at = offsets[j];
            buf[at..at + 8].copy_from_slice(&1234i64.to_le_bytes());

            let err = check.append(&buf).unwrap_err();
            assert_eq!(err.bytes_consumed(), at);
            match err {
                Error::FrameSequence {
                    expected, actual, ..
                } => {
                    assert_eq!(expected, 5 + j as i64);
                    assert_eq!(actual, 1234);
                }
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(check.state(), DeviceState::Armed);
        }
    }

    #[test]
    fn gap_is_a_sequence_error() {
        let mut check = started(0);
        let mut buf = record(0, &[0; 4]);
        let second = buf.len();
        buf.extend_from_slice(&record(2, &[0; 4]));
        let err = check.append(&buf).unwrap_err();
        assert_eq!(err.bytes_consumed(), second);
    }

    #[test]
    fn malformed_tail_reports_valid_prefix() {
        let mut check = started(0);
        let mut buf = record(0, &[0; 4]);
        let first = buf.len();
        buf.extend_from_slice(&[0u8; 10]);
        let err = check.append(&buf).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
        assert_eq!(err.bytes_consumed(), first);
        assert_eq!(check.state(), DeviceState::Armed);
    }

    #[test]
    fn restart_reseeds_counter() {
        let mut check = started(5);
        let (buf, _) = run(5, 2);
        check.append(&buf).unwrap();
        check.stop();
        check.start().unwrap();
        assert_eq!(check.expected_frame_id(), 5);
    }
}
