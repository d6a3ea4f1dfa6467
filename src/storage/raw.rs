//! Sequential file sink
//!
//! The file receives the exact byte stream passed to `append`, starting at
//! offset 0, so on disk it is a plain concatenation of `VideoFrame` records.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, error, info, instrument};

use super::{expect_configurable, expect_state, Storage, StorageProperties};
use crate::capture::{ImageShape, VideoFrameHeader};
use crate::device::DeviceState;
use crate::error::{Error, Result};

pub struct Raw {
    state: DeviceState,
    properties: StorageProperties,
    file: Option<File>,
    offset: u64,
}

impl Raw {
    pub fn new() -> Self {
        Self {
            state: DeviceState::AwaitingConfiguration,
            properties: StorageProperties::default(),
            file: None,
            offset: 0,
        }
    }

    /// Bytes written since `start`.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn write_at(&mut self, frames: &[u8]) -> std::io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("file is not open"))?;
        file.seek(SeekFrom::Start(self.offset))?;
        file.write_all(frames)
    }
}

impl Default for Raw {
    fn default() -> Self {
        Self::new()
    }
}

/// The target's directory must exist and accept writes.
fn is_writable(path: &Path) -> bool {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match fs::metadata(dir) {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => false,
    }
}

impl Storage for Raw {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    #[instrument(skip_all, fields(filename = %properties.filename.display()))]
    fn configure(&mut self, properties: &StorageProperties) -> Result<DeviceState> {
        expect_configurable(self.state)?;
        if !is_writable(&properties.filename) {
            error!("raw: cannot write to {}", properties.filename.display());
            self.state = DeviceState::AwaitingConfiguration;
            return Err(Error::Unwritable(properties.filename.clone()));
        }
        self.properties = properties.clone();
        self.state = DeviceState::Armed;
        Ok(self.state)
    }

    fn query(&self) -> &StorageProperties {
        &self.properties
    }

    #[instrument(skip_all, fields(filename = %self.properties.filename.display()))]
    fn start(&mut self) -> Result<DeviceState> {
        expect_state(self.state, DeviceState::Armed)?;
        match File::create(&self.properties.filename) {
            Ok(file) => {
                self.file = Some(file);
                self.offset = 0;
                self.state = DeviceState::Running;
                info!("raw: frame header size {} bytes", VideoFrameHeader::SIZE);
                Ok(self.state)
            }
            Err(e) => {
                error!("raw: failed to create file: {e}");
                self.state = DeviceState::AwaitingConfiguration;
                Err(Error::Io(e))
            }
        }
    }

    fn append(&mut self, frames: &[u8]) -> Result<usize> {
        expect_state(self.state, DeviceState::Running)?;
        match self.write_at(frames) {
            Ok(()) => {
                self.offset += frames.len() as u64;
                Ok(frames.len())
            }
            Err(source) => {
                error!("raw: write of {} bytes at {} failed: {source}", frames.len(), self.offset);
                let offset = self.offset;
                self.stop();
                Err(Error::Write { offset, source })
            }
        }
    }

    fn stop(&mut self) -> DeviceState {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush().and_then(|()| file.sync_all()) {
                error!("raw: failed to flush on close: {e}");
            }
        }
        if self.state == DeviceState::Running {
            self.state = DeviceState::Armed;
        }
        self.state
    }

    fn destroy(&mut self) {
        self.stop();
        self.state = DeviceState::Closed;
    }

    fn reserve_image_shape(&mut self, shape: &ImageShape) {
        debug!("raw: ignoring shape hint of {} bytes", shape.bytes_of_image());
    }
}

impl Drop for Raw {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::tests::record;

    fn props(path: &Path) -> StorageProperties {
        StorageProperties {
            filename: path.to_path_buf(),
            ..StorageProperties::default()
        }
    }

    #[test]
    fn appends_batches_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.raw");
        let mut raw = Raw::new();
        raw.configure(&props(&path)).unwrap();
        raw.start().unwrap();

        let mut b1 = record(0, &[1; 10]);
        b1.extend_from_slice(&record(1, &[2; 3]));
        let b2 = record(2, &[3; 100]);
        assert_eq!(raw.append(&b1).unwrap(), b1.len());
        assert_eq!(raw.append(&b2).unwrap(), b2.len());
        assert_eq!(raw.offset(), (b1.len() + b2.len()) as u64);
        assert_eq!(raw.stop(), DeviceState::Armed);

        let mut expected = b1.to_vec();
        expected.extend_from_slice(&b2);
        assert_eq!(fs::read(&path).unwrap(), expected);
    }

    #[test]
    fn start_truncates_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.raw");
        fs::write(&path, vec![0xEE; 4096]).unwrap();

        let mut raw = Raw::new();
        raw.configure(&props(&path)).unwrap();
        raw.start().unwrap();
        let b = record(0, &[7; 5]);
        raw.append(&b).unwrap();
        raw.stop();
        raw.start().unwrap();
        raw.append(&b).unwrap();
        raw.destroy();

        assert_eq!(fs::read(&path).unwrap(), b.to_vec());
        assert_eq!(raw.state(), DeviceState::Closed);
    }

    #[test]
    fn missing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.raw");
        let mut raw = Raw::new();
        assert!(matches!(raw.configure(&props(&path)), Err(Error::Unwritable(_))));
        assert_eq!(raw.state(), DeviceState::AwaitingConfiguration);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_failure_consumes_nothing() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let mut raw = Raw::new();
        raw.configure(&props(Path::new("/dev/full"))).unwrap();
        raw.start().unwrap();
        let err = raw.append(&record(0, &[1; 64])).unwrap_err();
        assert!(matches!(err, Error::Write { offset: 0, .. }));
        assert_eq!(err.bytes_consumed(), 0);
        assert_eq!(raw.state(), DeviceState::Armed);
        assert_eq!(raw.offset(), 0);
    }

    #[test]
    fn append_requires_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = Raw::new();
        raw.configure(&props(&dir.path().join("a.raw"))).unwrap();
        let err = raw.append(&record(0, &[])).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(err.bytes_consumed(), 0);
        assert_eq!(raw.state(), DeviceState::Armed);
    }
}
