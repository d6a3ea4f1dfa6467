//! Camera → storage acquisition loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::{Bytes, BytesMut};
use flume::Sender;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::stats::{PipelineStats, StatsSnapshot};
use crate::capture::{encode_video_frame, Camera, Pulled, VideoFrameHeader};
use crate::error::Result;
use crate::storage::Storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Frames to acquire; 0 runs until aborted.
    pub max_frame_count: u64,
    /// Encoded records buffered between the puller and the writer.
    pub queue_depth: usize,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            max_frame_count: 10,
            queue_depth: 8,
        }
    }
}

/// Stops a running `Acquisition` from any thread.
#[derive(Clone)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
    camera: Arc<dyn Camera>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
        self.camera.stop();
    }
}

/// Streams frames from one camera into one storage backend.
///
/// A puller thread pulls and encodes frames; the thread calling `run` is the
/// storage backend's single writer.
pub struct Acquisition {
    camera: Arc<dyn Camera>,
    storage: Box<dyn Storage>,
    settings: AcquisitionSettings,
    abort: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
}

impl Acquisition {
    pub fn new(
        camera: Arc<dyn Camera>,
        storage: Box<dyn Storage>,
        settings: AcquisitionSettings,
    ) -> Self {
        Self {
            camera,
            storage,
            settings,
            abort: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(PipelineStats::new()),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            flag: Arc::clone(&self.abort),
            camera: Arc::clone(&self.camera),
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Runs to completion and hands the storage backend back, stopped.
    #[instrument(skip_all, fields(storage = self.storage.name()))]
    pub fn run(mut self) -> Result<(StatsSnapshot, Box<dyn Storage>)> {
        self.storage.reserve_image_shape(&self.camera.shape());
        self.storage.start()?;
        if let Err(e) = self.camera.start() {
            self.storage.stop();
            return Err(e);
        }
        info!(
            max_frame_count = self.settings.max_frame_count,
            "Acquisition started"
        );

        let (tx, rx) = flume::bounded::<Bytes>(self.settings.queue_depth.max(1));
        let puller = {
            let camera = Arc::clone(&self.camera);
            let stats = Arc::clone(&self.stats);
            let abort = Arc::clone(&self.abort);
            let max = self.settings.max_frame_count;
            thread::Builder::new()
                .name("acq-puller".into())
                .spawn(move || pull_frames(camera.as_ref(), &tx, &stats, &abort, max))
        };
        let puller = match puller {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to launch puller thread: {e}");
                self.camera.stop();
                self.storage.stop();
                return Err(e.into());
            }
        };

        let mut result = Ok(());
        for record in rx.iter() {
            match self.storage.append(&record) {
                Ok(n) => self.stats.record_written(n),
                Err(e) => {
                    error!(
                        "Append failed after {} of {} bytes: {e}",
                        e.bytes_consumed(),
                        record.len()
                    );
                    result = Err(e);
                    break;
                }
            }
        }
        // Disconnects a puller blocked on a full queue.
        drop(rx);
        self.camera.stop();
        if puller.join().is_err() {
            error!("Puller thread panicked");
        }
        self.storage.stop();

        let snapshot = self.stats.snapshot();
        info!(?snapshot, "Acquisition finished");
        result.map(|()| (snapshot, self.storage))
    }
}

fn pull_frames(
    camera: &dyn Camera,
    tx: &Sender<Bytes>,
    stats: &PipelineStats,
    abort: &AtomicBool,
    max_frame_count: u64,
) {
    let shape = camera.shape();
    let nbytes = shape.bytes_of_image();
    let mut buf = vec![0u8; nbytes];
    let software_trigger = camera.query().input_triggers.frame_start.enable;
    let mut last_id: Option<i64> = None;
    let mut count = 0u64;

    while (max_frame_count == 0 || count < max_frame_count) && !abort.load(Ordering::Acquire) {
        if software_trigger {
            camera.execute_trigger();
        }
        let info = match camera.pull_frame(&mut buf) {
            Ok(Pulled::Frame(info)) => info,
            Ok(Pulled::Stopped) => {
                debug!("Camera stopped; puller exiting");
                break;
            }
            Err(e) => {
                error!("Pull failed: {e}");
                break;
            }
        };

        let skipped = last_id.map_or(0, |prev| info.hardware_frame_id - prev - 1);
        if skipped > 0 {
            warn!(skipped, frame_id = info.hardware_frame_id, "Frames skipped");
        }
        last_id = Some(info.hardware_frame_id);
        stats.record_pulled(u64::try_from(skipped).unwrap_or(0));

        let mut record = BytesMut::with_capacity(VideoFrameHeader::SIZE + nbytes);
        encode_video_frame(&info, &buf[..nbytes], &mut record);
        if tx.send(record.freeze()).is_err() {
            debug!("Writer gone; puller exiting");
            break;
        }
        count += 1;
    }
}
