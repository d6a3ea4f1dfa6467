//! Simulated camera
//!
//! A streamer thread synthesizes frames into a single full-resolution buffer.
//! The buffer, the frame counters and the software trigger flag live behind
//! one mutex; the streamer holds it from synthesis until the frame is
//! published, so `pull_frame` never copies a half-written image.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use super::binning;
use super::frame::ImageInfo;
use super::pattern;
use super::props::{
    CameraProperties, CameraPropertyMetadata, Extent, ExtentBounds, SignalKind, Trigger,
    TriggerCapabilities, TriggerCapability, TriggerEdge,
};
use super::shape::{ImageShape, SampleType, SampleTypeSet};
use super::{Camera, Pulled};
use crate::device::{Bounds, DeviceState};
use crate::error::{Error, Result};
use crate::utils::{micros_f32, monotonic_ns, Throttle};

const MAX_IMAGE_WIDTH: u32 = 1 << 13;
const MAX_IMAGE_HEIGHT: u32 = 1 << 13;

/// Frame content source, fixed when the camera is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedKind {
    /// Uniform random bytes.
    Random,
    /// Animated rings from the shared pattern clock.
    Pattern,
    /// Buffer left as allocated.
    Empty,
}

/// State shared between the streamer and its consumers.
struct Image {
    state: DeviceState,
    properties: CameraProperties,
    shape: ImageShape,
    data: Vec<u8>,
    frame_id: i64,
    last_emitted_frame_id: i64,
    hardware_timestamp: u64,
    triggered: bool,
}

impl Image {
    fn full_resolution(&self) -> (ImageShape, [u32; 2]) {
        let p = &self.properties;
        let b = u32::from(p.binning);
        let shape = ImageShape::mono(b * p.shape.x, b * p.shape.y, self.shape.sample_type);
        (shape, [b * p.offset.x, b * p.offset.y])
    }
}

struct Shared {
    kind: SimulatedKind,
    is_running: AtomicBool,
    image: Mutex<Image>,
    frame_ready: Condvar,
    trigger_ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Image> {
        self.image.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    fn fire_trigger(&self) {
        let mut image = self.lock();
        image.triggered = true;
        self.trigger_ready.notify_all();
    }
}

pub struct SimulatedCamera {
    shared: Arc<Shared>,
    streamer: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedCamera {
    pub fn new(kind: SimulatedKind) -> Self {
        let properties = CameraProperties::default();
        let shape = ImageShape::mono(properties.shape.x, properties.shape.y, properties.pixel_type);
        Self {
            shared: Arc::new(Shared {
                kind,
                is_running: AtomicBool::new(false),
                image: Mutex::new(Image {
                    state: DeviceState::AwaitingConfiguration,
                    properties,
                    shape,
                    data: Vec::new(),
                    frame_id: -1,
                    last_emitted_frame_id: -1,
                    hardware_timestamp: 0,
                    triggered: false,
                }),
                frame_ready: Condvar::new(),
                trigger_ready: Condvar::new(),
            }),
            streamer: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> SimulatedKind {
        self.shared.kind
    }

    fn streamer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.streamer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SimulatedCamera {
    fn drop(&mut self) {
        if self.streamer().is_some() {
            self.stop();
        }
    }
}

fn metadata_for(p: &CameraProperties) -> CameraPropertyMetadata {
    let binning = f32::from(p.binning.max(1));
    // current shape
    let (cw, ch) = (p.shape.x as f32, p.shape.y as f32);
    // max shape
    let w = MAX_IMAGE_WIDTH as f32 / binning;
    let h = MAX_IMAGE_HEIGHT as f32 / binning;
    // max offset, keeping at least one pixel
    let ox = (w - cw - 1.0).max(0.0);
    let oy = (h - ch - 1.0).max(0.0);

    CameraPropertyMetadata {
        exposure_time_us: Bounds::writable(0.0, 1.0e6),
        line_interval_us: Bounds::READ_ONLY,
        readout_direction: Bounds::READ_ONLY,
        binning: Bounds::writable(1.0, 8.0),
        shape: ExtentBounds {
            x: Bounds::writable(1.0, w),
            y: Bounds::writable(1.0, h),
        },
        offset: ExtentBounds {
            x: Bounds::writable(0.0, ox),
            y: Bounds::writable(0.0, oy),
        },
        supported_pixel_types: SampleTypeSet::of(&[
            SampleType::U8,
            SampleType::U16,
            SampleType::I8,
            SampleType::I16,
            SampleType::F32,
        ]),
        digital_lines: vec!["software".to_owned()],
        triggers: TriggerCapabilities {
            frame_start: TriggerCapability {
                input: true,
                output: false,
            },
        },
    }
}

fn clamp_to(v: u32, bounds: &Bounds) -> u32 {
    v.clamp(bounds.low as u32, bounds.high as u32)
}

fn allocate(nbytes: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(nbytes)
        .map_err(|_| Error::Allocation(nbytes))?;
    data.resize(nbytes, 0);
    Ok(data)
}

impl Camera for SimulatedCamera {
    fn state(&self) -> DeviceState {
        self.shared.lock().state
    }

    fn metadata(&self) -> CameraPropertyMetadata {
        metadata_for(&self.shared.lock().properties)
    }

    #[instrument(skip_all, fields(kind = ?self.shared.kind))]
    fn configure(&self, properties: &CameraProperties) -> Result<DeviceState> {
        let mut props = *properties;
        if props.binning == 0 {
            props.binning = 1;
        }
        if !props.binning.is_power_of_two() || props.binning > 8 {
            error!("Binning must be a power of two. Got {}.", props.binning);
            return Err(Error::InvalidBinning(props.binning));
        }
        if props.binning > 1 && props.pixel_type.bytes() != 1 {
            error!(
                "Binning {} requested for {} samples; only 8-bit samples can be binned.",
                props.binning, props.pixel_type
            );
            return Err(Error::BinningRequiresByteSamples(props.pixel_type));
        }

        let trigger_was_enabled = self.shared.lock().properties.input_triggers.frame_start.enable;
        if trigger_was_enabled && !props.input_triggers.frame_start.enable {
            // A streamer parked on the trigger must not outlive the trigger.
            self.shared.fire_trigger();
        }

        // Only the software line exists.
        props.input_triggers.frame_start = Trigger {
            enable: props.input_triggers.frame_start.enable,
            line: 0,
            kind: SignalKind::Input,
            edge: TriggerEdge::Rising,
        };

        let meta = metadata_for(&props);
        let shape = ImageShape::mono(
            clamp_to(props.shape.x, &meta.shape.x),
            clamp_to(props.shape.y, &meta.shape.y),
            props.pixel_type,
        );
        props.shape = Extent {
            x: shape.dims.width,
            y: shape.dims.height,
        };
        // Offset bounds depend on the clamped shape.
        let meta = metadata_for(&props);
        props.offset = Extent {
            x: clamp_to(props.offset.x, &meta.offset.x),
            y: clamp_to(props.offset.y, &meta.offset.y),
        };

        let b = u32::from(props.binning);
        let full = ImageShape::mono(b * shape.dims.width, b * shape.dims.height, props.pixel_type);
        let nbytes = full.aligned_bytes_of_image();
        let data = allocate(nbytes);

        let mut image = self.shared.lock();
        let data = match data {
            Ok(data) => data,
            Err(e) => {
                error!("Allocation of {nbytes} bytes failed.");
                if image.state != DeviceState::Running {
                    image.state = DeviceState::AwaitingConfiguration;
                }
                return Err(e);
            }
        };
        image.properties = props;
        image.shape = shape;
        image.data = data;
        // Wakes a streamer parked on a trigger that is now disabled.
        self.shared.trigger_ready.notify_all();
        if image.state != DeviceState::Running {
            image.state = DeviceState::Armed;
        }
        debug!(
            width = shape.dims.width,
            height = shape.dims.height,
            binning = props.binning,
            pixel_type = %props.pixel_type,
            "Configured"
        );
        Ok(image.state)
    }

    fn query(&self) -> CameraProperties {
        self.shared.lock().properties
    }

    fn shape(&self) -> ImageShape {
        self.shared.lock().shape
    }

    #[instrument(skip_all, fields(kind = ?self.shared.kind))]
    fn start(&self) -> Result<DeviceState> {
        let mut streamer = self.streamer();
        {
            let mut image = self.shared.lock();
            if image.state != DeviceState::Armed {
                error!("Cannot start from state {}", image.state);
                return Err(Error::InvalidState {
                    expected: DeviceState::Armed,
                    found: image.state,
                });
            }
            image.frame_id = -1;
            image.last_emitted_frame_id = -1;
            image.state = DeviceState::Running;
            self.shared.is_running.store(true, Ordering::Release);
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("simcam-streamer".into())
            .spawn(move || stream(&shared));
        match spawned {
            Ok(handle) => {
                *streamer = Some(handle);
                info!("Simulated camera started");
                Ok(DeviceState::Running)
            }
            Err(e) => {
                error!("Failed to launch streamer thread: {e}");
                self.shared.is_running.store(false, Ordering::Release);
                self.shared.lock().state = DeviceState::Armed;
                Err(Error::Io(e))
            }
        }
    }

    #[instrument(skip_all, fields(kind = ?self.shared.kind))]
    fn stop(&self) -> DeviceState {
        self.shared.is_running.store(false, Ordering::Release);
        {
            let mut image = self.shared.lock();
            image.triggered = true;
            self.shared.trigger_ready.notify_all();
            self.shared.frame_ready.notify_all();
        }

        let handle = self.streamer().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Streamer thread panicked");
            }
            info!("Simulated camera stopped");
        }

        let mut image = self.shared.lock();
        // The release above must not leak into the next acquisition.
        image.triggered = false;
        if image.state == DeviceState::Running {
            image.state = DeviceState::Armed;
        }
        image.state
    }

    fn execute_trigger(&self) -> DeviceState {
        self.shared.fire_trigger();
        self.state()
    }

    fn pull_frame(&self, buf: &mut [u8]) -> Result<Pulled> {
        let shared = &*self.shared;
        let mut image = shared.lock();
        let required = image.shape.bytes_of_image();
        if buf.len() < required {
            error!("Buffer too small: need {required} bytes, got {}", buf.len());
            return Err(Error::BufferTooSmall {
                required,
                capacity: buf.len(),
            });
        }
        if !shared.is_running() {
            error!("Frame requested from a camera that is not running");
            return Err(Error::NotRunning);
        }

        image = shared
            .frame_ready
            .wait_while(image, |im| {
                shared.is_running() && im.last_emitted_frame_id >= im.frame_id
            })
            .unwrap_or_else(PoisonError::into_inner);
        image.last_emitted_frame_id = image.frame_id;
        if !shared.is_running() {
            debug!("Camera stopped while waiting for a frame");
            return Ok(Pulled::Stopped);
        }

        // The camera may have been reconfigured while we waited.
        let nbytes = image.shape.bytes_of_image();
        if buf.len() < nbytes {
            error!("Buffer too small: need {nbytes} bytes, got {}", buf.len());
            return Err(Error::BufferTooSmall {
                required: nbytes,
                capacity: buf.len(),
            });
        }
        buf[..nbytes].copy_from_slice(&image.data[..nbytes]);
        Ok(Pulled::Frame(ImageInfo {
            shape: image.shape,
            hardware_frame_id: image.frame_id,
            hardware_timestamp: image.hardware_timestamp,
        }))
    }
}

/// Marks the camera stopped and wakes consumers however the streamer exits.
struct StreamerExit<'a> {
    shared: &'a Shared,
}

impl Drop for StreamerExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Streamer thread exiting abnormally");
        }
        self.shared.is_running.store(false, Ordering::Release);
        let _image = self.shared.lock();
        self.shared.frame_ready.notify_all();
    }
}

/// Streamer thread body.
fn stream(shared: &Shared) {
    let _exit = StreamerExit { shared };
    let mut throttle = Throttle::start();
    let mut rng = rand::rng();

    while shared.is_running() {
        let mut image = shared.lock();
        let (full, origin) = image.full_resolution();

        match shared.kind {
            SimulatedKind::Random => rng.fill(&mut image.data[..]),
            SimulatedKind::Pattern => pattern::fill_pattern(
                &full,
                origin[0] as f32,
                origin[1] as f32,
                &mut image.data,
            ),
            SimulatedKind::Empty => {}
        }

        let factor = image.properties.binning;
        binning::bin_in_place(&mut image.data, full.dims.width, full.dims.height, factor);

        if image.properties.input_triggers.frame_start.enable {
            image = shared
                .trigger_ready
                .wait_while(image, |im| {
                    im.properties.input_triggers.frame_start.enable
                        && !im.triggered
                        && shared.is_running()
                })
                .unwrap_or_else(PoisonError::into_inner);
            image.triggered = false;
        }

        image.hardware_timestamp = monotonic_ns();
        image.frame_id += 1;

        shared.frame_ready.notify_all();
        let exposure = micros_f32(image.properties.exposure_time_us);
        drop(image);

        if shared.is_running() {
            throttle.wait(exposure);
        }
    }
}
