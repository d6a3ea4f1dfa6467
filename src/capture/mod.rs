pub mod binning;
pub mod frame;
pub mod pattern;
pub mod props;
pub mod shape;
pub mod simulated;

pub use frame::{encode_video_frame, ImageInfo, Record, Records, VideoFrameHeader};
pub use props::{CameraProperties, CameraPropertyMetadata, Extent, Trigger};
pub use shape::{ImageDims, ImageShape, ImageStrides, SampleType, SampleTypeSet};
pub use simulated::{SimulatedCamera, SimulatedKind};

use crate::device::DeviceState;
use crate::error::Result;

/// Result of a successful `Camera::pull_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulled {
    /// One frame was copied into the caller's buffer.
    Frame(ImageInfo),
    /// The camera stopped while the caller was waiting; nothing was copied.
    Stopped,
}

/// Device contract implemented by every camera.
///
/// Methods take `&self` so a camera can be shared between a consumer parked
/// in `pull_frame` and a controller that triggers or stops it.
pub trait Camera: Send + Sync {
    fn state(&self) -> DeviceState;

    /// Bounds derived from the current configuration.
    fn metadata(&self) -> CameraPropertyMetadata;

    /// Applies `properties`, clamping the shape into the metadata bounds.
    /// On error the previous configuration stays in effect.
    fn configure(&self, properties: &CameraProperties) -> Result<DeviceState>;

    /// Last successfully applied configuration.
    fn query(&self) -> CameraProperties;

    /// Shape of the frames `pull_frame` produces.
    fn shape(&self) -> ImageShape;

    fn start(&self) -> Result<DeviceState>;

    /// Stops acquisition, releasing any thread blocked on the camera.
    fn stop(&self) -> DeviceState;

    /// Fires the software trigger.
    fn execute_trigger(&self) -> DeviceState;

    /// Blocks until a frame newer than the last one pulled is available, then
    /// copies it into the front of `buf`.
    fn pull_frame(&self, buf: &mut [u8]) -> Result<Pulled>;
}
