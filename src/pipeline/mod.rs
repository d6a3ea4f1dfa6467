pub mod acquisition;
pub mod stats;

pub use acquisition::{AbortHandle, Acquisition, AcquisitionSettings};
pub use stats::{PipelineStats, StatsSnapshot};
