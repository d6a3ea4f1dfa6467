//! Lock-free acquisition counters

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

#[derive(Default)]
struct Counters {
    frames_pulled: AtomicU64,
    frames_written: AtomicU64,
    bytes_written: AtomicU64,
    frames_skipped: AtomicU64,
}

/// Counters shared between the puller thread and observers
#[derive(Default)]
pub struct PipelineStats {
    counters: CachePadded<Counters>,
}

/// Point-in-time copy of `PipelineStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_pulled: u64,
    pub frames_written: u64,
    pub bytes_written: u64,
    /// Frames the camera produced that the puller never observed.
    pub frames_skipped: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pulled frame; `skipped` is the id gap since the previous one.
    pub fn record_pulled(&self, skipped: u64) {
        self.counters.frames_pulled.fetch_add(1, Ordering::Relaxed);
        if skipped > 0 {
            self.counters
                .frames_skipped
                .fetch_add(skipped, Ordering::Relaxed);
        }
    }

    pub fn record_written(&self, nbytes: usize) {
        self.counters.frames_written.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_written
            .fetch_add(nbytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_pulled: self.counters.frames_pulled.load(Ordering::Relaxed),
            frames_written: self.counters.frames_written.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            frames_skipped: self.counters.frames_skipped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates() {
        let stats = PipelineStats::new();
        stats.record_pulled(0);
        stats.record_pulled(3);
        stats.record_written(100);
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                frames_pulled: 2,
                frames_written: 1,
                bytes_written: 100,
                frames_skipped: 3,
            }
        );
    }
}
