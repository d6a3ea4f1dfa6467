//! Animated concentric-ring test pattern
//!
//! All pattern cameras in the process read the same animation clock, so their
//! output moves in lock-step.

use std::f32::consts::TAU;
use std::time::Instant;

use bytemuck::Pod;
use once_cell::sync::Lazy;
use tracing::error;

use super::shape::{ImageShape, SampleType};

static ANIMATION_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Seconds since the first pattern was requested in this process.
pub fn animation_time_sec() -> f32 {
    ANIMATION_EPOCH.elapsed().as_secs_f32()
}

/// A sample type the pattern can be rendered into.
pub trait Sample: Pod {
    /// Converts with `as` semantics: truncating toward zero, saturating at
    /// the type's range.
    fn from_f32(v: f32) -> Self;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(impl Sample for $t {
            #[inline]
            fn from_f32(v: f32) -> Self {
                v as $t
            }
        })*
    };
}

impl_sample!(u8, i8, u16, i16, f32);

/// Renders the pattern at the current animation time.
///
/// `(ox, oy)` is the region's origin in the full-resolution frame. Sample
/// types the pattern has no renderer for are logged and leave `buf` as is.
pub fn fill_pattern(shape: &ImageShape, ox: f32, oy: f32, buf: &mut [u8]) {
    fill_pattern_at(animation_time_sec(), shape, ox, oy, buf);
}

/// Renders the pattern at time `t` seconds.
pub fn fill_pattern_at(t: f32, shape: &ImageShape, ox: f32, oy: f32, buf: &mut [u8]) {
    match shape.sample_type {
        SampleType::U8 => render::<u8>(t, shape, ox, oy, buf),
        SampleType::I8 => render::<i8>(t, shape, ox, oy, buf),
        SampleType::U16 => render::<u16>(t, shape, ox, oy, buf),
        SampleType::I16 => render::<i16>(t, shape, ox, oy, buf),
        SampleType::F32 => render::<f32>(t, shape, ox, oy, buf),
        other => error!("Unsupported pixel type for the pattern generator: {other}"),
    }
}

fn render<T: Sample>(t: f32, shape: &ImageShape, ox: f32, oy: f32, buf: &mut [u8]) {
    let size = std::mem::size_of::<T>();
    let (w, h) = (shape.dims.width, shape.dims.height);
    let cx = ox + 0.5 * w as f32;
    let cy = oy + 0.5 * h as f32;
    let sx = shape.strides.width as usize;
    let sy = shape.strides.height as usize;

    for y in 0..h {
        let dy = y as f32 - cy;
        let dy2 = dy * dy;
        for x in 0..w {
            let dx = x as f32 - cx;
            let v = 127.0 * ((TAU * (t * 10.0 + (dx * dx + dy2) * 1e-2)).sin() + 1.0);
            let o = (sx * x as usize + sy * y as usize) * size;
            buf[o..o + size].copy_from_slice(bytemuck::bytes_of(&T::from_f32(v)));
        }
    }
}
