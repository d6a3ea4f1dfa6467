//! Image geometry: dimensions, strides and sample types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pixel sample types a camera may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum SampleType {
    U8 = 0,
    U16 = 1,
    I8 = 2,
    I16 = 3,
    F32 = 4,
    U10 = 5,
    U12 = 6,
    U14 = 7,
}

impl SampleType {
    pub const ALL: [Self; 8] = [
        Self::U8,
        Self::U16,
        Self::I8,
        Self::I16,
        Self::F32,
        Self::U10,
        Self::U12,
        Self::U14,
    ];

    /// Storage width of one sample.
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::U10 | Self::U12 | Self::U14 => 2,
            Self::F32 => 4,
        }
    }

    /// Wire tag used in the frame header.
    pub const fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::F32 => "f32",
            Self::U10 => "u10",
            Self::U12 => "u12",
            Self::U14 => "u14",
        };
        f.write_str(name)
    }
}

/// Set of sample types, one bit per `SampleType` tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleTypeSet(u64);

impl SampleTypeSet {
    pub fn of(types: &[SampleType]) -> Self {
        Self(types.iter().fold(0, |bits, t| bits | (1 << t.tag())))
    }

    pub fn contains(self, sample_type: SampleType) -> bool {
        self.0 & (1 << sample_type.tag()) != 0
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageDims {
    pub channels: u32,
    pub width: u32,
    pub height: u32,
    pub planes: u32,
}

impl ImageDims {
    /// Single channel, single plane image.
    pub fn mono(width: u32, height: u32) -> Self {
        Self {
            channels: 1,
            width,
            height,
            planes: 1,
        }
    }

    fn as_array(&self) -> [u32; 4] {
        [self.channels, self.width, self.height, self.planes]
    }
}

/// Element strides, in samples, per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStrides {
    pub channels: i64,
    pub width: i64,
    pub height: i64,
    pub planes: i64,
}

impl ImageStrides {
    /// Dense strides for axis order channels → width → height → planes.
    pub fn dense(dims: &ImageDims) -> Self {
        let d = dims.as_array();
        let mut st = [1i64; 4];
        for i in 1..4 {
            st[i] = st[i - 1] * i64::from(d[i - 1]);
        }
        Self {
            channels: st[0],
            width: st[1],
            height: st[2],
            planes: st[3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    pub dims: ImageDims,
    pub strides: ImageStrides,
    pub sample_type: SampleType,
}

impl ImageShape {
    pub fn new(dims: ImageDims, sample_type: SampleType) -> Self {
        Self {
            strides: ImageStrides::dense(&dims),
            dims,
            sample_type,
        }
    }

    pub fn mono(width: u32, height: u32, sample_type: SampleType) -> Self {
        Self::new(ImageDims::mono(width, height), sample_type)
    }

    pub fn sample_count(&self) -> usize {
        self.dims
            .as_array()
            .iter()
            .map(|&d| d as usize)
            .product()
    }

    pub fn bytes_of_image(&self) -> usize {
        self.sample_count() * self.sample_type.bytes()
    }

    /// Image size rounded up to a 32 byte boundary.
    pub fn aligned_bytes_of_image(&self) -> usize {
        align32(self.bytes_of_image())
    }
}

pub(crate) fn align32(n: usize) -> usize {
    (n + 31) & !31
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_follow_axis_order() {
        let dims = ImageDims {
            channels: 3,
            width: 640,
            height: 480,
            planes: 2,
        };
        let st = ImageStrides::dense(&dims);
        assert_eq!(st.channels, 1);
        assert_eq!(st.width, 3);
        assert_eq!(st.height, 3 * 640);
        assert_eq!(st.planes, 3 * 640 * 480);
    }

    #[test]
    fn mono_shape_sizes() {
        let shape = ImageShape::mono(33, 10, SampleType::U16);
        assert_eq!(shape.strides.width, 1);
        assert_eq!(shape.strides.height, 33);
        assert_eq!(shape.bytes_of_image(), 33 * 10 * 2);
        assert_eq!(shape.aligned_bytes_of_image(), 672);
    }

    #[test]
    fn sample_type_tags_round_trip() {
        for t in SampleType::ALL {
            assert_eq!(SampleType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(SampleType::from_tag(8), None);
    }

    #[test]
    fn sample_type_set_membership() {
        let set = SampleTypeSet::of(&[SampleType::U8, SampleType::F32]);
        assert!(set.contains(SampleType::U8));
        assert!(set.contains(SampleType::F32));
        assert!(!set.contains(SampleType::U12));
        assert_eq!(set.bits(), 0b1_0001);
    }
}
