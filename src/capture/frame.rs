use bytes::{Buf, BufMut, BytesMut};

use super::shape::{ImageDims, ImageShape, ImageStrides, SampleType};
use crate::error::{Error, Result};

/// Frame metadata returned alongside a pulled image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub shape: ImageShape,
    pub hardware_frame_id: i64,
    pub hardware_timestamp: u64, // ns since the process clock epoch
}

/// Header of a `VideoFrame` wire record.
///
/// Little-endian, 80 bytes:
///
/// | offset | field                                  |
/// |--------|----------------------------------------|
/// | 0      | `frame_id: i64`                        |
/// | 8      | `hardware_timestamp: u64`              |
/// | 16     | `bytes_of_frame: u64` (header+payload) |
/// | 24     | dims, 4 × `u32`                        |
/// | 40     | strides, 4 × `i64`                     |
/// | 72     | sample type tag `u32`                  |
/// | 76     | 4 zero bytes                           |
///
/// The payload follows immediately; the next record starts `bytes_of_frame`
/// bytes after this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrameHeader {
    pub frame_id: i64,
    pub hardware_timestamp: u64,
    pub bytes_of_frame: u64,
    pub shape: ImageShape,
}

impl VideoFrameHeader {
    pub const SIZE: usize = 80;

    pub fn for_image(info: &ImageInfo, payload_len: usize) -> Self {
        Self {
            frame_id: info.hardware_frame_id,
            hardware_timestamp: info.hardware_timestamp,
            bytes_of_frame: (Self::SIZE + payload_len) as u64,
            shape: info.shape,
        }
    }

    pub fn payload_len(&self) -> usize {
        (self.bytes_of_frame as usize).saturating_sub(Self::SIZE)
    }

    pub fn put(&self, out: &mut BytesMut) {
        let s = &self.shape;
        out.reserve(Self::SIZE);
        out.put_i64_le(self.frame_id);
        out.put_u64_le(self.hardware_timestamp);
        out.put_u64_le(self.bytes_of_frame);
        for d in [s.dims.channels, s.dims.width, s.dims.height, s.dims.planes] {
            out.put_u32_le(d);
        }
        for st in [
            s.strides.channels,
            s.strides.width,
            s.strides.height,
            s.strides.planes,
        ] {
            out.put_i64_le(st);
        }
        out.put_u32_le(s.sample_type.tag());
        out.put_u32_le(0);
    }

    /// Parses a header from the front of `buf`. `None` if `buf` is too short
    /// or the sample type tag is unknown.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let mut b = buf.get(..Self::SIZE)?;
        let frame_id = b.get_i64_le();
        let hardware_timestamp = b.get_u64_le();
        let bytes_of_frame = b.get_u64_le();
        let dims = ImageDims {
            channels: b.get_u32_le(),
            width: b.get_u32_le(),
            height: b.get_u32_le(),
            planes: b.get_u32_le(),
        };
        let strides = ImageStrides {
            channels: b.get_i64_le(),
            width: b.get_i64_le(),
            height: b.get_i64_le(),
            planes: b.get_i64_le(),
        };
        let sample_type = SampleType::from_tag(b.get_u32_le())?;
        Some(Self {
            frame_id,
            hardware_timestamp,
            bytes_of_frame,
            shape: ImageShape {
                dims,
                strides,
                sample_type,
            },
        })
    }
}

/// Appends one complete record (header followed by `payload`) to `out`.
pub fn encode_video_frame(info: &ImageInfo, payload: &[u8], out: &mut BytesMut) {
    out.reserve(VideoFrameHeader::SIZE + payload.len());
    VideoFrameHeader::for_image(info, payload.len()).put(out);
    out.put_slice(payload);
}

/// One record located inside a run of concatenated records.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Byte offset of the record within the run.
    pub offset: usize,
    pub header: VideoFrameHeader,
    pub payload: &'a [u8],
}

/// Walks a run of back-to-back `VideoFrame` records.
///
/// Yields `Error::MalformedRecord` once, then stops, when a header is
/// truncated or declares a length that is shorter than the header or runs
/// past the end of the buffer.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Records<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }
        let offset = self.offset;
        let buf = self.buf;
        let rest = &buf[offset..];
        let record = VideoFrameHeader::parse(rest).and_then(|header| {
            let len = usize::try_from(header.bytes_of_frame).ok()?;
            if len < VideoFrameHeader::SIZE || len > rest.len() {
                return None;
            }
            Some(Record {
                offset,
                header,
                payload: &rest[VideoFrameHeader::SIZE..len],
            })
        });
        match record {
            Some(record) => {
                self.offset += record.header.bytes_of_frame as usize;
                Some(Ok(record))
            }
            None => {
                self.failed = true;
                Some(Err(Error::MalformedRecord { offset }))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(frame_id: i64, payload: &[u8]) -> BytesMut {
        let info = ImageInfo {
            shape: ImageShape::mono(payload.len() as u32, 1, SampleType::U8),
            hardware_frame_id: frame_id,
            hardware_timestamp: 1_000 + frame_id as u64,
        };
        let mut out = BytesMut::new();
        encode_video_frame(&info, payload, &mut out);
        out
    }

    #[test]
    fn header_layout() {
        let buf = record(7, &[1, 2, 3]);
        assert_eq!(buf.len(), VideoFrameHeader::SIZE + 3);
        assert_eq!(&buf[0..8], &7i64.to_le_bytes());
        assert_eq!(&buf[16..24], &83u64.to_le_bytes());
        assert_eq!(&buf[28..32], &3u32.to_le_bytes()); // width
        assert_eq!(&buf[72..76], &SampleType::U8.tag().to_le_bytes());
        assert_eq!(&buf[76..80], &[0; 4]);
        assert_eq!(&buf[80..], &[1, 2, 3]);

        let header = VideoFrameHeader::parse(&buf).unwrap();
        assert_eq!(header.frame_id, 7);
        assert_eq!(header.hardware_timestamp, 1_007);
        assert_eq!(header.payload_len(), 3);
        assert_eq!(header.shape.strides.height, 3);
    }

    #[test]
    fn walks_concatenated_records() {
        let mut run = record(0, &[9; 5]);
        run.extend_from_slice(&record(1, &[]));
        run.extend_from_slice(&record(2, &[4; 17]));

        let records: Vec<_> = Records::new(&run).map(|r| r.unwrap()).collect();
        let ids: Vec<_> = records.iter().map(|r| r.header.frame_id).collect();
        assert_eq!(ids, [0, 1, 2]);
        assert_eq!(records[1].offset, 85);
        assert_eq!(records[2].offset, 165);
        assert_eq!(records[2].payload, &[4; 17]);
    }

    #[test]
    fn truncated_record_is_malformed() {
        let mut run = record(0, &[1; 4]);
        let second = record(1, &[2; 4]);
        run.extend_from_slice(&second[..40]);

        let mut it = Records::new(&run);
        assert!(it.next().unwrap().is_ok());
        match it.next() {
            Some(Err(Error::MalformedRecord { offset })) => assert_eq!(offset, 84),
            other => panic!("unexpected {other:?}"),
        }
        assert!(it.next().is_none());
    }

    #[test]
    fn zero_length_record_is_malformed() {
        let mut run = record(0, &[]);
        run[16..24].copy_from_slice(&0u64.to_le_bytes());
        assert!(matches!(
            Records::new(&run).next(),
            Some(Err(Error::MalformedRecord { offset: 0 }))
        ));
    }
}
