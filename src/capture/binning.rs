//! In-place 2×2 box downsampling of 8-bit images
//!
//! Each pass averages every 2×2 block and packs the results densely at the
//! start of the buffer, so after `log2(factor)` passes the first
//! `(w / factor) * (h / factor)` bytes hold the binned image. Odd trailing
//! rows and columns are dropped.

/// Output pixels produced per iteration of the lane kernel.
const LANES: usize = 16;

/// Applies `log2(factor)` binning passes to a `width` × `height` image.
/// Factor 1 (or 0) leaves the buffer untouched.
pub fn bin_in_place(buf: &mut [u8], width: u32, height: u32, factor: u8) {
    let mut w = width as usize;
    let mut h = height as usize;
    let mut b = factor >> 1;
    while b != 0 {
        bin2(buf, w, h);
        b >>= 1;
        w >>= 1;
        h >>= 1;
    }
}

/// One binning pass, using the lane kernel where the target vectorizes it.
#[cfg(any(target_feature = "avx2", target_feature = "neon"))]
pub fn bin2(buf: &mut [u8], w: usize, h: usize) {
    bin2_lanes(buf, w, h);
}

/// One binning pass, using the lane kernel where the target vectorizes it.
#[cfg(not(any(target_feature = "avx2", target_feature = "neon")))]
pub fn bin2(buf: &mut [u8], w: usize, h: usize) {
    bin2_scalar(buf, w, h);
}

#[inline]
fn mean4(a: u8, b: u8, c: u8, d: u8) -> u8 {
    let sum = u16::from(a) + u16::from(b) + u16::from(c) + u16::from(d);
    (sum >> 2) as u8
}

pub fn bin2_scalar(buf: &mut [u8], w: usize, h: usize) {
    assert!(buf.len() >= w * h, "buffer smaller than image");
    let (ow, oh) = (w / 2, h / 2);
    for y in 0..oh {
        bin2_row_tail(buf, w, ow, y, 0);
    }
}

/// Processes `LANES` output pixels per step on fixed-size arrays so the
/// compiler can keep the whole block in vector registers.
pub fn bin2_lanes(buf: &mut [u8], w: usize, h: usize) {
    assert!(buf.len() >= w * h, "buffer smaller than image");
    let (ow, oh) = (w / 2, h / 2);
    for y in 0..oh {
        let mut x = 0;
        while x + LANES <= ow {
            let top = 2 * y * w + 2 * x;
            let bottom = top + w;
            let mut sums = [0u16; LANES];
            {
                let t = &buf[top..top + 2 * LANES];
                let b = &buf[bottom..bottom + 2 * LANES];
                for (i, sum) in sums.iter_mut().enumerate() {
                    *sum = u16::from(t[2 * i])
                        + u16::from(t[2 * i + 1])
                        + u16::from(b[2 * i])
                        + u16::from(b[2 * i + 1]);
                }
            }
            // The destination block never reaches past `top + 2 * LANES`,
            // all of which has already been read.
            let out = y * ow + x;
            for (dst, sum) in buf[out..out + LANES].iter_mut().zip(sums) {
                *dst = (sum >> 2) as u8;
            }
            x += LANES;
        }
        bin2_row_tail(buf, w, ow, y, x);
    }
}

fn bin2_row_tail(buf: &mut [u8], w: usize, ow: usize, y: usize, from: usize) {
    for x in from..ow {
        let top = 2 * y * w + 2 * x;
        let bottom = top + w;
        buf[y * ow + x] = mean4(buf[top], buf[top + 1], buf[bottom], buf[bottom + 1]);
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn averages_each_block() {
        #[rustfmt::skip]
        let mut buf = vec![
            0,   4,   10, 10,
            8,   4,   10, 11,
            255, 255, 1,  2,
            255, 254, 3,  4,
        ];
        bin2(&mut buf, 4, 4);
        assert_eq!(&buf[..4], &[4, 10, 254, 2]);
    }

    #[test]
    fn odd_edges_are_dropped() {
        let mut buf: Vec<u8> = (0..15).collect(); // 5 × 3
        bin2_scalar(&mut buf, 5, 3);
        // blocks (0,1,5,6) and (2,3,7,8)
        assert_eq!(&buf[..2], &[3, 5]);
    }

    #[test]
    fn factor_one_is_noop() {
        let mut buf: Vec<u8> = (0..64).collect();
        let before = buf.clone();
        bin_in_place(&mut buf, 8, 8, 1);
        assert_eq!(buf, before);
    }

    #[test]
    fn factor_four_of_uniform_image() {
        let mut buf = vec![77u8; 16 * 8];
        bin_in_place(&mut buf, 16, 8, 4);
        assert_eq!(&buf[..8], &[77; 8]);
    }

    #[test]
    fn lane_kernel_matches_scalar() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        for (w, h) in [(64, 64), (70, 33), (2, 2), (31, 17), (200, 6), (1, 9)] {
            let mut a = vec![0u8; w * h];
            rng.fill(&mut a[..]);
            let mut b = a.clone();
            bin2_scalar(&mut a, w, h);
            bin2_lanes(&mut b, w, h);
            assert_eq!(a, b, "{w}x{h}");
        }
    }

    #[test]
    fn repeated_passes_match_for_all_factors() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(8);
        for factor in [2u8, 4, 8] {
            let (w, h) = (96usize, 80usize);
            let mut a = vec![0u8; w * h];
            rng.fill(&mut a[..]);
            let mut b = a.clone();

            let (mut pw, mut ph) = (w, h);
            let mut f = factor >> 1;
            while f != 0 {
                bin2_scalar(&mut a, pw, ph);
                bin2_lanes(&mut b, pw, ph);
                f >>= 1;
                pw >>= 1;
                ph >>= 1;
            }
            let n = (w / factor as usize) * (h / factor as usize);
            assert_eq!(&a[..n], &b[..n]);
        }
    }
}
