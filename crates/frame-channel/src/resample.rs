//! Nearest-neighbour resampling to the published geometry

use fourcell_core::{Frame, FrameGeometry};

/// Scale `frame` to `target`. Missing channels repeat the source's last one,
/// extra ones are dropped.
pub fn resample_nearest(frame: &Frame, target: FrameGeometry) -> Frame {
    if frame.geometry == target {
        return frame.clone();
    }

    let src = frame.geometry;
    let mut out = Frame::black(target);
    if src.byte_len() == 0 || frame.data.len() < src.byte_len() {
        return out;
    }

    let src_stride = src.stride();
    let dst_stride = target.stride();
    let src_ch = src.channels as usize;
    let dst_ch = target.channels as usize;

    for y in 0..target.height as usize {
        let sy = y * src.height as usize / target.height as usize;
        let src_row = &frame.data[sy * src_stride..(sy + 1) * src_stride];
        let dst_row = &mut out.data[y * dst_stride..(y + 1) * dst_stride];

        for x in 0..target.width as usize {
            let sx = x * src.width as usize / target.width as usize;
            let pixel = &src_row[sx * src_ch..(sx + 1) * src_ch];
            for c in 0..dst_ch {
                dst_row[x * dst_ch + c] = pixel[c.min(src_ch - 1)];
            }
        }
    }
    out
}
