//! Pixel format conversion for device buffers

/// Packed YUYV 4:2:2 to interleaved BGR, BT.601 limited range.
///
/// Returns `None` when `src` holds less than one full frame.
pub fn yuyv_to_bgr(src: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = width as usize * height as usize;
    if pixels % 2 != 0 || src.len() < pixels * 2 {
        return None;
    }

    let mut out = Vec::with_capacity(pixels * 3);
    for quad in src[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        push_bgr(&mut out, y0, u, v);
        push_bgr(&mut out, y1, u, v);
    }
    Some(out)
}

fn push_bgr(out: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let c = (y as i32 - 16).max(0) * 298;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (c + 409 * e + 128) >> 8;
    let g = (c - 100 * d - 208 * e + 128) >> 8;
    let b = (c + 516 * d + 128) >> 8;
    out.extend_from_slice(&[clamp(b), clamp(g), clamp(r)]);
}

fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}
