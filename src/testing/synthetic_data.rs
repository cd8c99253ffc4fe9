//! Synthetic raw frame generators.

/// Packed RGB frame with a gradient that changes every frame.
///
/// Rows are `stride` pixels long and the buffer holds `rows` rows; bytes past
/// the visible `width` x `height` area are zero.
pub fn synthetic_rgb3_frame(
    frame_number: u64,
    width: u32,
    height: u32,
    stride: u32,
    rows: u32,
) -> Vec<u8> {
    let stride = stride.max(width) as usize;
    let mut data = vec![0u8; 3 * stride * rows.max(height) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let idx = (y * stride + x) * 3;
            data[idx] = base.wrapping_add((x % 256) as u8); // R
            data[idx + 1] = base.wrapping_add((y % 256) as u8); // G
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8); // B
        }
    }

    data
}

/// YUYV frame with a horizontal luma ramp and neutral chroma.
pub fn synthetic_yuyv_frame(frame_number: u64, width: u32, height: u32, stride: u32) -> Vec<u8> {
    let stride = (stride as usize).max(2 * width as usize);
    let mut data = vec![0u8; stride * height as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height as usize {
        let row = &mut data[y * stride..(y + 1) * stride];
        for (x, macropixel) in row.chunks_exact_mut(4).enumerate() {
            let luma = base.wrapping_add((x * 2 % 256) as u8);
            macropixel.copy_from_slice(&[luma, 128, luma.wrapping_add(1), 128]);
        }
    }

    data
}
