//! Area-averaging resampler.
//!
//! Each destination pixel is the mean of the source pixels its footprint
//! covers, weighted by how much of each source pixel is covered.

use image::{ImageBuffer, Rgb};

use crate::video::types::Frame;

/// One source index and the share of the destination pixel it contributes
type Tap = (usize, f32);

/// Resize `frame` to exactly `width` x `height` using area averaging.
///
/// A frame that already has the requested size is returned unchanged.
pub fn resize_area(frame: &Frame, width: u32, height: u32) -> Frame {
    let (src_w, src_h) = frame.dimensions();
    if (src_w, src_h) == (width, height) {
        return frame.clone();
    }
    if width == 0 || height == 0 || src_w == 0 || src_h == 0 {
        return Frame::new(ImageBuffer::new(width, height));
    }

    let x_taps = axis_taps(src_w as usize, width as usize);
    let y_taps = axis_taps(src_h as usize, height as usize);
    let src = frame.as_rgb_bytes();
    let src_stride = src_w as usize * 3;
    let dst_w = width as usize;

    // Horizontal pass: src_h rows of dst_w pixels
    let mut horizontal = vec![0f32; src_h as usize * dst_w * 3];
    for y in 0..src_h as usize {
        let row = &src[y * src_stride..(y + 1) * src_stride];
        let out = &mut horizontal[y * dst_w * 3..(y + 1) * dst_w * 3];
        for (dx, taps) in x_taps.iter().enumerate() {
            let mut acc = [0f32; 3];
            for &(sx, weight) in taps {
                for c in 0..3 {
                    acc[c] += row[sx * 3 + c] as f32 * weight;
                }
            }
            out[dx * 3..dx * 3 + 3].copy_from_slice(&acc);
        }
    }

    // Vertical pass into the final buffer
    let mut data = vec![0u8; dst_w * height as usize * 3];
    for (dy, taps) in y_taps.iter().enumerate() {
        let out = &mut data[dy * dst_w * 3..(dy + 1) * dst_w * 3];
        for (i, value) in out.iter_mut().enumerate() {
            let mut acc = 0f32;
            for &(sy, weight) in taps {
                acc += horizontal[sy * dst_w * 3 + i] * weight;
            }
            *value = (acc + 0.5).clamp(0.0, 255.0) as u8;
        }
    }

    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, data)
        .unwrap_or_else(|| ImageBuffer::new(width, height));
    Frame::new(buffer)
}

/// Coverage weights along one axis, normalised so each destination sums to 1
fn axis_taps(src: usize, dst: usize) -> Vec<Vec<Tap>> {
    let scale = src as f64 / dst as f64;

    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (start + scale).min(src as f64);
            let mut taps = Vec::with_capacity(scale.ceil() as usize + 1);

            let mut s = start.floor() as usize;
            while s < src && (s as f64) < end {
                let covered = end.min(s as f64 + 1.0) - start.max(s as f64);
                if covered > 1e-9 {
                    taps.push((s, covered));
                }
                s += 1;
            }
            if taps.is_empty() {
                taps.push((start.floor().min((src - 1) as f64) as usize, 1.0));
            }

            let total: f64 = taps.iter().map(|&(_, w)| w).sum();
            taps.into_iter()
                .map(|(s, w)| (s, (w / total) as f32))
                .collect()
        })
        .collect()
}
