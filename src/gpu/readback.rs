// SPDX-License-Identifier: GPL-3.0-only

//! Texture readback helpers

use super::wgpu;
use crate::errors::GpuError;

/// Row pitch for a texture-to-buffer copy, rounded up to wgpu's alignment
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let unpadded = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Map a `MAP_READ` buffer, wait for the GPU and copy its contents out
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> Result<Vec<u8>, GpuError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    let _ = device.poll(wgpu::PollType::wait_indefinitely());

    receiver
        .await
        .map_err(|_| GpuError::Readback("mapping callback dropped".to_string()))?
        .map_err(|e| GpuError::Readback(format!("{:?}", e)))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();

    Ok(data)
}

/// Drop the per-row padding of a texture copy, optionally reversing row order
pub(crate) fn strip_row_padding(
    padded: &[u8],
    padded_row: usize,
    row: usize,
    height: usize,
    reverse_rows: bool,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(row * height);
    for y in 0..height {
        let src_y = if reverse_rows { height - 1 - y } else { y };
        let start = src_y * padded_row;
        out.extend_from_slice(&padded[start..start + row]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(1, 1), 256);
    }

    #[test]
    fn test_strip_row_padding_reverses() {
        // Two rows of 2 bytes, padded to 4
        let padded = [1, 2, 0, 0, 3, 4, 0, 0];
        assert_eq!(strip_row_padding(&padded, 4, 2, 2, false), vec![1, 2, 3, 4]);
        assert_eq!(strip_row_padding(&padded, 4, 2, 2, true), vec![3, 4, 1, 2]);
    }
}
