//! In-place resampling and cropping of a decoded [`PixelBuffer`].
//!
//! Both operations work on the single decoded allocation: the resampler
//! compacts the selected pixels towards the front of it, the crop only moves
//! the view. Neither allocates.

use tracing::debug;

use super::PixelBuffer;

/// Shrink `buffer` to exactly `width` x `height` by nearest-neighbour sampling.
///
/// Destination pixel `(x, y)` takes source pixel
/// `(x * src_width / width, y * src_height / height)` using integer division.
/// Pixels are written in place in row-major order; a destination offset never
/// passes the source offset it reads from, so the forward copy is safe. The
/// view is rebuilt afterwards with a tight stride.
///
/// Targets larger than the current view are clamped to it; zero targets are
/// treated as one pixel.
pub fn resample_nearest(buffer: &mut PixelBuffer, width: u32, height: u32) {
    let width = width.clamp(1, buffer.width.max(1));
    let height = height.clamp(1, buffer.height.max(1));
    if width == buffer.width && height == buffer.height {
        return;
    }

    let components = buffer.components;
    let (src_width, src_height) = (buffer.width as usize, buffer.height as usize);
    let (dst_width, dst_height) = (width as usize, height as usize);

    debug!(
        from_width = src_width,
        from_height = src_height,
        to_width = dst_width,
        to_height = dst_height,
        "nearest-neighbour resample"
    );

    let mut dst = 0;
    for y in 0..dst_height {
        let src_row = buffer.origin + (y * src_height / dst_height) * buffer.stride;
        for x in 0..dst_width {
            let src = src_row + (x * src_width / dst_width) * components;
            buffer.data.copy_within(src..src + components, dst);
            dst += components;
        }
    }

    buffer.width = width;
    buffer.height = height;
    buffer.stride = dst_width * components;
    buffer.origin = 0;
}

/// Narrow the view of `buffer` to the `width` x `height` region at `(x, y)`.
///
/// The region is clamped to the current view. Pixel data is left where it is;
/// only the origin and size of the view change.
pub fn crop(buffer: &mut PixelBuffer, x: u32, y: u32, width: u32, height: u32) {
    let x = x.min(buffer.width.saturating_sub(1));
    let y = y.min(buffer.height.saturating_sub(1));
    let width = width.min(buffer.width - x).max(1);
    let height = height.min(buffer.height - y).max(1);

    debug!(x, y, width, height, "crop to bounds");

    buffer.origin += y as usize * buffer.stride + x as usize * buffer.components;
    buffer.width = width;
    buffer.height = height;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ColorSpace;

    /// Gray image whose pixel at (x, y) is `y * width + x`.
    fn create_indexed_gray(width: u32, height: u32) -> PixelBuffer {
        let pixels = (0..width * height).map(|i| i as u8).collect();
        PixelBuffer::new(width, height, ColorSpace::Gray8, pixels)
    }

    /// RGB image encoding the column in R and the row in G.
    fn create_coordinate_rgb(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(x as u8);
                pixels.push(y as u8);
                pixels.push(200);
            }
        }
        PixelBuffer::new(width, height, ColorSpace::Rgb8, pixels)
    }

    #[test]
    fn test_resample_selects_truncated_coordinates() {
        let mut buffer = create_coordinate_rgb(10, 7);
        resample_nearest(&mut buffer, 4, 3);

        assert_eq!(buffer.width(), 4);
        assert_eq!(buffer.height(), 3);
        assert_eq!(buffer.stride(), 12);

        for y in 0..3 {
            for x in 0..4 {
                let px = buffer.pixel(x, y);
                assert_eq!(px[0] as u32, x * 10 / 4);
                assert_eq!(px[1] as u32, y * 7 / 3);
                assert_eq!(px[2], 200);
            }
        }
    }

    #[test]
    fn test_resample_compacts_to_front() {
        let mut buffer = create_indexed_gray(4, 4);
        resample_nearest(&mut buffer, 2, 2);

        // Sources (0,0), (2,0), (0,2), (2,2)
        assert_eq!(&buffer.data[..4], &[0, 2, 8, 10]);
        assert_eq!(buffer.row(1), &[8, 10]);
        // Allocation is untouched in size
        assert_eq!(buffer.byte_size(), 16);
    }

    #[test]
    fn test_resample_same_size_is_noop() {
        let mut buffer = create_indexed_gray(5, 3);
        let before = buffer.data.clone();
        resample_nearest(&mut buffer, 5, 3);

        assert_eq!(buffer.data, before);
        assert_eq!(buffer.stride(), 5);
    }

    #[test]
    fn test_resample_clamps_target() {
        let mut buffer = create_indexed_gray(5, 3);
        resample_nearest(&mut buffer, 0, 100);

        assert_eq!(buffer.width(), 1);
        assert_eq!(buffer.height(), 3);
    }

    #[test]
    fn test_resample_after_crop_reads_view() {
        let mut buffer = create_indexed_gray(8, 8);
        crop(&mut buffer, 4, 4, 4, 4);
        resample_nearest(&mut buffer, 2, 2);

        // View pixels (0,0), (2,0), (0,2), (2,2) of the bottom-right quadrant
        assert_eq!(buffer.row(0), &[36, 38]);
        assert_eq!(buffer.row(1), &[52, 54]);
    }

    #[test]
    fn test_crop_rebases_rows() {
        let mut buffer = create_coordinate_rgb(6, 5);
        crop(&mut buffer, 2, 1, 3, 2);

        assert_eq!(buffer.width(), 3);
        assert_eq!(buffer.height(), 2);
        assert_eq!(buffer.stride(), 18);
        assert_eq!(buffer.pixel(0, 0), &[2, 1, 200]);
        assert_eq!(buffer.pixel(2, 1), &[4, 2, 200]);
    }

    #[test]
    fn test_crop_clamps_region() {
        let mut buffer = create_indexed_gray(6, 5);
        crop(&mut buffer, 4, 3, 10, 10);

        assert_eq!(buffer.width(), 2);
        assert_eq!(buffer.height(), 2);
        assert_eq!(buffer.row(0), &[22, 23]);
        assert_eq!(buffer.row(1), &[28, 29]);
    }

    #[test]
    fn test_crop_origin_past_edge() {
        let mut buffer = create_indexed_gray(6, 5);
        crop(&mut buffer, 50, 50, 3, 3);

        assert_eq!(buffer.width(), 1);
        assert_eq!(buffer.height(), 1);
        assert_eq!(buffer.row(0), &[29]);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
