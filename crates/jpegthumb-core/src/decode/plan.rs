//! Decode scale planning.
//!
//! JPEG codecs can run the inverse DCT at a reduced size, producing a
//! downscaled image for a fraction of the cost of a full decode. The planner
//! picks the largest reduction that still leaves at least the requested number
//! of pixels in both axes, so the nearest-neighbour pass afterwards only ever
//! shrinks.

/// Largest supported decode reduction.
pub const MAX_SCALE: u32 = 8;

/// Choose the decode scale denominator for a target size.
///
/// The result `k` means "decode at `1/k` of full resolution" and satisfies
/// `1 <= k <= 8`, `k <= src_width / dst_width` and `k <= src_height / dst_height`.
/// Zero targets are treated as one pixel.
///
/// # Example
///
/// ```ignore
/// // 4000x3000 down to 128x96: 31 and 31, clamped to 8
/// assert_eq!(plan_scale(4000, 3000, 128, 96), 8);
/// ```
pub fn plan_scale(src_width: u32, src_height: u32, dst_width: u32, dst_height: u32) -> u32 {
    let scale_w = src_width / dst_width.max(1);
    let scale_h = src_height / dst_height.max(1);
    scale_w.min(scale_h).clamp(1, MAX_SCALE)
}

/// Convert a scale denominator into the codec's `numerator / 8` form.
///
/// The numerator is rounded up so the decoded image is never smaller than
/// `1/denominator` of the source. Powers of two map exactly.
pub fn scale_numerator(denominator: u32) -> u8 {
    let denominator = denominator.clamp(1, MAX_SCALE);
    MAX_SCALE.div_ceil(denominator) as u8
}


// ============================================================================
// Property-Based Tests
// ============================================================================
