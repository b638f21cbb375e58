//! Pure calculation functions for variant dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// A single responsive width to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSize {
    pub width: u32,
    pub height: u32,
}

/// Scale `original` to `target_width`, keeping the aspect ratio.
///
/// The height is truncated, never below one pixel.
pub fn scale_to_width(original: (u32, u32), target_width: u32) -> VariantSize {
    let (orig_w, orig_h) = original;
    let ratio = target_width as f64 / orig_w.max(1) as f64;
    VariantSize {
        width: target_width,
        height: ((orig_h as f64 * ratio) as u32).max(1),
    }
}

/// Calculate the variant widths for an image of the given dimensions.
///
/// Every breakpoint strictly narrower than the original becomes a variant,
/// and the original width is always added as the largest one. Breakpoints
/// are deduplicated; the result is sorted by width.
///
/// ```
/// # use postexport::imaging::calculate_variant_sizes;
/// let sizes = calculate_variant_sizes((1000, 500), &[480, 800, 1200]);
/// let widths: Vec<u32> = sizes.iter().map(|s| s.width).collect();
/// assert_eq!(widths, vec![480, 800, 1000]);
/// ```
pub fn calculate_variant_sizes(original: (u32, u32), breakpoints: &[u32]) -> Vec<VariantSize> {
    let (orig_w, orig_h) = original;
    let mut widths: Vec<u32> = breakpoints
        .iter()
        .copied()
        .filter(|&w| w > 0 && w < orig_w)
        .collect();
    widths.sort_unstable();
    widths.dedup();

    let mut sizes: Vec<VariantSize> = widths
        .into_iter()
        .map(|w| scale_to_width(original, w))
        .collect();
    sizes.push(VariantSize {
        width: orig_w,
        height: orig_h,
    });
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widths(sizes: &[VariantSize]) -> Vec<u32> {
        sizes.iter().map(|s| s.width).collect()
    }

    #[test]
    fn skips_breakpoints_at_or_above_original() {
        let sizes = calculate_variant_sizes((1200, 800), &[480, 800, 1200, 1600]);
        assert_eq!(widths(&sizes), vec![480, 800, 1200]);
    }

    #[test]
    fn always_includes_original_width() {
        let sizes = calculate_variant_sizes((300, 200), &[480, 800]);
        assert_eq!(sizes, vec![VariantSize { width: 300, height: 200 }]);
    }

    #[test]
    fn heights_follow_aspect_ratio() {
        let sizes = calculate_variant_sizes((2000, 1500), &[800]);
        assert_eq!(sizes[0], VariantSize { width: 800, height: 600 });
        assert_eq!(sizes[1], VariantSize { width: 2000, height: 1500 });
    }

    #[test]
    fn heights_truncate_like_integer_scaling() {
        // 333 * 480/1000 = 159.84
        assert_eq!(scale_to_width((1000, 333), 480).height, 159);
    }

    #[test]
    fn height_never_zero() {
        assert_eq!(scale_to_width((5000, 1), 480).height, 1);
    }

    #[test]
    fn unsorted_and_duplicate_breakpoints() {
        let sizes = calculate_variant_sizes((3000, 2000), &[1600, 480, 1600, 800]);
        assert_eq!(widths(&sizes), vec![480, 800, 1600, 3000]);
    }

    #[test]
    fn empty_breakpoints_yield_original_only() {
        let sizes = calculate_variant_sizes((640, 480), &[]);
        assert_eq!(widths(&sizes), vec![640]);
    }
}
