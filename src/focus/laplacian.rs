/// Laplacian-variance sharpness
///
/// Filters a normalized region with the 4-connected Laplacian kernel
///
/// ```text
/// [ 0  1  0 ]
/// [ 1 -4  1 ]
/// [ 0  1  0 ]
/// ```
///
/// and reduces the response to its population variance. Borders are
/// reflected without repeating the edge pixel (`gfedcb|abcdefgh|gfedcba`),
/// so results line up with OpenCV's `Laplacian(src, dst, CV_8U, 1)`.
use super::normalize::NormalizedRegion;
use crate::invariant_ppt::FOCUS_LEVEL_NON_NEGATIVE;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// How the per-pixel filter response is represented before the variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Saturated to 0..=255, as an 8-bit destination image stores it
    #[default]
    Saturated,
    /// Full signed response, no clamping
    Signed,
}

/// Scores normalized regions with a fixed response policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FocusScorer {
    mode: ResponseMode,
}

impl FocusScorer {
    pub fn new(mode: ResponseMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// Focus level of `region`: the variance of its Laplacian response.
    pub fn score(&self, region: &NormalizedRegion) -> f64 {
        let level = match self.mode {
            ResponseMode::Saturated => {
                let response = laplacian_response(region);
                variance(response.as_raw().iter().map(|&v| v as f64))
            }
            ResponseMode::Signed => {
                let response = laplacian_signed(region);
                variance(response.iter().map(|&v| v as f64))
            }
        };
        crate::assert_invariant!(
            level.is_finite() && level >= 0.0,
            FOCUS_LEVEL_NON_NEGATIVE,
            "FocusScorer::score"
        );
        level
    }
}

/// Focus level with the default saturating response.
pub fn focus_level(region: &NormalizedRegion) -> f64 {
    FocusScorer::default().score(region)
}

/// Laplacian response saturated into an 8-bit image of the region's size.
pub fn laplacian_response(region: &NormalizedRegion) -> GrayImage {
    let (width, height) = (region.width(), region.height());
    let pixels = convolve(region).map(|v| v.clamp(0, 255) as u8).collect();
    GrayImage::from_raw(width, height, pixels).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Signed Laplacian response in row-major order.
pub fn laplacian_signed(region: &NormalizedRegion) -> Vec<i32> {
    convolve(region).collect()
}

/// Population mean and standard deviation (divides by N, not N-1).
pub fn mean_std_dev<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let values = values.into_iter();
    let (count, sum) = values
        .clone()
        .fold((0usize, 0.0f64), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let second_moment = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
    (mean, second_moment.max(0.0).sqrt())
}

fn variance<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let (_, std_dev) = mean_std_dev(values);
    std_dev * std_dev
}

fn convolve(region: &NormalizedRegion) -> impl Iterator<Item = i32> + '_ {
    let width = region.width() as usize;
    let height = region.height() as usize;
    let raw = region.as_raw();
    let at = move |x: usize, y: usize| raw[y * width + x] as i32;

    (0..height).flat_map(move |y| {
        let up = reflect_101(y as isize - 1, height);
        let down = reflect_101(y as isize + 1, height);
        (0..width).map(move |x| {
            let left = reflect_101(x as isize - 1, width);
            let right = reflect_101(x as isize + 1, width);
            at(x, up) + at(x, down) + at(left, y) + at(right, y) - 4 * at(x, y)
        })
    })
}

/// Mirror an out-of-range index back inside `0..len` without repeating the edge.
#[inline]
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    let mut i = index;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * len - 2 - i;
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(width: u32, height: u32, pixels: Vec<u8>) -> NormalizedRegion {
        NormalizedRegion::from_gray(GrayImage::from_raw(width, height, pixels).unwrap())
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-1, 1), 0);
        assert_eq!(reflect_101(1, 1), 0);
        assert_eq!(reflect_101(-1, 2), 1);
        assert_eq!(reflect_101(2, 2), 0);
    }

    #[test]
    fn test_uniform_region_scores_zero() {
        let flat = region(16, 16, vec![123; 256]);
        assert_eq!(focus_level(&flat), 0.0);
        assert_eq!(FocusScorer::new(ResponseMode::Signed).score(&flat), 0.0);
    }

    #[test]
    fn test_single_pixel_scores_zero() {
        assert_eq!(focus_level(&region(1, 1, vec![200])), 0.0);
    }

    #[test]
    fn test_bright_dot_response() {
        // 3x3 with a bright centre. The centre goes negative and saturates
        // to 0; each edge pixel sees the centre twice through the mirrored
        // border; corners see nothing.
        let mut pixels = vec![0u8; 9];
        pixels[4] = 100;
        let dot = region(3, 3, pixels);

        let response = laplacian_response(&dot);
        assert_eq!(response.as_raw(), &[0, 200, 0, 200, 0, 200, 0, 200, 0]);

        let signed = laplacian_signed(&dot);
        assert_eq!(signed, vec![0, 200, 0, 200, -400, 200, 0, 200, 0]);
    }

    #[test]
    fn test_saturated_variance_matches_hand_computation() {
        let mut pixels = vec![0u8; 9];
        pixels[4] = 100;
        let dot = region(3, 3, pixels);
        // Response: four 200s, five 0s
        let mean = 800.0 / 9.0;
        let expected = (4.0 * (200.0f64 - mean).powi(2) + 5.0 * mean.powi(2)) / 9.0;
        assert!((focus_level(&dot) - expected).abs() < 1e-9);

        let signed_mean = 400.0 / 9.0;
        let signed_expected = (4.0 * (200.0f64 - signed_mean).powi(2)
            + (-400.0f64 - signed_mean).powi(2)
            + 4.0 * signed_mean.powi(2))
            / 9.0;
        let signed = FocusScorer::new(ResponseMode::Signed).score(&dot);
        assert!((signed - signed_expected).abs() < 1e-9);
    }

    #[test]
    fn test_saturation_clamps_high_values() {
        // Dark centre on a bright field: +4*255 at the centre clamps to 255
        let mut pixels = vec![255u8; 9];
        pixels[4] = 0;
        let pit = region(3, 3, pixels);
        let response = laplacian_response(&pit);
        assert_eq!(response.get_pixel(1, 1)[0], 255);
        assert_eq!(laplacian_signed(&pit)[4], 1020);
    }

    #[test]
    fn test_sharper_edges_score_higher() {
        let sharp: Vec<u8> = (0..32 * 32)
            .map(|i| if (i % 32 / 4 + i / 32 / 4) % 2 == 0 { 220 } else { 30 })
            .collect();
        let sharp = region(32, 32, sharp);
        let blurred = region(32, 32, image::imageops::blur(sharp.as_image(), 2.0).into_raw());
        assert!(focus_level(&sharp) > focus_level(&blurred));
    }

    #[test]
    fn test_mean_std_dev_population() {
        let (mean, std_dev) = mean_std_dev(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(std_dev, 2.0);
        assert_eq!(mean_std_dev(Vec::<f64>::new()), (0.0, 0.0));
    }
}
