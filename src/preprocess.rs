//! Image preprocessing for the base species scorer.
//!
//! The scorer consumes a 224x224 RGB tensor normalized with the ImageNet
//! statistics; the heuristic stages work on the plain resized RGB image.

use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;

/// Side length every analysis runs at.
pub const TARGET_SIZE: u32 = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize to the analysis resolution with Lanczos3 resampling.
pub fn resize_for_analysis(img: &DynamicImage) -> RgbImage {
    img.resize_exact(TARGET_SIZE, TARGET_SIZE, FilterType::Lanczos3)
        .to_rgb8()
}

/// Convert a resized RGB image into an ImageNet-normalized NCHW tensor of
/// shape [1, 3, 224, 224] for the base scorer.
pub fn normalize_for_scorer(img: &RgbImage) -> Array4<f32> {
    let mut array = Array4::<f32>::zeros((
        1,
        3,
        TARGET_SIZE as usize,
        TARGET_SIZE as usize,
    ));
    for (x, y, pixel) in img.enumerate_pixels() {
        if x >= TARGET_SIZE || y >= TARGET_SIZE {
            continue;
        }
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            array[[0, c, y as usize, x as usize]] = (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_resize_produces_target_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([10, 20, 30])));
        let resized = resize_for_analysis(&img);
        assert_eq!(resized.dimensions(), (TARGET_SIZE, TARGET_SIZE));
    }

    #[test]
    fn test_normalization_applies_imagenet_stats() {
        let img = RgbImage::from_pixel(TARGET_SIZE, TARGET_SIZE, Rgb([255, 0, 0]));
        let tensor = normalize_for_scorer(&img);
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        let expected_r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let expected_g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((tensor[[0, 0, 0, 0]] - expected_r).abs() < 1e-5);
        assert!((tensor[[0, 1, 100, 100]] - expected_g).abs() < 1e-5);
    }
}
