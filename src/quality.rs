//! Fresh/spoiled quality assessment: four degradation analyses fused with
//! per-crop weights into a spoilage score, thresholded into a verdict.
//!
//! The analyses work on OpenCV-scaled HSV/Lab planes so the tuned constants
//! (value cutoffs, hue bands) read in the familiar 0-180 / 0-255 ranges.

use crate::colorspace::PlaneSet;
use crate::features::{self, ContourShape};
use crate::species::Crop;
use anyhow::Result;
use image::RgbImage;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Tunable quality parameters. Defaults match the shipped calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityParams {
    /// Spoilage scores at or above this are reported as spoiled.
    pub spoilage_threshold: f32,
    /// Confidence never exceeds this cap.
    pub confidence_cap: f32,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            spoilage_threshold: 0.3,
            confidence_cap: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Fresh,
    Spoiled,
    Unknown,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityStatus::Fresh => "fresh",
            QualityStatus::Spoiled => "spoiled",
            QualityStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Per-analysis degradation scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DegradationScores {
    pub color: f32,
    pub texture: f32,
    pub shape: f32,
    pub surface: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityResult {
    pub status: QualityStatus,
    /// Weighted spoilage score in [0, 1]; 0.5 when the image could not be
    /// assessed.
    pub spoilage_score: f32,
    pub confidence: f32,
    pub scores: DegradationScores,
}

impl QualityResult {
    /// The neutral result used when the image could not be analyzed.
    fn unknown() -> Self {
        Self {
            status: QualityStatus::Unknown,
            spoilage_score: 0.5,
            confidence: 0.5,
            scores: DegradationScores {
                color: 0.5,
                texture: 0.5,
                shape: 0.5,
                surface: 0.5,
            },
        }
    }
}

/// Fusion weights in (color, texture, shape, surface) order. Unrecognized
/// crops fall back to corn's row.
fn crop_weights(crop: Option<Crop>) -> [f32; 4] {
    match crop {
        Some(Crop::Tomato) => [0.3, 0.2, 0.2, 0.3],
        Some(Crop::Yam) | Some(Crop::Cassava) => [0.4, 0.2, 0.1, 0.3],
        Some(Crop::Corn) | None => [0.4, 0.3, 0.1, 0.2],
    }
}

pub struct QualityAssessor {
    params: QualityParams,
}

impl QualityAssessor {
    pub fn new(params: QualityParams) -> Self {
        Self { params }
    }

    /// Assess spoilage for the named crop. Unrecognized crop labels still get
    /// a verdict (crop-specific analyses contribute nothing and corn's fusion
    /// weights apply); unanalyzable images degrade to the neutral `unknown`
    /// result instead of failing.
    pub fn assess(&self, img: &RgbImage, crop: &str) -> QualityResult {
        let crop = Crop::from_str(crop).ok();
        if crop.is_none() {
            log::debug!("Assessing quality for an unrecognized crop label");
        }
        match self.assess_inner(img, crop) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Quality assessment degraded to unknown: {e:#}");
                QualityResult::unknown()
            }
        }
    }

    fn assess_inner(&self, img: &RgbImage, crop: Option<Crop>) -> Result<QualityResult> {
        let planes = PlaneSet::from_image(img)?;

        let scores = DegradationScores {
            color: color_degradation(&planes, crop),
            texture: texture_degradation(&planes, crop),
            shape: shape_degradation(&planes, crop),
            surface: surface_degradation(&planes),
        };

        let w = crop_weights(crop);
        let spoilage = (w[0] * scores.color
            + w[1] * scores.texture
            + w[2] * scores.shape
            + w[3] * scores.surface)
            .clamp(0.0, 1.0);

        let status = if spoilage >= self.params.spoilage_threshold {
            QualityStatus::Spoiled
        } else {
            QualityStatus::Fresh
        };
        // Confidence in the verdict: how fresh a fresh item looks, or how
        // spoiled a spoiled one.
        let confidence = match status {
            QualityStatus::Fresh => 1.0 - spoilage,
            _ => spoilage,
        }
        .min(self.params.confidence_cap);

        Ok(QualityResult {
            status,
            spoilage_score: spoilage,
            confidence,
            scores,
        })
    }
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self::new(QualityParams::default())
    }
}

fn color_degradation(p: &PlaneSet, crop: Option<Crop>) -> f32 {
    let hsv = &p.hsv;
    match crop {
        Some(Crop::Corn) => {
            // Browning plus loss of yellow vibrancy. Vibrancy is how
            // saturated the yellow pixels are, not how many there are.
            let brown = features::fraction3(&hsv.h, &hsv.s, &hsv.v, |h, s, v| {
                (10.0..=25.0).contains(&h) && s > 30.0 && v < 150.0
            });
            let vibrancy = features::masked_mean(
                &hsv.h,
                &hsv.s,
                &hsv.v,
                |h, s, v| (20.0..=35.0).contains(&h) && s > 50.0 && v > 100.0,
                |_, s, _| s / 255.0,
            );
            (brown * 0.7 + (1.0 - vibrancy) * 0.3).clamp(0.0, 1.0)
        }
        Some(Crop::Tomato) => {
            // Red quality is the mean saturation-value product over the red
            // pixels; a pale or darkening red scores low even when it covers
            // the whole fruit.
            let red_quality = features::masked_mean(
                &hsv.h,
                &hsv.s,
                &hsv.v,
                |h, s, v| (h <= 10.0 || h >= 170.0) && s > 50.0 && v > 100.0,
                |_, s, v| s * v / (255.0 * 255.0),
            );
            let dark = features::fraction(&hsv.v, |v| v < 50.0);
            ((1.0 - red_quality) * 0.6 + dark * 0.4).clamp(0.0, 1.0)
        }
        Some(Crop::Yam) => {
            let v_mean = features::mean(&hsv.v);
            let dark_patches = features::fraction(&hsv.v, |v| v < v_mean * 0.5);
            let uniformity = 1.0 - (features::std_dev(&hsv.h) / 180.0).min(1.0);
            (dark_patches * 0.8 + (1.0 - uniformity) * 0.2).clamp(0.0, 1.0)
        }
        Some(Crop::Cassava) => {
            let black = features::fraction(&hsv.v, |v| v < 30.0);
            let white = features::fraction3(&hsv.h, &hsv.s, &hsv.v, |_, s, v| {
                s < 30.0 && v > 200.0
            });
            (black * 0.7 + (1.0 - white) * 0.3).clamp(0.0, 1.0)
        }
        None => 0.0,
    }
}

fn texture_degradation(p: &PlaneSet, crop: Option<Crop>) -> f32 {
    match crop {
        Some(Crop::Corn) => {
            // Healthy kernels sit near a reference variance; deviation in
            // either direction signals degradation.
            let var = features::variance(&p.gray);
            (((var - 800.0).abs() / 800.0) * 0.6).clamp(0.0, 1.0)
        }
        Some(Crop::Tomato) => {
            let density = features::canny_edge_density(&p.gray_u8);
            ((density * 5.0).min(1.0) * 0.7).clamp(0.0, 1.0)
        }
        Some(Crop::Yam) => {
            let density = features::canny_edge_density(&p.gray_u8);
            if density > 0.15 {
                ((density - 0.15) * 3.0).clamp(0.0, 1.0)
            } else {
                0.0
            }
        }
        Some(Crop::Cassava) => {
            let density = features::canny_edge_density(&p.gray_u8);
            ((density * 4.0).min(1.0) * 0.6).clamp(0.0, 1.0)
        }
        None => 0.0,
    }
}

fn shape_degradation(p: &PlaneSet, crop: Option<Crop>) -> f32 {
    let Some(ContourShape { circularity, .. }) = features::largest_foreground_shape(&p.gray_u8)
    else {
        // No dominant contour to judge.
        return 0.5;
    };
    match crop {
        Some(Crop::Tomato) => {
            // Fresh tomatoes measure near 0.7 under this circularity; drift
            // in either direction counts against them.
            ((circularity - 0.7).abs() * 0.5).clamp(0.0, 1.0)
        }
        Some(_) => {
            if circularity < 0.2 {
                ((0.2 - circularity) * 2.0).clamp(0.0, 1.0)
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

fn surface_degradation(p: &PlaneSet) -> f32 {
    let hsv = &p.hsv;
    // Greenish/bluish overgrowth typical of mold colonies.
    let mold = features::fraction3(&hsv.h, &hsv.s, &hsv.v, |h, s, v| {
        (40.0..=140.0).contains(&h) && s > 30.0 && v > 30.0
    });

    // Lightness outliers in Lab: bruises and wet patches.
    let l = &p.lab.l;
    let l_mean = features::mean(l);
    let l_std = features::std_dev(l);
    let outliers = if l_std > 0.0 {
        features::fraction(l, |v| (v - l_mean).abs() > 2.0 * l_std)
    } else {
        0.0
    };

    // Straight-line artifacts: cracks and splits.
    let lines = features::straight_line_count(&p.gray_u8) as f32;
    let crack = (lines / 50.0).min(1.0);

    (mold * 0.8 + outliers * 0.6 + crack * 0.4).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Red disc on white: the fresh-tomato fixture.
    fn fresh_tomato() -> RgbImage {
        let mut img = RgbImage::from_pixel(224, 224, Rgb([255, 255, 255]));
        let (cx, cy, r) = (112.0f32, 112.0f32, 80.0f32);
        for y in 0..224 {
            for x in 0..224 {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r * r {
                    img.put_pixel(x, y, Rgb([220, 20, 20]));
                }
            }
        }
        img
    }

    #[test]
    fn test_vivid_red_disc_has_no_color_degradation() {
        // Fully saturated red on white: red quality is judged by how vivid
        // the red pixels are, not by how much of the frame they cover.
        let mut img = RgbImage::from_pixel(224, 224, Rgb([255, 255, 255]));
        let (cx, cy, r) = (112.0f32, 112.0f32, 80.0f32);
        for y in 0..224 {
            for x in 0..224 {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r * r {
                    img.put_pixel(x, y, Rgb([255, 0, 0]));
                }
            }
        }
        let planes = PlaneSet::from_image(&img).unwrap();
        let score = color_degradation(&planes, Some(Crop::Tomato));
        assert!(
            score < 1e-6,
            "color degradation {score} should vanish for vivid red"
        );
    }

    #[test]
    fn test_dim_browning_still_counts_for_corn() {
        // Brown at medium brightness (value up to 150) is browning; only
        // the disease stage uses a darker cutoff.
        let mut img = RgbImage::from_pixel(224, 224, Rgb([255, 255, 0]));
        for y in 112..224 {
            for x in 0..224 {
                img.put_pixel(x, y, Rgb([140, 84, 56]));
            }
        }
        let planes = PlaneSet::from_image(&img).unwrap();
        let score = color_degradation(&planes, Some(Crop::Corn));
        assert!(score >= 0.3, "browning {score} under-detected");
    }

    #[test]
    fn test_clean_corn_scores_near_zero() {
        // Two vibrant yellow tones split down the middle: every color mask
        // is quiet and the gray variance sits near the healthy-kernel
        // reference, so the fused score should all but vanish.
        let mut img = RgbImage::from_pixel(224, 224, Rgb([255, 255, 0]));
        for y in 0..224 {
            for x in 112..224 {
                img.put_pixel(x, y, Rgb([190, 190, 0]));
            }
        }
        let result = QualityAssessor::default().assess(&img, "corn");
        assert_eq!(result.status, QualityStatus::Fresh);
        assert!(
            result.spoilage_score <= 0.05,
            "spoilage {} should be near zero",
            result.spoilage_score
        );
        assert!(result.scores.color < 1e-6);
    }

    #[test]
    fn test_fresh_tomato_is_fresh() {
        let result = QualityAssessor::default().assess(&fresh_tomato(), "tomato");
        assert_eq!(result.status, QualityStatus::Fresh);
        assert!(
            result.spoilage_score < 0.3,
            "spoilage {} should be under the threshold",
            result.spoilage_score
        );
        // A fresh verdict is as confident as the item is un-spoiled.
        assert!((result.confidence - (1.0 - result.spoilage_score)).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_crop_still_gets_a_verdict() {
        let result = QualityAssessor::default().assess(&fresh_tomato(), "durian");
        // Crop-specific analyses contribute nothing for an unknown crop.
        assert_eq!(result.scores.color, 0.0);
        assert_eq!(result.scores.texture, 0.0);
        assert_eq!(result.scores.shape, 0.0);
        assert_ne!(result.status, QualityStatus::Unknown);
    }

    #[test]
    fn test_empty_image_degrades_to_neutral() {
        let result = QualityAssessor::default().assess(&RgbImage::new(0, 0), "corn");
        assert_eq!(result.status, QualityStatus::Unknown);
        assert_eq!(result.spoilage_score, 0.5);
    }

    #[test]
    fn test_spoiled_confidence_tracks_spoilage() {
        // Black image for cassava: black fraction 1.0, white 0.0 drives the
        // color score high.
        let img = RgbImage::new(64, 64);
        let result = QualityAssessor::default().assess(&img, "cassava");
        assert_eq!(result.status, QualityStatus::Spoiled);
        assert!((result.confidence - result.spoilage_score).abs() < 1e-6);
        assert!(result.confidence <= 0.95);
    }

    #[test]
    fn test_black_cassava_is_spoiled() {
        let img = RgbImage::new(64, 64);
        let result = QualityAssessor::default().assess(&img, "cassava");
        assert_eq!(result.status, QualityStatus::Spoiled);
        assert!(result.spoilage_score >= 0.3);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let lenient = QualityAssessor::new(QualityParams {
            spoilage_threshold: 1.1,
            confidence_cap: 0.95,
        });
        let result = lenient.assess(&RgbImage::new(64, 64), "cassava");
        assert_eq!(result.status, QualityStatus::Fresh);
    }

    #[test]
    fn test_scores_in_unit_range() {
        let result = QualityAssessor::default().assess(&fresh_tomato(), "tomato");
        for s in [
            result.scores.color,
            result.scores.texture,
            result.scores.shape,
            result.scores.surface,
            result.spoilage_score,
        ] {
            assert!((0.0..=1.0).contains(&s), "score {s} out of range");
        }
    }
}
