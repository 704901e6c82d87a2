//! Species classification: an opaque base scorer fused with hand-tuned
//! color/texture/shape heuristics, softmax-normalized into a probability
//! distribution over the four supported crops.

use crate::colorspace::{self, hsv_unit};
use crate::features;
use crate::preprocess;
use image::RgbImage;
use ndarray::Array4;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The four supported crops, in the fixed label order every probability
/// vector uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Crop {
    Corn,
    Yam,
    Cassava,
    Tomato,
}

impl Crop {
    pub const ALL: [Crop; 4] = [Crop::Corn, Crop::Yam, Crop::Cassava, Crop::Tomato];

    pub fn name(&self) -> &'static str {
        match self {
            Crop::Corn => "corn",
            Crop::Yam => "yam",
            Crop::Cassava => "cassava",
            Crop::Tomato => "tomato",
        }
    }

    fn index(&self) -> usize {
        match self {
            Crop::Corn => 0,
            Crop::Yam => 1,
            Crop::Cassava => 2,
            Crop::Tomato => 3,
        }
    }
}

impl FromStr for Crop {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "corn" => Ok(Crop::Corn),
            "yam" => Ok(Crop::Yam),
            "cassava" => Ok(Crop::Cassava),
            "tomato" => Ok(Crop::Tomato),
            _ => Err(format!("Unknown crop: {s}")),
        }
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Probability distribution over the four crops. Values are non-negative and
/// sum to 1 after the softmax fusion step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesDistribution {
    probs: [f32; 4],
}

impl SpeciesDistribution {
    pub fn get(&self, crop: Crop) -> f32 {
        self.probs[crop.index()]
    }

    /// The most likely crop and its probability. Ties keep the first crop in
    /// label order.
    pub fn top(&self) -> (Crop, f32) {
        let mut best = Crop::ALL[0];
        let mut best_p = self.probs[0];
        for crop in Crop::ALL.iter().skip(1) {
            let p = self.probs[crop.index()];
            if p > best_p {
                best = *crop;
                best_p = p;
            }
        }
        (best, best_p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Crop, f32)> + '_ {
        Crop::ALL.iter().map(move |c| (*c, self.probs[c.index()]))
    }
}

/// The opaque, pre-trained 4-way scorer. Any deterministic implementation
/// producing a probability-like vector in the fixed label order satisfies
/// the contract; the heuristics only adjust its output.
pub trait BaseScorer: Send + Sync {
    fn score(&self, input: &Array4<f32>) -> [f32; 4];
}

/// Built-in deterministic scorer: a fixed linear layer over pooled channel
/// statistics of the normalized tensor, softmaxed into probabilities.
/// Stands in for the shipped network weights.
pub struct FixedWeightScorer {
    weights: [[f32; 4]; 4],
    bias: [f32; 4],
}

impl Default for FixedWeightScorer {
    fn default() -> Self {
        Self {
            // Rows: corn/yam/cassava/tomato. Columns: mean R, mean G, mean B,
            // channel spread. Tuned once, frozen for reproducibility.
            weights: [
                [0.9, 0.8, -0.6, 0.3],
                [0.4, 0.1, -0.2, 0.7],
                [0.5, 0.5, 0.5, -0.4],
                [1.1, -0.7, -0.5, 0.5],
            ],
            bias: [0.05, 0.0, 0.05, 0.0],
        }
    }
}

impl BaseScorer for FixedWeightScorer {
    fn score(&self, input: &Array4<f32>) -> [f32; 4] {
        let mut pooled = [0.0f32; 3];
        let hw = (input.shape()[2] * input.shape()[3]) as f32;
        for (c, slot) in pooled.iter_mut().enumerate() {
            let mut sum = 0.0f64;
            for v in input.index_axis(ndarray::Axis(1), c).iter() {
                sum += *v as f64;
            }
            *slot = (sum / hw as f64) as f32;
        }
        let spread = (pooled[0] - pooled[2]).abs() + (pooled[1] - pooled[2]).abs();
        let x = [pooled[0], pooled[1], pooled[2], spread];

        let mut logits = [0.0f32; 4];
        for (i, logit) in logits.iter_mut().enumerate() {
            *logit = self.bias[i]
                + self.weights[i]
                    .iter()
                    .zip(x.iter())
                    .map(|(w, v)| w * v)
                    .sum::<f32>();
        }
        softmax(logits)
    }
}

/// A scorer with no opinion: uniform output. Useful when only the heuristics
/// should drive the decision (and in tests).
pub struct UniformScorer;

impl BaseScorer for UniformScorer {
    fn score(&self, _input: &Array4<f32>) -> [f32; 4] {
        [0.25; 4]
    }
}

/// Fusion weights between the base scorer and the heuristic scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionParams {
    /// Weight on the base scorer output (default 0.7).
    pub base_weight: f32,
    /// Weight on the heuristic scores (default 0.3).
    pub heuristic_weight: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            base_weight: 0.7,
            heuristic_weight: 0.3,
        }
    }
}

/// Color dominance indicators, all in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct ColorFeatures {
    pub dominant_yellow: f32,
    pub dominant_red: f32,
    pub dominant_brown: f32,
    pub dominant_white: f32,
}

/// Texture indicators, all in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct TextureFeatures {
    pub grid_pattern: f32,
    pub smooth: f32,
    pub rough: f32,
    pub fibrous: f32,
}

/// Shape indicators from the dominant foreground contour, all in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct ShapeFeatures {
    pub elongated: f32,
    pub round: f32,
    pub irregular: f32,
    pub cylindrical: f32,
}

pub fn extract_color_features(img: &RgbImage) -> ColorFeatures {
    let hsv = hsv_unit(img);
    ColorFeatures {
        dominant_yellow: features::fraction3(&hsv.h, &hsv.s, &hsv.v, |h, s, v| {
            (0.08..=0.17).contains(&h) && s > 0.3 && v > 0.3
        }),
        dominant_red: features::fraction3(&hsv.h, &hsv.s, &hsv.v, |h, s, v| {
            (h <= 0.05 || h >= 0.95) && s > 0.3 && v > 0.3
        }),
        dominant_brown: features::fraction3(&hsv.h, &hsv.s, &hsv.v, |h, s, v| {
            (0.05..=0.15).contains(&h) && s > 0.2 && v < 0.6
        }),
        dominant_white: features::fraction3(&hsv.h, &hsv.s, &hsv.v, |_, s, v| s < 0.2 && v > 0.7),
    }
}

pub fn extract_texture_features(img: &RgbImage) -> TextureFeatures {
    let gray = colorspace::gray_plane(img);
    if gray.is_empty() {
        return TextureFeatures {
            grid_pattern: 0.0,
            smooth: 0.0,
            rough: 0.0,
            fibrous: 0.0,
        };
    }
    let edges = features::finite_difference_edges(&gray);
    let edge_p80 = features::percentile(&edges, 80.0);
    let edge_mean = features::mean(&edges);
    let gray_mean = features::mean(&gray);

    let grid_pattern = features::fraction(&edges, |v| v > edge_p80);
    let smooth = if gray_mean > 0.0 {
        (1.0 - features::std_dev(&gray) / gray_mean).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let rough = if edge_mean > 0.0 {
        (features::std_dev(&edges) / edge_mean).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let fibrous = (features::row_difference_mean(&gray) / 255.0).clamp(0.0, 1.0);

    TextureFeatures {
        grid_pattern,
        smooth,
        rough,
        fibrous,
    }
}

pub fn extract_shape_features(img: &RgbImage) -> ShapeFeatures {
    let gray = colorspace::gray_plane(img);
    if gray.is_empty() {
        return neutral_shape();
    }
    let gray_u8 = colorspace::gray_to_u8(&gray);
    let Some(shape) = features::largest_foreground_shape(&gray_u8) else {
        // No foreground contour: neutral indicators rather than a failure.
        return neutral_shape();
    };

    let ar = shape.aspect_ratio;
    let elongated = if ar > 1.5 || ar < 0.67 {
        ar.min(1.0 / ar)
    } else {
        0.0
    };
    let round = (1.0 - (ar - 1.0).abs()).clamp(0.0, 1.0);

    let edges = features::finite_difference_edges(&gray);
    let complexity = features::std_dev(&edges) / (features::mean(&edges) + 1e-6);
    let irregular = (complexity / 2.0).min(1.0);

    let cylindrical = if ar > 2.0 { (ar / 3.0).min(1.0) } else { 0.0 };

    ShapeFeatures {
        elongated,
        round,
        irregular,
        cylindrical,
    }
}

fn neutral_shape() -> ShapeFeatures {
    ShapeFeatures {
        elongated: 0.5,
        round: 0.5,
        irregular: 0.5,
        cylindrical: 0.5,
    }
}

/// Per-species heuristic scores: each trigger contributes its fixed weight
/// only when the feature clears its threshold.
fn heuristic_scores(
    color: &ColorFeatures,
    texture: &TextureFeatures,
    shape: &ShapeFeatures,
) -> [f32; 4] {
    let mut corn = 0.0;
    if color.dominant_yellow > 0.3 {
        corn += 0.4;
    }
    if texture.grid_pattern > 0.5 {
        corn += 0.3;
    }
    if shape.elongated > 0.6 {
        corn += 0.3;
    }

    let mut tomato = 0.0;
    if color.dominant_red > 0.4 {
        tomato += 0.5;
    }
    if shape.round > 0.7 {
        tomato += 0.3;
    }
    if texture.smooth > 0.6 {
        tomato += 0.2;
    }

    let mut yam = 0.0;
    if color.dominant_brown > 0.3 {
        yam += 0.4;
    }
    if texture.rough > 0.5 {
        yam += 0.3;
    }
    if shape.irregular > 0.6 {
        yam += 0.3;
    }

    let mut cassava = 0.0;
    if color.dominant_white > 0.3 {
        cassava += 0.4;
    }
    if shape.cylindrical > 0.5 {
        cassava += 0.3;
    }
    if texture.fibrous > 0.4 {
        cassava += 0.3;
    }

    [corn, yam, cassava, tomato]
}

fn softmax(x: [f32; 4]) -> [f32; 4] {
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut exp = [0.0f32; 4];
    let mut sum = 0.0f32;
    for (e, v) in exp.iter_mut().zip(x.iter()) {
        *e = (v - max).exp();
        sum += *e;
    }
    for e in exp.iter_mut() {
        *e /= sum;
    }
    exp
}

/// The species classifier: owns the base scorer and the fusion parameters.
pub struct SpeciesClassifier {
    scorer: Box<dyn BaseScorer>,
    params: FusionParams,
}

impl SpeciesClassifier {
    pub fn new(scorer: Box<dyn BaseScorer>, params: FusionParams) -> Self {
        Self { scorer, params }
    }

    /// Classify from the analysis-resolution RGB image. Never fails: a
    /// zero-sized image simply yields all-zero heuristics over the scorer's
    /// output for an all-zero tensor.
    pub fn classify(&self, img: &RgbImage) -> SpeciesDistribution {
        let tensor = if img.width() == preprocess::TARGET_SIZE
            && img.height() == preprocess::TARGET_SIZE
        {
            preprocess::normalize_for_scorer(img)
        } else if img.width() > 0 && img.height() > 0 {
            let resized =
                preprocess::resize_for_analysis(&image::DynamicImage::ImageRgb8(img.clone()));
            preprocess::normalize_for_scorer(&resized)
        } else {
            Array4::zeros((1, 3, preprocess::TARGET_SIZE as usize, preprocess::TARGET_SIZE as usize))
        };
        let base = self.scorer.score(&tensor);
        self.classify_with_base(img, base)
    }

    /// Fuse an externally supplied base vector with the image heuristics.
    pub fn classify_with_base(&self, img: &RgbImage, base: [f32; 4]) -> SpeciesDistribution {
        let heuristics = if img.width() > 0 && img.height() > 0 {
            let color = extract_color_features(img);
            let texture = extract_texture_features(img);
            let shape = extract_shape_features(img);
            heuristic_scores(&color, &texture, &shape)
        } else {
            [0.0; 4]
        };

        let mut fused = [0.0f32; 4];
        for i in 0..4 {
            fused[i] =
                self.params.base_weight * base[i] + self.params.heuristic_weight * heuristics[i];
        }
        SpeciesDistribution {
            probs: softmax(fused),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn classifier() -> SpeciesClassifier {
        SpeciesClassifier::new(Box::new(UniformScorer), FusionParams::default())
    }

    /// Saturated yellow rectangle (aspect 1.6) on black, the corn fixture.
    fn yellow_elongated() -> RgbImage {
        let mut img = RgbImage::new(224, 224);
        for y in 50..175 {
            for x in 12..212 {
                img.put_pixel(x, y, Rgb([255, 255, 0]));
            }
        }
        img
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let dist = classifier().classify(&yellow_elongated());
        let sum: f32 = dist.iter().map(|(_, p)| p).sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(dist.iter().all(|(_, p)| p >= 0.0));
    }

    #[test]
    fn test_yellow_elongated_classifies_as_corn() {
        let dist = classifier().classify(&yellow_elongated());
        let (top, confidence) = dist.top();
        assert_eq!(top, Crop::Corn);
        for crop in [Crop::Yam, Crop::Cassava, Crop::Tomato] {
            assert!(
                dist.get(Crop::Corn) > dist.get(crop),
                "expected corn > {crop}, got {} vs {}",
                dist.get(Crop::Corn),
                dist.get(crop)
            );
        }
        assert!((confidence - dist.get(Crop::Corn)).abs() < 1e-7);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let img = yellow_elongated();
        let c = classifier();
        let a = c.classify(&img);
        let b = c.classify(&img);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fusion_weights_applied_elementwise() {
        // With zero heuristics (empty image) the softmax input is just the
        // scaled base vector.
        let c = classifier();
        let empty = RgbImage::new(0, 0);
        let dist = c.classify_with_base(&empty, [1.0, 0.0, 0.0, 0.0]);
        // Softmax over [0.7, 0, 0, 0]: corn strictly largest, others equal.
        assert_eq!(dist.top().0, Crop::Corn);
        assert!((dist.get(Crop::Yam) - dist.get(Crop::Tomato)).abs() < 1e-7);
    }

    #[test]
    fn test_fixed_weight_scorer_outputs_probabilities() {
        let scorer = FixedWeightScorer::default();
        let tensor = Array4::<f32>::from_elem((1, 3, 224, 224), 0.5);
        let out = scorer.score(&tensor);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(out.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn test_crop_parsing_round_trip() {
        for crop in Crop::ALL {
            assert_eq!(crop.name().parse::<Crop>().unwrap(), crop);
        }
        assert!("plantain".parse::<Crop>().is_err());
    }

    #[test]
    fn test_uniform_image_shape_features_are_neutral() {
        // All-black image: Otsu finds no foreground, indicators fall back
        // to 0.5.
        let img = RgbImage::new(64, 64);
        let shape = extract_shape_features(&img);
        assert_eq!(shape.elongated, 0.5);
        assert_eq!(shape.round, 0.5);
    }
}
