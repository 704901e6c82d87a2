//! Disease detection: each crop carries an ordered catalog of candidate
//! diseases, each defined by weighted color and texture patterns. Pattern
//! scores are fused 0.6/0.4 per disease; the first maximum in catalog order
//! wins and is bucketed into a severity level.

use crate::colorspace::PlaneSet;
use crate::features;
use crate::species::Crop;
use anyhow::Result;
use image::RgbImage;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Color-channel evidence patterns. Each detector returns a score in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPattern {
    GraySpots,
    BlackMold,
    BrownDiscoloration,
    YellowEdges,
    Holes,
    WhiteFuzzySpots,
    DarkSpots,
    DeepRed,
    BlackBottom,
    WhiteMold,
    GreenShoots,
    BlueDiscoloration,
    BrownStreaks,
}

/// Texture/structure evidence patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexturePattern {
    FuzzyGrowth,
    IrregularSurface,
    SoftKernels,
    LiquidDischarge,
    IrregularHoles,
    SoftSpots,
    WrinkledSurface,
    SunkenArea,
    ProtrudingGrowth,
    FiberSeparation,
    TunnelPatterns,
}

/// One catalog entry: a disease name plus its weighted evidence patterns.
pub struct DiseaseDef {
    pub name: &'static str,
    pub color_patterns: &'static [(ColorPattern, f32)],
    pub texture_patterns: &'static [(TexturePattern, f32)],
}

/// Severity bucket boundaries on the winning disease score. Each field is
/// the lowest score that lands in that bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeverityThresholds {
    pub moderate: f32,
    pub severe: f32,
    pub critical: f32,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            moderate: 0.3,
            severe: 0.6,
            critical: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl Severity {
    /// Boundary scores belong to the higher bucket.
    fn from_score(score: f32, t: &SeverityThresholds) -> Self {
        if score >= t.critical {
            Severity::Critical
        } else if score >= t.severe {
            Severity::Severe
        } else if score >= t.moderate {
            Severity::Moderate
        } else {
            Severity::Mild
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseScore {
    pub disease: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseResult {
    /// The winning catalog disease, or `unknown_spoilage` when the crop or
    /// image could not be analyzed.
    pub disease: String,
    pub confidence: f32,
    pub severity: Severity,
    pub description: String,
    /// Scores for every catalog entry, in catalog order. Empty for the
    /// `unknown_spoilage` fallback.
    pub all_scores: Vec<DiseaseScore>,
}

impl DiseaseResult {
    fn unknown_spoilage() -> Self {
        Self {
            disease: "unknown_spoilage".to_string(),
            confidence: 0.5,
            severity: Severity::Moderate,
            description: "Spoilage detected but specific type could not be determined"
                .to_string(),
            all_scores: Vec::new(),
        }
    }
}

const CORN_DISEASES: &[DiseaseDef] = &[
    DiseaseDef {
        name: "fungal_infection",
        color_patterns: &[(ColorPattern::GraySpots, 0.3), (ColorPattern::BlackMold, 0.4)],
        texture_patterns: &[
            (TexturePattern::FuzzyGrowth, 0.4),
            (TexturePattern::IrregularSurface, 0.2),
        ],
    },
    DiseaseDef {
        name: "bacterial_rot",
        color_patterns: &[
            (ColorPattern::BrownDiscoloration, 0.3),
            (ColorPattern::YellowEdges, 0.2),
        ],
        texture_patterns: &[
            (TexturePattern::SoftKernels, 0.3),
            (TexturePattern::LiquidDischarge, 0.5),
        ],
    },
    DiseaseDef {
        name: "pest_damage",
        color_patterns: &[(ColorPattern::Holes, 0.5)],
        texture_patterns: &[(TexturePattern::IrregularHoles, 0.4)],
    },
    DiseaseDef {
        name: "overripeness",
        color_patterns: &[],
        texture_patterns: &[],
    },
];

const TOMATO_DISEASES: &[DiseaseDef] = &[
    DiseaseDef {
        name: "fungal_infection",
        color_patterns: &[(ColorPattern::WhiteFuzzySpots, 0.4)],
        texture_patterns: &[
            (TexturePattern::FuzzyGrowth, 0.4),
            (TexturePattern::SoftSpots, 0.3),
        ],
    },
    DiseaseDef {
        name: "bacterial_rot",
        color_patterns: &[(ColorPattern::DarkSpots, 0.3)],
        texture_patterns: &[],
    },
    DiseaseDef {
        name: "overripeness",
        color_patterns: &[(ColorPattern::DeepRed, 0.2)],
        texture_patterns: &[(TexturePattern::WrinkledSurface, 0.3)],
    },
    DiseaseDef {
        name: "blossom_end_rot",
        color_patterns: &[(ColorPattern::BlackBottom, 0.5)],
        texture_patterns: &[(TexturePattern::SunkenArea, 0.4)],
    },
];

const YAM_DISEASES: &[DiseaseDef] = &[
    DiseaseDef {
        name: "fungal_infection",
        color_patterns: &[
            (ColorPattern::WhiteMold, 0.4),
            (ColorPattern::GraySpots, 0.3),
        ],
        texture_patterns: &[(TexturePattern::SoftSpots, 0.3)],
    },
    DiseaseDef {
        name: "bacterial_rot",
        color_patterns: &[],
        texture_patterns: &[(TexturePattern::LiquidDischarge, 0.5)],
    },
    DiseaseDef {
        name: "storage_rot",
        color_patterns: &[(ColorPattern::BrownDiscoloration, 0.3)],
        texture_patterns: &[],
    },
    DiseaseDef {
        name: "sprouting",
        color_patterns: &[(ColorPattern::GreenShoots, 0.6)],
        texture_patterns: &[(TexturePattern::ProtrudingGrowth, 0.5)],
    },
];

const CASSAVA_DISEASES: &[DiseaseDef] = &[
    DiseaseDef {
        name: "fungal_infection",
        color_patterns: &[],
        texture_patterns: &[(TexturePattern::FuzzyGrowth, 0.4)],
    },
    DiseaseDef {
        name: "bacterial_rot",
        color_patterns: &[(ColorPattern::BrownStreaks, 0.3)],
        texture_patterns: &[],
    },
    DiseaseDef {
        name: "storage_deterioration",
        color_patterns: &[(ColorPattern::BlueDiscoloration, 0.4)],
        texture_patterns: &[(TexturePattern::FiberSeparation, 0.3)],
    },
    DiseaseDef {
        name: "pest_damage",
        color_patterns: &[(ColorPattern::Holes, 0.5)],
        texture_patterns: &[
            (TexturePattern::TunnelPatterns, 0.4),
            (TexturePattern::IrregularHoles, 0.4),
        ],
    },
];

/// Ordered per-crop disease catalog.
pub struct DiseaseCatalog;

impl DiseaseCatalog {
    pub fn for_crop(crop: Crop) -> &'static [DiseaseDef] {
        match crop {
            Crop::Corn => CORN_DISEASES,
            Crop::Tomato => TOMATO_DISEASES,
            Crop::Yam => YAM_DISEASES,
            Crop::Cassava => CASSAVA_DISEASES,
        }
    }
}

/// Relative weights of color vs texture evidence when fusing per-disease.
const COLOR_EVIDENCE_WEIGHT: f32 = 0.6;
const TEXTURE_EVIDENCE_WEIGHT: f32 = 0.4;

pub struct DiseaseDetector {
    thresholds: SeverityThresholds,
}

impl DiseaseDetector {
    pub fn new(thresholds: SeverityThresholds) -> Self {
        Self { thresholds }
    }

    /// Score every cataloged disease for the named crop and report the first
    /// maximum. Unrecognized crops and unanalyzable images fall back to the
    /// `unknown_spoilage` result instead of failing.
    pub fn detect(&self, img: &RgbImage, crop: &str) -> DiseaseResult {
        let Ok(crop) = Crop::from_str(crop) else {
            log::debug!("No disease catalog for crop label {crop:?}");
            return DiseaseResult::unknown_spoilage();
        };
        match self.detect_inner(img, crop) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Disease detection degraded: {e:#}");
                DiseaseResult::unknown_spoilage()
            }
        }
    }

    fn detect_inner(&self, img: &RgbImage, crop: Crop) -> Result<DiseaseResult> {
        let planes = PlaneSet::from_image(img)?;
        let catalog = DiseaseCatalog::for_crop(crop);

        let mut all_scores = Vec::with_capacity(catalog.len());
        for def in catalog {
            let color = weighted_pattern_score(def.color_patterns, |p| {
                color_pattern_score(*p, &planes)
            });
            let texture = weighted_pattern_score(def.texture_patterns, |p| {
                texture_pattern_score(*p, &planes)
            });
            let score = (COLOR_EVIDENCE_WEIGHT * color + TEXTURE_EVIDENCE_WEIGHT * texture)
                .clamp(0.0, 1.0);
            all_scores.push(DiseaseScore {
                disease: def.name.to_string(),
                score,
            });
        }

        // First maximum in catalog order wins.
        let mut best_idx = 0;
        for (i, s) in all_scores.iter().enumerate() {
            if s.score > all_scores[best_idx].score {
                best_idx = i;
            }
        }
        let best_score = all_scores[best_idx].score;
        let def = &catalog[best_idx];
        Ok(DiseaseResult {
            disease: def.name.to_string(),
            confidence: best_score.min(0.95),
            severity: Severity::from_score(best_score, &self.thresholds),
            description: describe(def.name, crop),
            all_scores,
        })
    }
}

/// Fixed per-disease description templates.
fn describe(disease: &str, crop: Crop) -> String {
    let name = crop.name();
    match disease {
        "fungal_infection" => {
            format!("Fungal infection detected on {name}. Characterized by mold growth and discoloration.")
        }
        "bacterial_rot" => {
            format!("Bacterial rot affecting {name}. Shows soft spots and discoloration.")
        }
        "pest_damage" => {
            format!("Pest damage visible on {name}. Shows holes and chewed areas.")
        }
        "overripeness" => {
            let mut title = name.to_string();
            if let Some(first) = title.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            format!("{title} is overripe. Shows color changes and texture deterioration.")
        }
        "blossom_end_rot" => {
            "Blossom end rot in tomato. Dark spot at blossom end due to calcium deficiency."
                .to_string()
        }
        "storage_rot" => {
            format!("Storage rot in {name}. Deterioration due to improper storage conditions.")
        }
        "sprouting" => {
            format!("Sprouting detected in {name}. New growth indicating storage issues.")
        }
        "storage_deterioration" => {
            format!("Storage deterioration in {name}. Quality loss due to storage conditions.")
        }
        _ => format!("Disease detected in {name}."),
    }
}

impl Default for DiseaseDetector {
    fn default() -> Self {
        Self::new(SeverityThresholds::default())
    }
}

fn weighted_pattern_score<P: Copy>(
    patterns: &[(P, f32)],
    mut score_fn: impl FnMut(&P) -> f32,
) -> f32 {
    let mut total = 0.0f32;
    for (pattern, weight) in patterns {
        total += score_fn(pattern) * weight;
    }
    total.clamp(0.0, 1.0)
}

fn color_pattern_score(pattern: ColorPattern, p: &PlaneSet) -> f32 {
    let hsv = &p.hsv;
    match pattern {
        ColorPattern::GraySpots => features::fraction3(&hsv.h, &hsv.s, &hsv.v, |_, s, v| {
            s < 50.0 && (50.0..=150.0).contains(&v)
        }),
        ColorPattern::BlackMold | ColorPattern::DarkSpots => {
            let cutoff = if pattern == ColorPattern::BlackMold {
                40.0
            } else {
                60.0
            };
            features::fraction(&hsv.v, |v| v < cutoff)
        }
        ColorPattern::BrownDiscoloration => {
            features::fraction3(&hsv.h, &hsv.s, &hsv.v, |h, s, v| {
                (10.0..=25.0).contains(&h) && s > 30.0 && v < 120.0
            })
        }
        ColorPattern::YellowEdges => yellow_edges_score(p),
        ColorPattern::Holes => features::hole_score(&p.gray_u8),
        ColorPattern::WhiteFuzzySpots | ColorPattern::WhiteMold => white_fuzzy_score(p),
        ColorPattern::DeepRed => features::fraction3(&hsv.h, &hsv.s, &hsv.v, |h, s, v| {
            (h <= 5.0 || h >= 175.0) && s > 100.0 && v < 150.0
        }),
        ColorPattern::BlackBottom => {
            // Only the bottom third of the image counts.
            let v = &hsv.v;
            let rows = v.nrows();
            if rows == 0 {
                return 0.0;
            }
            let start = rows * 2 / 3;
            let bottom = v.slice(ndarray::s![start.., ..]);
            let dark = bottom.iter().filter(|&&px| px < 40.0).count();
            dark as f32 / bottom.len() as f32
        }
        ColorPattern::GreenShoots => features::fraction3(&hsv.h, &hsv.s, &hsv.v, |h, s, v| {
            (40.0..=80.0).contains(&h) && s > 50.0 && v > 50.0
        }),
        ColorPattern::BlueDiscoloration => features::fraction(&p.lab.b, |b| b < 120.0),
        ColorPattern::BrownStreaks => brown_streaks_score(p),
    }
}

fn yellow_edges_score(p: &PlaneSet) -> f32 {
    let hsv = &p.hsv;
    let yellow = |h: f32, s: f32, v: f32| (20.0..=35.0).contains(&h) && s > 50.0 && v > 100.0;
    let edges = features::canny_edge_mask(&p.gray_u8);
    let dilated = features::dilate_square(&edges, 2);
    // Fraction of the whole image that is yellow near an edge.
    let mut hits = 0usize;
    for ((e, h), (s, v)) in dilated
        .iter()
        .zip(hsv.h.iter())
        .zip(hsv.s.iter().zip(hsv.v.iter()))
    {
        if *e > 0.0 && yellow(*h, *s, *v) {
            hits += 1;
        }
    }
    hits as f32 / dilated.len().max(1) as f32
}

fn white_fuzzy_score(p: &PlaneSet) -> f32 {
    let hsv = &p.hsv;
    // Bright desaturated pixels with high local variance: fuzz, not glare.
    let var = features::local_variance(&p.gray, 2);
    let var_p70 = features::percentile(&var, 70.0);
    let mut hits = 0usize;
    for ((s, v), lv) in hsv.s.iter().zip(hsv.v.iter()).zip(var.iter()) {
        if *s < 30.0 && *v > 200.0 && *lv > var_p70 {
            hits += 1;
        }
    }
    hits as f32 / hsv.s.len().max(1) as f32
}

fn brown_streaks_score(p: &PlaneSet) -> f32 {
    let hsv = &p.hsv;
    let mut brown = ndarray::Array2::<f32>::zeros(hsv.h.raw_dim());
    for (((out, h), s), v) in brown
        .iter_mut()
        .zip(hsv.h.iter())
        .zip(hsv.s.iter())
        .zip(hsv.v.iter())
    {
        if (10.0..=25.0).contains(h) && *s > 30.0 && *v < 120.0 {
            *out = 1.0;
        }
    }
    // Keep only runs long enough to be streaks, in either orientation.
    let horiz = features::open_horizontal(&brown, 7);
    let vert = features::open_vertical(&brown, 7);
    let mut sum = 0.0f32;
    for (h, v) in horiz.iter().zip(vert.iter()) {
        sum += h.max(*v);
    }
    sum / brown.len().max(1) as f32
}

fn texture_pattern_score(pattern: TexturePattern, p: &PlaneSet) -> f32 {
    match pattern {
        TexturePattern::FuzzyGrowth => {
            let lap = features::laplacian(&p.gray);
            (features::variance(&lap) / 1000.0).min(1.0)
        }
        TexturePattern::IrregularSurface => {
            let mag = features::sobel_magnitude(&p.gray);
            let mean = features::mean(&mag);
            if mean > 0.0 {
                (features::std_dev(&mag) / mean / 2.0).min(1.0)
            } else {
                0.0
            }
        }
        TexturePattern::SoftKernels => {
            let density = features::canny_edge_density(&p.gray_u8);
            (1.0 - density * 10.0).max(0.0)
        }
        TexturePattern::LiquidDischarge => {
            let hsv = &p.hsv;
            features::fraction3(&hsv.h, &hsv.s, &hsv.v, |_, s, v| s > 100.0 && v > 200.0)
        }
        TexturePattern::IrregularHoles => {
            features::hole_score(&p.gray_u8) * features::irregular_region_factor(&p.gray_u8)
        }
        TexturePattern::SoftSpots => soft_spots_score(p),
        TexturePattern::WrinkledSurface => {
            let mag = features::sobel_magnitude(&p.gray);
            let p80 = features::percentile(&mag, 80.0);
            features::fraction(&mag, |v| v > p80)
        }
        TexturePattern::SunkenArea => {
            let mean = features::mean(&p.gray);
            let mut dark = ndarray::Array2::<f32>::zeros(p.gray.raw_dim());
            for (out, g) in dark.iter_mut().zip(p.gray.iter()) {
                if *g < mean * 0.7 {
                    *out = 1.0;
                }
            }
            let closed = features::close_square(&dark, 2);
            features::mean(&closed)
        }
        TexturePattern::ProtrudingGrowth => {
            let p80 = features::percentile(&p.gray, 80.0);
            let edges = features::canny_edge_mask(&p.gray_u8);
            let dilated = features::dilate_square(&edges, 1);
            let mut hits = 0usize;
            for (g, e) in p.gray.iter().zip(dilated.iter()) {
                if *g > p80 && *e > 0.0 {
                    hits += 1;
                }
            }
            hits as f32 / p.gray.len().max(1) as f32
        }
        TexturePattern::FiberSeparation => {
            let horiz = features::open_horizontal(&p.gray, 9);
            let vert = features::open_vertical(&p.gray, 9);
            let mut kept = 0usize;
            for (h, v) in horiz.iter().zip(vert.iter()) {
                if h.max(*v) > 0.0 {
                    kept += 1;
                }
            }
            kept as f32 / p.gray.len().max(1) as f32
        }
        TexturePattern::TunnelPatterns => features::tunnel_score(&p.gray_u8),
    }
}

fn soft_spots_score(p: &PlaneSet) -> f32 {
    // Low-detail regions: pixels barely changed by a heavy blur.
    let blurred = features::gaussian_smooth(&p.gray, 2.6);
    let mut diff = ndarray::Array2::<f32>::zeros(p.gray.raw_dim());
    for ((d, g), b) in diff.iter_mut().zip(p.gray.iter()).zip(blurred.iter()) {
        *d = (g - b).abs();
    }
    let p20 = features::percentile(&diff, 20.0);
    features::fraction(&diff, |v| v < p20)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Bright-gray fruit with a black bottom third: the blossom-end-rot
    /// fixture.
    fn rotted_bottom() -> RgbImage {
        let mut img = RgbImage::from_pixel(224, 224, Rgb([200, 200, 200]));
        for y in 150..224 {
            for x in 0..224 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        img
    }

    #[test]
    fn test_blossom_end_rot_detected_on_tomato() {
        let result = DiseaseDetector::default().detect(&rotted_bottom(), "tomato");
        assert_eq!(result.disease, "blossom_end_rot");
        assert!(
            result.confidence >= 0.3,
            "confidence {} too low for this fixture",
            result.confidence
        );
        assert!(result.severity >= Severity::Moderate);
        assert!(result.description.contains("Blossom end rot"));
    }

    #[test]
    fn test_all_scores_follow_catalog_order() {
        let result = DiseaseDetector::default().detect(&rotted_bottom(), "tomato");
        let names: Vec<&str> = result.all_scores.iter().map(|s| s.disease.as_str()).collect();
        assert_eq!(
            names,
            ["fungal_infection", "bacterial_rot", "overripeness", "blossom_end_rot"]
        );
    }

    #[test]
    fn test_unknown_crop_short_circuits() {
        let result = DiseaseDetector::default().detect(&rotted_bottom(), "pineapple");
        assert_eq!(result.disease, "unknown_spoilage");
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.severity, Severity::Moderate);
        assert!(result.all_scores.is_empty());
    }

    #[test]
    fn test_empty_image_short_circuits() {
        let result = DiseaseDetector::default().detect(&RgbImage::new(0, 0), "corn");
        assert_eq!(result.disease, "unknown_spoilage");
        assert!(result.all_scores.is_empty());
    }

    #[test]
    fn test_severity_buckets_partition_unit_interval() {
        let t = SeverityThresholds::default();
        assert_eq!(Severity::from_score(0.0, &t), Severity::Mild);
        assert_eq!(Severity::from_score(0.29, &t), Severity::Mild);
        assert_eq!(Severity::from_score(0.3, &t), Severity::Moderate);
        assert_eq!(Severity::from_score(0.59, &t), Severity::Moderate);
        assert_eq!(Severity::from_score(0.6, &t), Severity::Severe);
        assert_eq!(Severity::from_score(0.79, &t), Severity::Severe);
        assert_eq!(Severity::from_score(0.8, &t), Severity::Critical);
        assert_eq!(Severity::from_score(1.0, &t), Severity::Critical);
    }

    #[test]
    fn test_clean_image_still_reports_an_argmax() {
        // Mid-gray flat image: every detector stays quiet except the
        // soft-kernel one, but an argmax disease is always reported with
        // its (low) confidence.
        let img = RgbImage::from_pixel(128, 128, Rgb([170, 170, 170]));
        let result = DiseaseDetector::default().detect(&img, "corn");
        assert_eq!(result.all_scores.len(), 4);
        assert!(!result.disease.is_empty());
        assert!(result.confidence <= 0.95);
    }

    #[test]
    fn test_confidence_is_capped() {
        let t = SeverityThresholds::default();
        // A saturated score still reports at most 0.95.
        assert_eq!(Severity::from_score(1.0, &t), Severity::Critical);
        let result = DiseaseDetector::default().detect(&rotted_bottom(), "tomato");
        assert!(result.confidence <= 0.95);
    }

    #[test]
    fn test_descriptions_interpolate_crop_name() {
        assert!(describe("fungal_infection", Crop::Yam).contains("yam"));
        assert!(describe("overripeness", Crop::Tomato).starts_with("Tomato"));
    }

    #[test]
    fn test_yellow_edges_score_is_an_image_fraction() {
        // A small yellow patch on a plain background: its border pixels are
        // yellow AND near an edge, but they are a sliver of the image, so the
        // score must stay near zero rather than approaching 1.
        let mut img = RgbImage::from_pixel(224, 224, Rgb([80, 80, 80]));
        for y in 102..122 {
            for x in 102..122 {
                img.put_pixel(x, y, Rgb([255, 255, 0]));
            }
        }
        let planes = PlaneSet::from_image(&img).unwrap();
        let score = yellow_edges_score(&planes);
        assert!(score > 0.0, "the yellow border should register");
        assert!(score < 0.05, "score {score} should scale with image area");
    }

    #[test]
    fn test_white_fuzz_outscores_smooth_white() {
        // Speckled white reads as fuzz; a flat white field does not.
        let smooth = RgbImage::from_pixel(64, 64, Rgb([230, 230, 230]));
        let mut speckled = smooth.clone();
        for y in 0..64 {
            for x in 0..64 {
                let n = ((x * 31 + y * 17) % 26) as u8;
                speckled.put_pixel(x, y, Rgb([230 + n, 230 + n, 230 + n]));
            }
        }
        let smooth_score = white_fuzzy_score(&PlaneSet::from_image(&smooth).unwrap());
        let speckled_score = white_fuzzy_score(&PlaneSet::from_image(&speckled).unwrap());
        assert!(speckled_score > smooth_score);
    }

    #[test]
    fn test_weighted_pattern_score_sums_and_clamps() {
        let patterns: &[(u8, f32)] = &[(0, 0.3), (1, 0.5)];
        let score = weighted_pattern_score(patterns, |p| if *p == 0 { 1.0 } else { 0.0 });
        assert!((score - 0.3).abs() < 1e-6);
        let saturating: &[(u8, f32)] = &[(0, 0.8), (1, 0.8)];
        assert_eq!(weighted_pattern_score(saturating, |_| 1.0), 1.0);
        let empty: &[(u8, f32)] = &[];
        assert_eq!(weighted_pattern_score(empty, |_| 1.0), 0.0);
    }
}
