//! The analysis cascade: species classification, then quality assessment,
//! then (only for spoiled produce) disease detection and treatment lookup.
//! One call analyzes one image; the pipeline holds no cross-call state.

use anyhow::{Context, Result};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AnalyzeConfig;
use crate::disease::{DiseaseDetector, DiseaseResult};
use crate::preprocess;
use crate::quality::{QualityAssessor, QualityResult, QualityStatus};
use crate::species::{FixedWeightScorer, SpeciesClassifier, SpeciesDistribution};
use crate::treatment::{TreatmentDatabase, TreatmentPlan};

/// Everything the pipeline produced for one image.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub source: String,
    pub crop: String,
    pub crop_confidence: f32,
    pub processing_time_s: f64,
    pub species: SpeciesDistribution,
    pub quality: QualityResult,
    /// Present only when the produce was judged spoiled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease: Option<DiseaseResult>,
    /// Present whenever a disease was diagnosed; diagnoses without a
    /// dedicated table entry carry the generic plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<TreatmentPlan>,
}

pub struct CropAnalyzer {
    classifier: SpeciesClassifier,
    quality: QualityAssessor,
    disease: DiseaseDetector,
    treatments: TreatmentDatabase,
}

impl CropAnalyzer {
    pub fn from_config(config: &AnalyzeConfig) -> Result<Self> {
        Ok(Self {
            classifier: SpeciesClassifier::new(
                Box::new(FixedWeightScorer::default()),
                config.fusion,
            ),
            quality: QualityAssessor::new(config.quality),
            disease: DiseaseDetector::new(config.severity),
            treatments: TreatmentDatabase::load()?,
        })
    }

    /// Run the full cascade on an already-loaded image.
    pub fn analyze_image(&self, img: &RgbImage, source: &str) -> AnalysisReport {
        let start = Instant::now();

        let species = self.classifier.classify(img);
        let (crop, crop_confidence) = species.top();
        log::debug!("{source}: species {crop} ({crop_confidence:.3})");

        let quality = self.quality.assess(img, crop.name());
        log::debug!(
            "{source}: quality {} (spoilage {:.3})",
            quality.status,
            quality.spoilage_score
        );

        // Disease detection and treatment lookup only matter for spoiled
        // produce.
        let disease = if quality.status == QualityStatus::Spoiled {
            Some(self.disease.detect(img, crop.name()))
        } else {
            None
        };
        let treatment = disease
            .as_ref()
            .map(|d| self.treatments.get(crop.name(), &d.disease, d.severity).clone());
        if quality.status == QualityStatus::Spoiled {
            let general = self.treatments.general_recommendations(crop.name());
            for tip in &general.best_practices {
                log::debug!("{source}: {tip}");
            }
        }

        AnalysisReport {
            source: source.to_string(),
            crop: crop.name().to_string(),
            crop_confidence,
            processing_time_s: start.elapsed().as_secs_f64(),
            species,
            quality,
            disease,
            treatment,
        }
    }

    /// Load an image from disk and analyze it.
    pub fn analyze_path(&self, path: &Path) -> Result<AnalysisReport> {
        let img = image::open(path)
            .with_context(|| format!("Failed to load image: {}", path.display()))?;
        let resized = preprocess::resize_for_analysis(&img);
        Ok(self.analyze_image(&resized, &path.display().to_string()))
    }
}

/// Where the TOML report for an image goes: next to the image, or under the
/// configured output directory.
pub fn report_path(image_path: &Path, output_dir: Option<&str>) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let file_name = format!("{stem}.cropscan.toml");
    match output_dir {
        Some(dir) => Path::new(dir).join(file_name),
        None => image_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(file_name),
    }
}

/// Serialize a report to its TOML file, creating the output directory if
/// needed.
pub fn write_report(report: &AnalysisReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }
    }
    let toml_str =
        toml::to_string_pretty(report).context("Failed to serialize analysis report")?;
    std::fs::write(path, toml_str)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}
