//! Treatment lookup: an embedded reference table mapping crop, disease, and
//! severity to recommended actions, with a generic fallback plan for
//! combinations the table does not cover, plus per-crop handling guidance.

use crate::disease::Severity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TREATMENTS_TOML: &str = include_str!("../data/treatments.toml");

/// One recommended course of action for a crop/disease/severity combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub immediate_actions: Vec<String>,
    pub prevention: Vec<String>,
    pub treatments: Vec<String>,
}

/// Crop-level care guidance, independent of any diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralRecommendations {
    pub common_issues: Vec<String>,
    pub best_practices: Vec<String>,
    pub optimal_conditions: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PlanEntry {
    crop: String,
    disease: String,
    severity: String,
    #[serde(flatten)]
    plan: TreatmentPlan,
}

#[derive(Debug, Deserialize)]
struct GeneralEntry {
    crop: String,
    #[serde(flatten)]
    recommendations: GeneralRecommendations,
}

#[derive(Debug, Deserialize)]
struct TreatmentFile {
    generic: TreatmentPlan,
    plans: Vec<PlanEntry>,
    general: Vec<GeneralEntry>,
    general_fallback: GeneralRecommendations,
}

pub struct TreatmentDatabase {
    generic: TreatmentPlan,
    plans: Vec<PlanEntry>,
    general: Vec<GeneralEntry>,
    general_fallback: GeneralRecommendations,
}

impl TreatmentDatabase {
    /// Parse the embedded treatment table.
    pub fn load() -> Result<Self> {
        let file: TreatmentFile =
            toml::from_str(TREATMENTS_TOML).context("Failed to parse embedded treatment table")?;
        Ok(Self {
            generic: file.generic,
            plans: file.plans,
            general: file.general,
            general_fallback: file.general_fallback,
        })
    }

    /// Look up the plan for a crop/disease/severity combination. Combinations
    /// without a dedicated entry get the generic fallback plan.
    pub fn get(&self, crop: &str, disease: &str, severity: Severity) -> &TreatmentPlan {
        self.plans
            .iter()
            .find(|e| e.crop == crop && e.disease == disease && e.severity == severity.name())
            .map(|e| &e.plan)
            .unwrap_or(&self.generic)
    }

    /// True when the combination has its own entry rather than the fallback.
    pub fn has_specific(&self, crop: &str, disease: &str, severity: Severity) -> bool {
        self.plans
            .iter()
            .any(|e| e.crop == crop && e.disease == disease && e.severity == severity.name())
    }

    /// Handling guidance for the crop as a whole. Unrecognized crops get the
    /// generic guidance.
    pub fn general_recommendations(&self, crop: &str) -> &GeneralRecommendations {
        self.general
            .iter()
            .find(|e| e.crop == crop)
            .map(|e| &e.recommendations)
            .unwrap_or(&self.general_fallback)
    }
}
