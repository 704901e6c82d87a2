//! Crop produce analysis: species classification, fresh/spoiled quality
//! assessment, disease screening and treatment lookup over single images.
//!
//! The pipeline is a three-stage cascade (see [`pipeline::CropAnalyzer`]):
//! an opaque base classifier fused with hand-tuned heuristics decides the
//! species, per-crop degradation analyses decide fresh vs spoiled, and
//! spoiled produce is screened against a per-crop disease catalog whose
//! diagnosis keys into an embedded treatment table.

pub mod color_utils;
pub mod colorspace;
pub mod config;
pub mod disease;
pub mod features;
pub mod image_input;
pub mod pipeline;
pub mod preprocess;
pub mod quality;
pub mod species;
pub mod treatment;
