//! Configuration layer separating CLI arguments from the internal analysis
//! configuration.
//!
//! CLI concerns (parsing, help text, validation) live in the `*Command`
//! structs; the pipeline consumes `AnalyzeConfig`, built via `from_args`.

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use serde::Serialize;

use crate::disease::SeverityThresholds;
use crate::quality::QualityParams;
use crate::species::FusionParams;

/// Parse probability value (must be between 0.0 and 1.0)
pub fn parse_probability(s: &str) -> Result<f32, String> {
    let val = s
        .parse::<f32>()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if !(0.0..=1.0).contains(&val) {
        return Err(format!("Must be between 0.0 and 1.0, got {val}"));
    }
    Ok(val)
}

/// Global CLI arguments that apply to all cropscan commands
#[derive(Parser, Debug, Clone)]
pub struct GlobalArgs {
    /// Global output directory for report files (default: next to each input)
    #[arg(long, global = true)]
    pub output_dir: Option<String>,

    /// Verbosity level (-q/--quiet, -v/-vv/-vvv/-vvvv for info/debug/trace)
    #[command(flatten)]
    pub verbosity: Verbosity,

    /// Fail on missing or unsupported input files instead of warning
    #[arg(long, global = true)]
    pub strict: bool,

    /// Disable colored output (also respects NO_COLOR and CROPSCAN_NO_COLOR env vars)
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// CLI command for image analysis (only command-specific arguments)
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeCommand {
    /// Path(s) to input images or directories. Supports glob patterns like *.jpg
    #[arg(value_name = "IMAGES_OR_DIRS", required = true)]
    pub sources: Vec<String>,

    /// Write a per-image TOML report file next to each input
    #[arg(long)]
    pub report: bool,

    /// Spoilage score at or above which produce is reported spoiled (0.0-1.0)
    #[arg(long, default_value = "0.3", value_parser = parse_probability)]
    pub spoilage_threshold: f32,

    /// Weight on the base classifier relative to the image heuristics (0.0-1.0)
    #[arg(long, default_value = "0.7", value_parser = parse_probability)]
    pub base_weight: f32,
}

/// Internal configuration for the analysis pipeline
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeConfig {
    /// Input sources (images, directories, or glob patterns)
    pub sources: Vec<String>,
    /// Optional output directory override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Write per-image TOML report files
    pub report: bool,
    /// Use strict mode (fail if files are not found or are unsupported)
    pub strict: bool,
    pub fusion: FusionParams,
    pub quality: QualityParams,
    pub severity: SeverityThresholds,
}

impl AnalyzeConfig {
    /// Create configuration from global args and command-specific args
    pub fn from_args(global: GlobalArgs, cmd: AnalyzeCommand) -> Self {
        Self {
            sources: cmd.sources,
            output_dir: global.output_dir,
            report: cmd.report,
            strict: global.strict,
            fusion: FusionParams {
                base_weight: cmd.base_weight,
                heuristic_weight: 1.0 - cmd.base_weight,
            },
            quality: QualityParams {
                spoilage_threshold: cmd.spoilage_threshold,
                ..QualityParams::default()
            },
            severity: SeverityThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> GlobalArgs {
        GlobalArgs::parse_from(["cropscan"])
    }

    fn analyze_cmd(extra: &[&str]) -> AnalyzeCommand {
        let mut argv = vec!["analyze", "img.jpg"];
        argv.extend_from_slice(extra);
        AnalyzeCommand::parse_from(argv)
    }

    #[test]
    fn test_parse_probability() {
        assert_eq!(parse_probability("0.5"), Ok(0.5));
        assert_eq!(parse_probability("0.0"), Ok(0.0));
        assert_eq!(parse_probability("1.0"), Ok(1.0));
        assert!(parse_probability("1.5").is_err());
        assert!(parse_probability("-0.1").is_err());
        assert!(parse_probability("abc").is_err());
    }

    #[test]
    fn test_defaults_flow_into_config() {
        let config = AnalyzeConfig::from_args(global(), analyze_cmd(&[]));
        assert_eq!(config.sources, vec!["img.jpg"]);
        assert!(!config.report);
        assert!(!config.strict);
        assert!((config.fusion.base_weight - 0.7).abs() < 1e-6);
        assert!((config.fusion.heuristic_weight - 0.3).abs() < 1e-6);
        assert!((config.quality.spoilage_threshold - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_base_weight_overrides_fusion() {
        let config = AnalyzeConfig::from_args(global(), analyze_cmd(&["--base-weight", "0.6"]));
        assert!((config.fusion.base_weight - 0.6).abs() < 1e-6);
        assert!((config.fusion.heuristic_weight - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_spoilage_threshold_override() {
        let config =
            AnalyzeConfig::from_args(global(), analyze_cmd(&["--spoilage-threshold", "0.45"]));
        assert!((config.quality.spoilage_threshold - 0.45).abs() < 1e-6);
        assert!((config.quality.confidence_cap - 0.95).abs() < 1e-6);
    }
}
