use clap::Parser;
use env_logger::Builder;
use env_logger::Env;
use log::{error, info, warn, Level};

use colored::*;
use cropscan::color_utils;
use cropscan::config::{AnalyzeCommand, AnalyzeConfig, GlobalArgs};
use cropscan::image_input::{collect_images_from_sources, ImageInputConfig};
use cropscan::pipeline::{report_path, write_report, CropAnalyzer};
use cropscan::quality::QualityStatus;
use std::io::Write;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Analyze crop images for species, quality and disease
    Analyze(AnalyzeCommand),

    /// Show version information
    Version,
}

#[derive(Parser)]
#[command(name = "cropscan")]
#[command(about = "Crop produce analysis toolkit")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn get_log_level_from_verbosity(
    verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::ErrorLevel>,
) -> log::LevelFilter {
    let base_level = verbosity.log_level_filter();
    let adjusted_level = match base_level {
        log::LevelFilter::Off => log::LevelFilter::Off, // -qq -> OFF
        log::LevelFilter::Error => log::LevelFilter::Warn, // default -> WARN
        log::LevelFilter::Warn => log::LevelFilter::Info, // -v -> INFO
        log::LevelFilter::Info => log::LevelFilter::Debug, // -vv -> DEBUG
        log::LevelFilter::Debug => log::LevelFilter::Trace, // -vvv -> TRACE
        log::LevelFilter::Trace => log::LevelFilter::Trace, // -vvvv -> TRACE (max)
    };

    // clap-verbosity-flag doesn't distinguish default from -q, so check the
    // quiet flag directly
    if verbosity.is_silent() {
        log::LevelFilter::Error // -q -> ERROR
    } else {
        adjusted_level
    }
}

fn run_analysis(config: AnalyzeConfig) -> anyhow::Result<(usize, usize)> {
    let input_config = ImageInputConfig::from_strict_flag(config.strict);
    let images = collect_images_from_sources(&config.sources, &input_config)?;
    info!("Found {} image(s) to analyze", images.len());

    let analyzer = CropAnalyzer::from_config(&config)?;
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for path in &images {
        match analyzer.analyze_path(path) {
            Ok(report) => {
                let verdict = match report.quality.status {
                    QualityStatus::Fresh => "fresh".to_string(),
                    QualityStatus::Spoiled => match &report.disease {
                        Some(d) => format!("spoiled ({}, {})", d.disease, d.severity),
                        None => "spoiled".to_string(),
                    },
                    QualityStatus::Unknown => "quality unknown".to_string(),
                };
                info!(
                    "{} {}: {} ({:.0}%) - {}",
                    color_utils::symbols::completed_successfully(),
                    path.display(),
                    report.crop,
                    report.crop_confidence * 100.0,
                    verdict
                );

                if config.report {
                    let out = report_path(path, config.output_dir.as_deref());
                    write_report(&report, &out)?;
                    info!("   Report: {}", out.display());
                }
                succeeded += 1;
            }
            Err(e) => {
                warn!(
                    "{} {}: {e:#}",
                    color_utils::symbols::operation_failed(),
                    path.display()
                );
                failed += 1;
            }
        }
    }

    Ok((succeeded, failed))
}

fn main() {
    let cli = Cli::parse();

    // If user didn't pass -v/-q and RUST_LOG is set, honor the env var.
    let use_env = !cli.global.verbosity.is_present() && std::env::var_os("RUST_LOG").is_some();

    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let level_filter = get_log_level_from_verbosity(cli.global.verbosity.clone());

        let mut b = Builder::new();
        b.filter_level(level_filter);
        b
    };

    logger
        .format(|buf, record| {
            let level_str = match record.level() {
                Level::Error => "ERROR".red().bold().to_string(),
                Level::Warn => "WARN".yellow().to_string(),
                Level::Info => "INFO".green().to_string(),
                Level::Debug => "DEBUG".blue().to_string(),
                Level::Trace => "TRACE".magenta().to_string(),
            };
            writeln!(buf, "[{}] {}", level_str, record.args())
        })
        .init();

    color_utils::init_color_config(cli.global.no_color);

    match &cli.command {
        Some(Commands::Analyze(analyze_cmd)) => {
            let sources_desc = if analyze_cmd.sources.len() == 1 {
                analyze_cmd.sources[0].clone()
            } else {
                format!("{} inputs", analyze_cmd.sources.len())
            };

            info!(
                "{} Crop analysis: {} | spoilage threshold: {} | base weight: {}",
                color_utils::symbols::analysis_start(),
                sources_desc,
                analyze_cmd.spoilage_threshold,
                analyze_cmd.base_weight
            );

            let config = AnalyzeConfig::from_args(cli.global.clone(), analyze_cmd.clone());
            match run_analysis(config) {
                Ok((succeeded, failed)) => {
                    if failed == 0 {
                        info!(
                            "{} Analyzed {succeeded} image(s)",
                            color_utils::symbols::completed_successfully()
                        );
                    } else {
                        warn!(
                            "{} Analyzed {succeeded} image(s), {failed} failed",
                            color_utils::symbols::completed_partially_successfully()
                        );
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    error!(
                        "{} Analysis failed: {e:#}",
                        color_utils::symbols::operation_failed()
                    );
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Version) => {
            println!("cropscan v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Supported crops: corn, yam, cassava, tomato"
            );
        }
        None => {
            // Show help if no command specified
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().unwrap();
        }
    }
}
