//! Uncertainty Curve Example
//!
//! Samples the fuzzy uncertainty estimator over its input domain and exports
//! the curve as CSV. With a requirements file, the values of the enabled
//! lighting and distance splits are labelled instead.
//!
//! Usage:
//! ```bash
//! cargo run --example uncertainty_curve -- \
//!   --domain distance \
//!   --output output/distance_curve.csv
//!
//! cargo run --example uncertainty_curve -- \
//!   --domain light \
//!   --requirements samples/requirements.json \
//!   --steps 11
//! ```

use clap::Parser;
use flexi_logger::{colored_detailed_format, detailed_format, Duplicate, FileSpec, Logger};
use log::{info, warn};
use scene_annotator::config::Requirements;
use scene_annotator::fuzzy::{UncertaintyDomain, UncertaintyEstimator};
use scene_annotator::util;
use std::path::PathBuf;

/// Fuzzy uncertainty curve exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Domain to sample: distance or light
    #[arg(short = 'd', long)]
    domain: UncertaintyDomain,

    /// Destination CSV file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Requirements file; samples the enabled splits of the domain
    #[arg(short = 'r', long)]
    requirements: Option<PathBuf>,

    /// Values per split when sampling a requirements file
    #[arg(short = 'n', long, default_value_t = 10)]
    steps: usize,
}

fn domain_samples(domain: UncertaintyDomain) -> Vec<f64> {
    let (start, stop, step) = domain.input_range();
    let count = ((stop - start) / step).ceil() as usize;
    (0..count).map(|i| start + i as f64 * step).collect()
}

fn requirement_samples(
    domain: UncertaintyDomain,
    requirements: &Requirements,
    steps: usize,
) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let mut values = Vec::new();
    for test_case in requirements.enabled_test_cases() {
        if test_case.uncertainty_domain() != Some(domain) {
            continue;
        }
        let split_values = requirements.sequential_step_values(test_case, steps)?;
        info!("Split {}: {} values", test_case, split_values.len());
        values.extend(split_values);
    }
    Ok(values)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Logger::try_with_str("info")?
        .log_to_file(
            FileSpec::default()
                .directory("logs")
                .suppress_timestamp()
                .suffix("log"),
        )
        .duplicate_to_stdout(Duplicate::All)
        .format_for_files(detailed_format)
        .format_for_stdout(colored_detailed_format)
        .set_palette("196;208;76;39;178".to_string())
        .start()?;

    let cli = Cli::parse();

    let inputs = match &cli.requirements {
        Some(path) => {
            let requirements = Requirements::load_from_json(path)?;
            requirement_samples(cli.domain, &requirements, cli.steps)?
        }
        None => domain_samples(cli.domain),
    };
    if inputs.is_empty() {
        warn!("No enabled split uses the {} domain", cli.domain);
        return Ok(());
    }

    let estimator = UncertaintyEstimator::new()?;
    let mut curve = Vec::with_capacity(inputs.len());
    for value in inputs {
        match estimator.estimate(cli.domain, value) {
            Ok(uncertainty) => curve.push((value, uncertainty)),
            Err(e) => warn!("Skipping {}: {}", value, e),
        }
    }

    let (min, max) = curve
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, u)| {
            (lo.min(*u), hi.max(*u))
        });
    info!(
        "Sampled {} {} values, uncertainty in [{:.6}, {:.6}]",
        curve.len(),
        cli.domain,
        min,
        max
    );

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(format!("output/{}_uncertainty.csv", cli.domain)));
    let input_name = match cli.domain {
        UncertaintyDomain::Distance => "focal_length",
        UncertaintyDomain::Light => "light_energy",
    };
    util::export_uncertainty_curve(&output, input_name, &curve)?;

    Ok(())
}
