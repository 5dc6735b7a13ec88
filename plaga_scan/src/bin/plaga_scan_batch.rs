//! Scans tomato-leaf images from the command line and writes the same
//! annotated images and PDF report the web app produces.
//!
//! ```bash
//! plaga-scan-batch leaf1.jpg leaf2.png --output-dir out --format json
//! ```

use clap::{ArgAction, Parser, ValueEnum};
use plaga_scan::{build_scanner, config, scanner::Upload};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "plaga-scan-batch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Detect tomato-leaf pests in a set of images and write a PDF report", long_about = None)]
struct Cli {
    /// Images to scan (jpg, jpeg or png)
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Directory containing base.yaml and the environment overlays
    #[arg(long, default_value = "configuration")]
    config_dir: PathBuf,

    /// Where batch folders are written, overrides scan.upload_dir
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// ONNX model file, overrides model.model_dir and model.onnx_file
    // must not collide with a `PLAGA_<section>` config override
    #[arg(short, long, env = "PLAGA_BATCH_MODEL")]
    model: Option<PathBuf>,

    /// Minimum detection confidence
    #[arg(long)]
    min_probability: Option<f32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},ort=warn", level).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::get_configuration_from(&cli.config_dir)?;
    if let Some(output_dir) = cli.output_dir {
        config.scan.upload_dir = output_dir;
    }
    if let Some(model) = cli.model {
        let file_name = model
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format!("Invalid model path: {:?}", model))?;
        config.model.onnx_file = file_name.to_string();
        config.model.model_dir = model
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
    }
    if let Some(min_probability) = cli.min_probability {
        config.model.min_probability = min_probability;
    }

    let scanner = build_scanner(&config)?;

    let mut uploads = Vec::with_capacity(cli.images.len());
    for path in &cli.images {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        uploads.push(Upload::new(file_name, data));
    }

    let start = Instant::now();
    let report = scanner.scan_batch(&uploads).await?;
    info!(
        "Scanned {} images in {:.2}ms",
        report.images.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let batch_dir = scanner.store().batch_dir(&report.batch_id);
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for image in &report.images {
                println!("{} -> {}", image.source_name, batch_dir.join(&image.annotated_name).display());
                if image.detections.is_empty() {
                    println!("  No pests detected");
                }
                for detection in &image.detections {
                    println!("  {}", detection.summary());
                }
            }
            println!("Report: {}", batch_dir.join(&report.report_name).display());
        }
    }

    Ok(())
}
