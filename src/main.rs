//! EkycToolkit - On-device identity verification
//!
//! Command-line front end for the verification core: runs the liveness and
//! face-match pipeline against files on disk, inspects model assets, and
//! exercises the QR document fast path.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ekyc_toolkit::config::{load_config, save_config, VerifyConfig};
use ekyc_toolkit::frame::Frame;
use ekyc_toolkit::ocr::qr::parse_qr_payload;
use ekyc_toolkit::vision::models::ModelManager;
use ekyc_toolkit::vision::VerificationPipeline;

/// EkycToolkit - identity verification pipeline
#[derive(Parser, Debug)]
#[command(name = "ekyc-toolkit")]
#[command(about = "On-device identity verification: liveness, face match, document OCR")]
struct Args {
    /// Captured identity-document image
    #[arg(long)]
    document: Option<PathBuf>,

    /// Directory of captured video frames, processed in filename order
    #[arg(long)]
    frames: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the models directory
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Show model asset availability and exit
    #[arg(long)]
    model_status: bool,

    /// Download configured model assets and exit
    #[arg(long)]
    download_models: bool,

    /// Write the default configuration to the given path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Parse a raw QR payload and exit
    #[arg(long)]
    qr: Option<String>,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    if let Some(path) = &args.write_config {
        save_config(&VerifyConfig::default(), path)?;
        println!("Wrote default configuration to {:?}", path);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("loading config {:?}", path))?,
        None => VerifyConfig::default(),
    };

    let manager = match args.models_dir.clone().or_else(|| config.models.dir.clone()) {
        Some(dir) => ModelManager::with_dir(dir)?,
        None => ModelManager::new()?,
    };

    if args.model_status {
        print_model_status(&manager, &config);
        return Ok(());
    }

    if args.download_models {
        download_models(&manager, &config)?;
        return Ok(());
    }

    if let Some(payload) = &args.qr {
        match parse_qr_payload(payload) {
            Ok(fields) => println!("{}", serde_json::to_string_pretty(&fields)?),
            Err(e) => println!("QR payload rejected: {}", e),
        }
        return Ok(());
    }

    let (document_path, frames_dir) = match (&args.document, &args.frames) {
        (Some(d), Some(f)) => (d, f),
        _ => {
            println!("Provide --document and --frames to run verification, or see --help");
            return Ok(());
        }
    };

    let document = load_frame(document_path)?;
    let frames = load_frames_dir(frames_dir)?;
    info!(
        "Loaded document {:?} and {} frames from {:?}",
        document_path,
        frames.len(),
        frames_dir
    );

    let pipeline = VerificationPipeline::new(&config, manager);
    let result = pipeline
        .verify(&document, &frames)
        .context("verification failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn print_model_status(manager: &ModelManager, config: &VerifyConfig) {
    println!("Models directory: {:?}", manager.models_dir());
    for (name, candidates) in [
        ("Liveness Classifier", &config.liveness.candidates),
        ("Face Embedding", &config.embedding.candidates),
    ] {
        match manager.locate(candidates) {
            Some(path) => println!("  {}: {:?}", name, path),
            None => println!("  {}: not available (candidates {:?})", name, candidates),
        }
    }
}

fn download_models(manager: &ModelManager, config: &VerifyConfig) -> Result<()> {
    let targets = [
        (
            "Liveness Classifier",
            &config.liveness.download_url,
            config.liveness.candidates.first(),
        ),
        (
            "Face Embedding",
            &config.embedding.download_url,
            config.embedding.candidates.first(),
        ),
    ];

    for (name, url, filename) in targets {
        match (url, filename) {
            (Some(url), Some(filename)) => {
                println!("Downloading {}...", name);
                manager.download_model(url, filename, None)?;
            }
            _ => println!("{}: no download URL configured, skipping", name),
        }
    }
    Ok(())
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to load image {:?}", path))?
        .to_rgba8();
    Ok(Frame::from_rgba_image(image))
}

fn load_frames_dir(dir: &Path) -> Result<Vec<Frame>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read frames directory {:?}", dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("png") | Some("jpg") | Some("jpeg") | Some("webp") | Some("bmp")
            )
        })
        .collect();
    paths.sort();

    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        frames.push(load_frame(path)?);
    }
    Ok(frames)
}
