use anyhow::{Context, Result};
use clap::{Arg, Command, crate_version};
use log::{info, warn};
use motion_mask::core_modules::utils::image_helper::{load_frame, save_difference, save_mask};
use motion_mask::{
    BorderPolicy, MotionPipeline, ParallelPipeline, PipelineConfig, StructuringElement, Threshold,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // --- 1. Argument Parsing ---
    let matches = Command::new("mask_tester")
        .version(crate_version!())
        .about("Computes a frame-difference motion mask between two still images")
        .arg(Arg::new("start").help("Start frame image").required(true))
        .arg(Arg::new("end").help("End frame image").required(true))
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .short('t')
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("30")
                .help("Pixels whose difference exceeds this value are moving (0-255)"),
        )
        .arg(
            Arg::new("denoise")
                .long("denoise")
                .short('d')
                .help("Remove isolated noise with a morphological opening"),
        )
        .arg(
            Arg::new("cross")
                .long("cross")
                .help("Use a 3x3 cross instead of the 3x3 square for the opening"),
        )
        .arg(
            Arg::new("ignore-border")
                .long("ignore-border")
                .help("Skip off-frame neighbours instead of treating them as background"),
        )
        .arg(
            Arg::new("mask-out")
                .long("mask-out")
                .short('m')
                .takes_value(true)
                .help("Write the binary mask as a PNG"),
        )
        .arg(
            Arg::new("diff-out")
                .long("diff-out")
                .takes_value(true)
                .help("Write the raw difference image as a PNG"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .help("Process row bands on a worker pool"),
        )
        .get_matches();

    let start_path = matches.value_of("start").context("missing start frame")?;
    let end_path = matches.value_of("end").context("missing end frame")?;
    let threshold: i64 = matches
        .value_of("threshold")
        .context("missing threshold")?
        .parse()
        .context("threshold must be an integer")?;

    // --- 2. Pipeline Configuration ---
    let config = PipelineConfig {
        threshold: Threshold::new(threshold)?,
        denoise: matches.is_present("denoise"),
        structuring_element: if matches.is_present("cross") {
            StructuringElement::cross(3)?
        } else {
            StructuringElement::default()
        },
        border: if matches.is_present("ignore-border") {
            BorderPolicy::Ignore
        } else {
            BorderPolicy::Background
        },
    };

    // --- 3. Frame Loading ---
    if start_path == end_path {
        warn!("comparing {} with itself; the mask will be empty", start_path);
    }
    let start = load_frame(start_path).with_context(|| format!("failed to load start frame {}", start_path))?;
    let end = load_frame(end_path).with_context(|| format!("failed to load end frame {}", end_path))?;
    info!("loaded {} frames", start.dimensions());

    // --- 4. Processing ---
    let report = if matches.is_present("parallel") {
        let pipeline = ParallelPipeline::new(config);
        let report = pipeline.process(start, end).await?;
        pipeline.shutdown().await;
        report
    } else {
        MotionPipeline::new(config).process(&start, &end)?
    };

    // --- 5. Output ---
    if let Some(path) = matches.value_of("mask-out") {
        save_mask(path, &report.mask).with_context(|| format!("failed to write mask to {}", path))?;
        info!("mask written to {}", path);
    }
    if let Some(path) = matches.value_of("diff-out") {
        save_difference(path, &report.difference)
            .with_context(|| format!("failed to write difference image to {}", path))?;
        info!("difference image written to {}", path);
    }

    println!(
        "Motion between frames: {:.2}% ({} of {} pixels, max delta {})",
        report.motion_ratio(),
        report.mask.foreground_count(),
        report.mask.dimensions().len(),
        report.difference.max_delta()
    );

    Ok(())
}
