use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use hot_target::tracker::{
    Decision, FrameClassifier, FrameReport, MemoryStore, SharedThresholds, TargetTable,
    Thresholds,
};
use hot_target::{
    config::ConfigWatcher, FramePipeline, HsvExtractor, MjpegCamera, StopMode, TrackerConfig,
};
use log::{info, warn, LevelFilter};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "hot-target", version, about = "Hot goal tracker for MJPEG cameras")]
struct Cli {
    /// off, error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,
    /// Emit JSON log lines (only with the `tracing` feature).
    /// `RUST_LOG` overrides `--log-level` under that feature.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify still images and print one JSON report per image.
    Classify {
        config: PathBuf,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Track a live camera until a decision is reported.
    Track {
        config: PathBuf,
        /// Give up after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Open the decision window right away.
        #[arg(long)]
        window: bool,
    },
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse().map_err(|_| format!("unknown log level `{s}`"))
}

#[derive(Serialize)]
struct ImageReport<'a> {
    image: &'a Path,
    #[serde(flatten)]
    report: FrameReport,
}

fn init_logging(level: LevelFilter, json: bool) {
    #[cfg(feature = "tracing")]
    hot_target::core::init_tracing(level, json);
    #[cfg(not(feature = "tracing"))]
    {
        if json {
            eprintln!("--log-json needs the `tracing` feature; using plain logs");
        }
        if let Err(e) = hot_target::core::init_with_level(level) {
            eprintln!("failed to install logger: {e}");
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_json);

    match cli.command {
        Command::Classify { config, images } => classify(&config, &images),
        Command::Track {
            config,
            timeout_secs,
            window,
        } => track(&config, timeout_secs.map(Duration::from_secs), window),
    }
}

fn classify(config_path: &Path, images: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let config = TrackerConfig::load(config_path)?;
    let extractor = HsvExtractor::new(config.extractor.clone())?;

    // Stills have no timing, so votes count from the first image.
    let thresholds = Thresholds {
        start_delay_ms: 0,
        ..config.thresholds
    };
    let table = TargetTable::new(Arc::new(MemoryStore::new()));
    table.init();
    let mut classifier = FrameClassifier::new(SharedThresholds::new(thresholds)?, table);

    let mut out = std::io::stdout().lock();
    for path in images {
        let frame = image::open(path)?.to_rgb8();
        classifier.table().set_window_active(true);
        let report = classifier.process_frame(&extractor, &frame, Instant::now())?;
        if let Some(decision) = report.decision {
            info!("{}: decision {decision}", path.display());
        }
        serde_json::to_writer(&mut out, &ImageReport { image: path, report })?;
        writeln!(out)?;
    }
    Ok(())
}

fn track(
    config_path: &Path,
    timeout: Option<Duration>,
    open_window: bool,
) -> Result<(), Box<dyn Error>> {
    let config = TrackerConfig::load(config_path)?;
    let camera = MjpegCamera::new(config.camera.settings()?);
    let extractor = HsvExtractor::new(config.extractor.clone())?;

    let table = TargetTable::new(Arc::new(MemoryStore::new()));
    table.init();
    if open_window {
        table.set_window_active(true);
    }
    let thresholds = SharedThresholds::new(config.thresholds)?;
    let classifier = FrameClassifier::new(thresholds.clone(), table.clone());

    let mut pipeline =
        FramePipeline::spawn(camera, extractor, classifier, config.pipeline_settings())?;
    let mut watcher = ConfigWatcher::new(config_path);

    let started = Instant::now();
    let mut last_status = started;
    let outcome = loop {
        let state = table.state();
        if state.is_terminal() {
            break Some(state);
        }
        if timeout.is_some_and(|limit| started.elapsed() >= limit) {
            break None;
        }

        match watcher.poll() {
            Some(Ok(updated)) => match thresholds.set(updated.thresholds) {
                Ok(()) => info!("reloaded thresholds from {}", watcher.path().display()),
                Err(e) => warn!("ignoring reloaded thresholds: {e}"),
            },
            Some(Err(e)) => warn!("ignoring config change: {e}"),
            None => {}
        }

        if last_status.elapsed() >= Duration::from_secs(1) {
            last_status = Instant::now();
            info!(
                "{:.1} fps, {} frames processed, {} dropped",
                pipeline.fps(),
                pipeline.frames_processed(),
                pipeline.frames_dropped()
            );
        }
        thread::sleep(Duration::from_millis(20));
    };

    pipeline.shutdown(StopMode::Graceful);
    let decision = outcome.unwrap_or_else(|| {
        warn!("no decision before the timeout");
        Decision::Unknown
    });
    println!("{decision}");
    Ok(())
}
