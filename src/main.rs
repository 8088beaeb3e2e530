use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use watchcam::analyzer::SnapshotAnnotator;
use watchcam::camera::{CameraBuilder, CameraSettings};
use watchcam::handoff::{ArtifactNaming, DropboxUploader, FfmpegEncoder, HandoffContext, Uploader};
use watchcam::{
    install_signal_handlers, CaptureController, Clock, EventBus, Scheduler, SystemClock,
    WatchcamConfig, WatchcamError,
};

#[derive(Parser, Debug)]
#[command(name = "watchcam")]
#[command(about = "Unattended camera recorder with day/night scheduling and motion-triggered uploads")]
#[command(version)]
#[command(long_about = "Drives a Raspberry Pi camera through day and night exposure profiles, \
records either size-bounded video segments or motion-triggered snapshots, and hands finished \
artifacts to a background encoder and uploader. Intended to run under systemd.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "watchcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without opening the camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - configure the camera once and exit
    #[arg(long, help = "Open and configure the camera for the current time state, then exit")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rotated files in this directory
    #[arg(long, value_name = "DIR", help = "Directory for daily rotated log files")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.print_config {
        if let Err(e) = print_default_config() {
            eprintln!("Failed to render default configuration: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let guard = match init_logging(&args) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {}", e);
            std::process::exit(1);
        }
    };

    let exit_code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("Watchcam failed: {:#}", e);
            e.downcast_ref::<WatchcamError>()
                .map(WatchcamError::exit_code)
                .unwrap_or(1)
        }
    };

    info!("Watchcam exited with code: {}", exit_code);

    // Flush the file writer before exiting for systemd
    drop(guard);
    std::process::exit(exit_code);
}

async fn run(args: Args) -> Result<i32> {
    info!("Starting watchcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = WatchcamConfig::load_from_file(&args.config).map_err(WatchcamError::from)?;
    config.validate().map_err(WatchcamError::from)?;

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(0);
    }

    let tz = config.schedule.tz().map_err(WatchcamError::from)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(tz));

    let mut camera = CameraBuilder::new().config(config.camera.clone()).build()?;

    if args.dry_run {
        let scheduler = Scheduler::from_config(&config.schedule).map_err(WatchcamError::from)?;
        let state = scheduler.current_time_state(clock.now().time());
        let settings = CameraSettings::for_time_state(&config, state)?;
        camera.configure(&settings).await?;
        camera.shutdown().await?;
        info!("Dry run - camera configured for {} and released", state);
        println!("✓ Dry run completed successfully - camera configured for {}", state);
        return Ok(0);
    }

    let uploader: Option<Arc<dyn Uploader>> = if config.upload.upload_enabled {
        Some(Arc::new(DropboxUploader::from_config(&config.upload)?))
    } else {
        warn!("Upload disabled; converted segments stay in {}", config.recording.output_path);
        None
    };

    let event_bus = EventBus::default();
    let handoff = HandoffContext {
        encoder: Arc::new(FfmpegEncoder::from_config(&config.recording)),
        uploader,
        naming: ArtifactNaming::from_config(&config.recording, &config.upload),
        output_dir: PathBuf::from(&config.recording.output_path),
        annotator: Arc::new(SnapshotAnnotator::new(&config.motion, config.camera.text_size)),
        event_bus: event_bus.clone(),
    };

    let cancel = CancellationToken::new();
    let mut controller = CaptureController::new(config, camera, clock, handoff, cancel.clone())?;
    let mut shutdown = install_signal_handlers(cancel, event_bus);

    let outcome = controller.run().await?;
    if let Ok(reason) = shutdown.try_recv() {
        info!("Shutdown reason: {}", reason);
    }

    Ok(outcome.exit_code())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("watchcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "watchcam.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()?;

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Watchcam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();

    let rendered = toml::to_string_pretty(&WatchcamConfig::default()).map_err(WatchcamError::from)?;
    println!("{}", rendered);
    Ok(())
}
