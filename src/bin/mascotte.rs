//! Mascotte binary: run the avatar with microphone capture.
//!
//! Usage: `mascotte [--config path/to/config.toml]`
//!
//! Runs until interrupted. Logs go to stderr and to a daily file under
//! the platform data directory; `RUST_LOG` overrides the default
//! filter.

use mascotte::audio::playback::CpalSink;
use mascotte::audio::record::CpalRecorder;
use mascotte::avatar::{NullAvatar, registry};
use mascotte::capture::SpeechCaptureStage;
use mascotte::prompter;
use mascotte::stt::shared_transcriber;
use mascotte::synth::PiperProcess;
use mascotte::viewer::{ViewerParts, ViewerRuntime};
use mascotte::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let log_dir = dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("mascotte")
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "mascotte.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mascotte=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let config = match parse_config_path()? {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };

    println!("Mascotte v{}", env!("CARGO_PKG_VERSION"));

    // fail fast on missing resources before entering the loop
    let models_dir = PathBuf::from("models");
    registry::model_path(&models_dir, &config.viewer.model)?;

    let synthesizer = Arc::new(PiperProcess::new(&config.tts)?);
    let sink = Box::new(CpalSink::new(&config.tts)?);
    let transcriber = shared_transcriber(&config.stt)?;
    let recorder = CpalRecorder::new(&config.capture)?;

    let mut runtime = ViewerRuntime::initialize(
        config.clone(),
        ViewerParts {
            avatar: Box::new(NullAvatar::new()),
            sink,
            synthesizer,
        },
    )?;
    let handle = runtime.handle();

    let mut capture = SpeechCaptureStage::new(config.queues.capture, config.queues.results);
    capture.start(Box::new(recorder), Arc::new(transcriber), &config.capture);

    if !handle.send_text(prompter::greeting(&config.stt.language), true) {
        warn!("greeting dropped");
    }

    info!("running; interrupt to exit");
    let frame_delay = Duration::from_millis(config.viewer.frame_delay_ms);
    while !handle.stop_requested() {
        runtime.tick(Instant::now());
        while let Some(text) = capture.poll_transcript() {
            info!("heard: {text}");
            runtime.add_user_message(&text);
        }
        std::thread::sleep(frame_delay);
    }

    capture.stop();
    runtime.cleanup();
    Ok(())
}

fn parse_config_path() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(None),
        Some("--config") => args
            .next()
            .map(PathBuf::from)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("--config requires a path")),
        Some(other) => Err(anyhow::anyhow!(
            "unknown argument '{other}'; usage: mascotte [--config <path>]"
        )),
    }
}
