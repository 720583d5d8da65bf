use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use whsp::{
    create_router, AppState, AudioFormat, AudioStore, Config, ExportStore, NatsServices,
    NewRecording, Orchestrator, RecordingMode, RecordingRegistry, RecordingService,
};

#[derive(Parser)]
#[command(name = "whsp")]
#[command(about = "Recording transcription, summarization and export service")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/whsp")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// Run one local audio file through the pipeline and print its results
    Process {
        /// Audio file to process
        path: PathBuf,

        /// lecture, meeting, interview or custom
        #[arg(short, long, default_value = "meeting")]
        mode: String,

        /// Instruction for custom mode
        #[arg(short, long)]
        prompt: Option<String>,

        /// Language hint (e.g. "en")
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let service = build_service(&cfg).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&cfg, service).await,
        Command::Process {
            path,
            mode,
            prompt,
            language,
        } => process_file(service, path, &mode, prompt, language).await,
    }
}

async fn build_service(cfg: &Config) -> Result<RecordingService> {
    let pipeline = cfg.pipeline_config();
    let services = Arc::new(NatsServices::connect(&cfg.nats, pipeline.stage_timeout).await?);

    let registry = RecordingRegistry::new();
    let audio = AudioStore::new(&cfg.storage.recordings_path);
    let exports = ExportStore::new(&cfg.storage.exports_path, cfg.export_ttl());
    let orchestrator = Orchestrator::new(
        registry.clone(),
        audio.clone(),
        services.clone(),
        services,
        pipeline,
    );

    info!("Recordings stored in {}", audio.root().display());
    info!(
        "Exports stored in {} (ttl {} min)",
        exports.root().display(),
        exports.ttl().num_minutes()
    );

    Ok(RecordingService::new(registry, audio, orchestrator, exports))
}

async fn serve(cfg: &Config, service: RecordingService) -> Result<()> {
    let sweeper = service.exports().spawn_sweeper(cfg.sweep_interval());

    let state = AppState::new(service).with_max_upload_bytes(cfg.max_upload_bytes());
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed");

    sweeper.abort();
    result
}

async fn process_file(
    service: RecordingService,
    path: PathBuf,
    mode: &str,
    prompt: Option<String>,
    language: Option<String>,
) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("Cannot tell the audio format of {}", path.display()))?;
    let format: AudioFormat = extension.parse()?;
    let mode: RecordingMode = mode.parse()?;

    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let metadata = NewRecording {
        custom_prompt: prompt,
        language_hint: language,
        ..NewRecording::new(format, mode)
    };
    let recording = service.upload(&bytes, metadata).await?;
    info!(
        "Processing {} as recording {} ({:.1}s)",
        path.display(),
        recording.id,
        recording.duration_seconds
    );

    let (_, handle) = service.process(recording.id).await?;
    handle.await.context("Pipeline task panicked")?;

    let results = service.results(recording.id).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}
