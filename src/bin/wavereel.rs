use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "wavereel", version, about = "Render audio into a waveform video")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a WAV file into a Matroska/WebM waveform video.
    Render(RenderArgs),
    /// Render a single frame of the waveform video as a PNG.
    Frame(FrameArgs),
    /// Print the tracks declared by a container written by `render`.
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// Job config JSON (`render`, `encode` and `backend` sections, all optional).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Waveform color, `#RRGGBB` or `#RRGGBBAA`.
    #[arg(long)]
    wave_color: Option<wavereel::Color>,

    /// Background color, `#RRGGBB` or `#RRGGBBAA`.
    #[arg(long)]
    bg_color: Option<wavereel::Color>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Input WAV file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output container path (`.webm` for the ffmpeg backend, `.mkv` for raw).
    #[arg(long)]
    out: PathBuf,

    /// Encoder backend; overrides the config file.
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Input WAV file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Container file to inspect.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Raw,
    Ffmpeg,
}

impl From<BackendChoice> for wavereel::BackendKind {
    fn from(c: BackendChoice) -> Self {
        match c {
            BackendChoice::Raw => Self::Raw,
            BackendChoice::Ffmpeg => Self::Ffmpeg,
        }
    }
}

// The job blocks its thread while ffmpeg drains; progress and ctrl-c run on the workers.
#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args).await,
        Command::Frame(args) => cmd_frame(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn load_job_config(style: &StyleArgs) -> anyhow::Result<wavereel::JobConfig> {
    let mut cfg = match &style.config {
        Some(path) => wavereel::JobConfig::load(path)?,
        None => wavereel::JobConfig::default(),
    };
    let r = &mut cfg.render;
    if let Some(v) = style.width {
        r.width = v;
    }
    if let Some(v) = style.height {
        r.height = v;
    }
    if let Some(v) = style.fps {
        r.fps = v;
    }
    if let Some(v) = style.wave_color {
        r.wave_color = v;
    }
    if let Some(v) = style.bg_color {
        r.bg_color = v;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

async fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = load_job_config(&args.style)?;
    if let Some(b) = args.backend {
        cfg.backend = b.into();
    }

    let audio = wavereel::decode_wav(&args.in_path)?;
    tracing::info!(
        path = %args.in_path.display(),
        sample_rate = audio.sample_rate(),
        channels = audio.channel_count(),
        seconds = audio.duration_secs(),
        "decoded input"
    );

    let mut controller = wavereel::JobController::new(wavereel::create_backend(cfg.backend))
        .with_settings(cfg.encode.clone());
    controller.load_audio(audio);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<wavereel::JobStatus>();
    controller.set_observer(tx);
    let printer = tokio::spawn(async move {
        let mut last_shown = -1i64;
        while let Some(status) = rx.recv().await {
            let pct = status.percent.floor() as i64;
            if pct != last_shown || status.state.is_terminal() {
                last_shown = pct;
                eprintln!("[{pct:>3}%] {}", status.message);
            }
        }
    });

    let cancel = wavereel::CancelToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling job");
            on_ctrl_c.cancel();
        }
    });

    let result = controller.generate(&cfg.render, &cancel).await;
    // Dropping the controller drops the observer so the printer drains and exits.
    drop(controller);
    printer.await.context("progress printer task failed")?;
    let output = result?;

    ensure_parent_dir(&args.out)?;
    std::fs::write(&args.out, &output.bytes)
        .with_context(|| format!("write container '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} frames, {} audio chunks, {} bytes)",
        args.out.display(),
        output.frames,
        output.chunks,
        output.bytes.len()
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = load_job_config(&args.style)?;
    let audio = wavereel::decode_wav(&args.in_path)?;

    let mut controller = wavereel::JobController::new(wavereel::create_backend(cfg.backend));
    controller.load_audio(audio);
    let frame = controller.preview_frame(&cfg.render, wavereel::FrameIndex(args.frame))?;

    ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba8(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read container '{}'", args.in_path.display()))?;
    let report = wavereel::probe(&bytes)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize probe report")?
    );
    Ok(())
}
