use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use dualframe::{
    ChannelMode, ComposeOptions, Composer, ComposerConfig, Frame, OutputFormat, RecompressPng,
};

#[derive(Parser, Debug)]
#[command(name = "dualframe", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose every PNG in a directory into dual-channel stills.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Directory of straight-alpha RGBA PNG frames, processed in file name order.
    #[arg(long = "in")]
    in_dir: PathBuf,

    /// Output directory.
    #[arg(long)]
    out: PathBuf,

    /// Which half carries color.
    #[arg(long)]
    mode: Option<ChannelMode>,

    /// Output format: jpeg or png.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// JPEG quality (1-100). Adaptive when omitted.
    #[arg(long)]
    quality: Option<u8>,

    /// Worker thread count.
    #[arg(long)]
    workers: Option<usize>,

    /// JSON config file with engine defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compose byte-identical frames once.
    #[arg(long, default_value_t = false)]
    elide_duplicates: bool,

    /// Recompress PNG output.
    #[arg(long, default_value_t = false)]
    optimize_png: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ComposerConfig::from_path(path)?,
        None => ComposerConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.elide_duplicate_frames |= args.elide_duplicates;

    let inputs = list_pngs(&args.in_dir)?;
    anyhow::ensure!(
        !inputs.is_empty(),
        "no .png files found in '{}'",
        args.in_dir.display()
    );
    let frames = inputs
        .iter()
        .map(|p| load_frame(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    tracing::info!(frames = frames.len(), dir = %args.in_dir.display(), "frames loaded");

    let mut opts = ComposeOptions::new().on_progress(|p| {
        tracing::info!(progress = p, "compose progress");
    });
    opts.mode = args.mode;
    opts.format = args.format;
    opts.quality = args.quality;
    if args.optimize_png {
        opts = opts.png_optimizer(Arc::new(RecompressPng));
    }

    let mut composer = Composer::new(config)?;
    let (encoded, stats) = composer.compose_with_stats(frames, opts)?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;
    for (input, frame) in inputs.iter().zip(&encoded) {
        let stem = input
            .file_stem()
            .with_context(|| format!("input '{}' has no file name", input.display()))?;
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(frame.format.extension());
        let out_path = args.out.join(name);
        std::fs::write(&out_path, &frame.bytes)
            .with_context(|| format!("write '{}'", out_path.display()))?;
    }

    eprintln!(
        "wrote {} frames ({} elided, {} bytes) to {}",
        stats.frames_total,
        stats.frames_elided,
        stats.bytes_out,
        args.out.display()
    );
    Ok(())
}

fn list_pngs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read input dir '{}'", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("list '{}'", dir.display()))?
            .path();
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_png && path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn load_frame(path: &Path) -> anyhow::Result<Frame> {
    let img = image::open(path)
        .with_context(|| format!("decode '{}'", path.display()))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    Frame::from_straight_rgba(w, h, img.into_raw())
        .with_context(|| format!("frame from '{}'", path.display()))
}
