use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use artframe::{
    ArtworkItem, BatchOpts, BatchRunner, FrameCatalog, FsLedgerStore, FsOutputStore,
    LedgerStore as _, PixelPoint, Quad, SessionId, StorageConfig,
};

#[derive(Parser, Debug)]
#[command(name = "artframe", version)]
struct Cli {
    /// Storage config JSON (frames_dir, results_dir, catalog_path).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative storage paths against this directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log per-item detail.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage registered frame photos.
    #[command(subcommand)]
    Frame(FrameCommand),
    /// Composite a batch of artwork into a registered frame.
    Process(ProcessArgs),
    /// Composite one artwork into a background with corners given inline.
    Composite(CompositeArgs),
    /// Print the ledger of a finished batch session.
    Session(SessionArgs),
}

#[derive(Subcommand, Debug)]
enum FrameCommand {
    /// Register a frame photo.
    Add(FrameAddArgs),
    /// Save the four opening corners of a frame.
    Corners(FrameCornersArgs),
    /// List registered frames.
    List,
    /// Print one frame record as JSON.
    Show(FrameIdArgs),
}

#[derive(Parser, Debug)]
struct FrameAddArgs {
    /// Frame photo to register.
    #[arg(long)]
    image: PathBuf,

    /// Display name.
    #[arg(long)]
    name: String,
}

#[derive(Parser, Debug)]
struct CornerArgs {
    /// Top-left corner as `x,y`.
    #[arg(long)]
    tl: PixelPoint,

    /// Top-right corner as `x,y`.
    #[arg(long)]
    tr: PixelPoint,

    /// Bottom-right corner as `x,y`.
    #[arg(long)]
    br: PixelPoint,

    /// Bottom-left corner as `x,y`.
    #[arg(long)]
    bl: PixelPoint,
}

impl CornerArgs {
    fn quad(&self) -> Quad {
        Quad::new(self.tl, self.tr, self.br, self.bl)
    }
}

#[derive(Parser, Debug)]
struct FrameCornersArgs {
    #[arg(long)]
    frame_id: String,

    #[command(flatten)]
    corners: CornerArgs,
}

#[derive(Parser, Debug)]
struct FrameIdArgs {
    #[arg(long)]
    frame_id: String,
}

#[derive(Parser, Debug)]
struct ProcessArgs {
    #[arg(long)]
    frame_id: String,

    /// Artwork images, processed in the order given.
    #[arg(required = true)]
    artwork: Vec<PathBuf>,

    /// Composite items on a worker pool.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct CompositeArgs {
    /// Background (frame) photo.
    #[arg(long)]
    background: PathBuf,

    /// Artwork image.
    #[arg(long)]
    artwork: PathBuf,

    /// Output image; format follows the extension.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    corners: CornerArgs,
}

#[derive(Parser, Debug)]
struct SessionArgs {
    #[arg(long)]
    session_id: SessionId,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let storage = load_storage(cli.config.as_deref(), cli.root.as_deref())?;
    match cli.cmd {
        Command::Frame(cmd) => cmd_frame(&storage, cmd),
        Command::Process(args) => cmd_process(&storage, args),
        Command::Composite(args) => cmd_composite(args),
        Command::Session(args) => cmd_session(&storage, args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_storage(config: Option<&Path>, root: Option<&Path>) -> anyhow::Result<StorageConfig> {
    let cfg = match config {
        Some(path) => StorageConfig::from_path(path)?,
        None => StorageConfig::default(),
    };
    Ok(match root {
        Some(root) => cfg.with_root(root),
        None => cfg,
    })
}

fn cmd_frame(storage: &StorageConfig, cmd: FrameCommand) -> anyhow::Result<()> {
    let mut catalog = FrameCatalog::load(&storage.catalog_path)?;
    match cmd {
        FrameCommand::Add(args) => {
            storage.ensure_dirs()?;
            let bytes = std::fs::read(&args.image)
                .with_context(|| format!("read frame image '{}'", args.image.display()))?;
            let record = catalog.register(&storage.frames_dir, &args.name, &bytes)?;
            catalog.save()?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        FrameCommand::Corners(args) => {
            let record =
                catalog.set_corners(&storage.frames_dir, &args.frame_id, args.corners.quad())?;
            catalog.save()?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        FrameCommand::List => {
            for f in catalog.list() {
                println!(
                    "{}\t{}\t{}",
                    f.frame_id,
                    f.frame_name,
                    if f.has_coordinates() {
                        "ready"
                    } else {
                        "no-corners"
                    }
                );
            }
        }
        FrameCommand::Show(args) => {
            let record = catalog.require(&args.frame_id)?;
            println!("{}", serde_json::to_string_pretty(record)?);
        }
    }
    Ok(())
}

fn cmd_process(storage: &StorageConfig, args: ProcessArgs) -> anyhow::Result<()> {
    let catalog = FrameCatalog::load(&storage.catalog_path)?;
    let frame = catalog.require(&args.frame_id)?;
    let background = artframe::load_image(&frame.image_path)?;

    // Unreadable files still become ledger entries; the runner reports them as decode failures.
    let items: Vec<ArtworkItem> = args
        .artwork
        .iter()
        .map(|p| {
            ArtworkItem::from_path(p).unwrap_or_else(|e| {
                tracing::warn!(path = %p.display(), error = %e, "artwork unreadable");
                ArtworkItem::unreadable(p)
            })
        })
        .collect();

    storage.ensure_dirs()?;
    let outputs = FsOutputStore::new(&storage.results_dir);
    let ledgers = FsLedgerStore::new(&storage.results_dir);
    let runner = BatchRunner::new(&outputs, &ledgers).with_opts(BatchOpts {
        parallel: args.parallel,
        threads: args.threads,
    });

    let ledger = runner.run_batch(
        &frame.frame_id,
        frame.coordinates.as_ref(),
        &background,
        &items,
    )?;
    println!("{}", ledger.to_json_pretty()?);
    eprintln!(
        "processed {} failed {} -> {}",
        ledger.processed_count(),
        ledger.failed_count(),
        ledgers.ledger_path(ledger.session_id()).display()
    );
    Ok(())
}

fn cmd_composite(args: CompositeArgs) -> anyhow::Result<()> {
    let background = artframe::load_image(&args.background)?;
    let artwork = std::fs::read(&args.artwork)
        .with_context(|| format!("read artwork '{}'", args.artwork.display()))?;
    let framed = artframe::composite_bytes(&artwork, &args.corners.quad(), &background)?;
    artframe::save_image(&framed, &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_session(storage: &StorageConfig, args: SessionArgs) -> anyhow::Result<()> {
    let ledgers = FsLedgerStore::new(&storage.results_dir);
    let ledger = ledgers
        .get(args.session_id)?
        .with_context(|| format!("session {} not found", args.session_id))?;
    println!("{}", ledger.to_json_pretty()?);
    Ok(())
}
