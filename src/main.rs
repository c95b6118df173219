//! Binary entrypoint for the `feh` slideshow.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use config_model::{DimensionLimits, OnLastSlide, SortKey};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use rust_feh::config::Configuration;
use rust_feh::events::ControlEvent;
use rust_feh::filelist::{self, Discovery};
use rust_feh::loader::DecodingLoader;
use rust_feh::navigation::{Outcome, PlaylistContext};
use rust_feh::render::TitleRenderer;
use rust_feh::tasks::{controller, input, signals, watch};

#[derive(Debug, Parser)]
#[command(name = "feh", version, about = "image list slideshow")]
struct Args {
    /// Files, directories, or `-` for image data on stdin
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
    /// Path to YAML config
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Filelist to read at startup and write back on exit
    #[arg(short = 'f', long, value_name = "FILE")]
    filelist: Option<PathBuf>,
    #[arg(short, long)]
    recursive: bool,
    #[arg(short = 'z', long)]
    randomize: bool,
    #[arg(short = 'S', long = "sort", value_name = "KEY")]
    sort: Option<SortKey>,
    #[arg(short = 'n', long)]
    reverse: bool,
    #[arg(long)]
    version_sort: bool,
    /// quit, hold or resume
    #[arg(long, value_name = "POLICY")]
    on_last_slide: Option<OnLastSlide>,
    /// Auto-advance delay, e.g. `5s`
    #[arg(short = 'D', long = "slideshow-delay", value_parser = humantime::parse_duration)]
    delay: Option<Duration>,
    /// Rediscover the list from its sources at this interval
    #[arg(short = 'R', long, value_parser = humantime::parse_duration)]
    reload: Option<Duration>,
    #[arg(long, value_name = "FILE")]
    start_at: Option<PathBuf>,
    /// Print a table of the list and exit
    #[arg(short = 'l', long)]
    list: bool,
    /// Print only loadable files and exit
    #[arg(short = 'U', long, conflicts_with = "unloadable")]
    loadable: bool,
    /// Print only unloadable files and exit
    #[arg(short = 'u', long)]
    unloadable: bool,
    /// Probe every file before starting
    #[arg(short = 'p', long)]
    preload: bool,
    #[arg(long, value_name = "WxH")]
    min_dimension: Option<String>,
    #[arg(long, value_name = "WxH")]
    max_dimension: Option<String>,
    #[arg(long, value_name = "DIR")]
    caption_path: Option<PathBuf>,
    #[arg(long = "keep-zoom-vp")]
    keep_viewport: bool,
    /// Reload the displayed image when it changes on disk
    #[arg(long)]
    watch: bool,
    /// Deterministic RNG seed for shuffling
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Per-file progress marks on stderr
    #[arg(long = "verbose")]
    verbose: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', action = ArgAction::Count)]
    log_level: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,rust_feh={level},feh={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow!("failed to initialise tracing: {err}"))
}

fn load_configuration(args: &Args) -> Result<Configuration> {
    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    let show = &mut cfg.slideshow;
    if let Some(policy) = args.on_last_slide {
        show.on_last_slide = policy;
    }
    if args.randomize {
        show.randomize = true;
    }
    if let Some(key) = args.sort {
        show.sort = Some(key);
    }
    show.reverse |= args.reverse;
    show.version_sort |= args.version_sort;
    show.preload |= args.preload;
    show.keep_viewport |= args.keep_viewport;
    if let Some(raw) = &args.min_dimension {
        let (w, h) = DimensionLimits::parse_pair(raw).context("--min-dimension")?;
        show.dimensions.min_width = w;
        show.dimensions.min_height = h;
    }
    if let Some(raw) = &args.max_dimension {
        let (w, h) = DimensionLimits::parse_pair(raw).context("--max-dimension")?;
        show.dimensions.max_width = w;
        show.dimensions.max_height = h;
    }
    if show.resolve_order_conflict() {
        warn!("randomize and sort both requested; sorting is disabled");
    }
    cfg.recursive |= args.recursive;
    cfg.watch |= args.watch;
    cfg.verbose |= args.verbose;
    if args.delay.is_some() {
        cfg.delay = args.delay;
    }
    if args.reload.is_some() {
        cfg.reload = args.reload;
    }
    if args.caption_path.is_some() {
        cfg.caption_path = args.caption_path.clone();
    }
    if args.filelist.is_some() {
        cfg.filelist = args.filelist.clone();
    }
    cfg.validated().context("invalid configuration values")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level)?;
    let cfg = load_configuration(&args)?;
    debug!(?cfg, "configuration resolved");

    if args.files.is_empty() && cfg.filelist.is_none() {
        bail!("no files given; pass files, directories, `-` or --filelist");
    }
    let mut discovery = Discovery::new(args.files.clone(), cfg.filelist.iter().cloned().collect());
    discovery.recursive = cfg.recursive;
    discovery.follow_links = cfg.follow_links;
    let mut list = discovery.discover().context("failed to build the image list")?;

    if args.list {
        filelist::preload_info(&mut list, cfg.verbose);
        print!("{}", filelist::format_list(&list));
        return Ok(());
    }
    if args.loadable || args.unloadable {
        let mut loader = DecodingLoader::with_converter(cfg.converter());
        let (ok, failed) = filelist::partition_loadable(&list, &mut loader);
        if args.loadable {
            ok.iter().for_each(|p| println!("{}", p.display()));
        } else {
            for (path, err) in &failed {
                println!("{}\t{}", err.label(), path.display());
            }
        }
        return Ok(());
    }

    let loader = DecodingLoader::with_converter(cfg.converter());
    let renderer = TitleRenderer::new(io::stdout());
    let mut ctx = PlaylistContext::new(list, cfg.slideshow.clone(), loader, renderer)?
        .with_caption_dir(cfg.caption_path.clone())
        .with_verbose(cfg.verbose);
    if let Some(seed) = args.seed {
        ctx = ctx.with_seed(seed);
    }
    let started = match &args.start_at {
        Some(path) => ctx.start_at(path, true),
        None => ctx.start(true),
    }
    .context("failed to start slideshow")?;

    let result = if started == Outcome::Quit {
        Ok(())
    } else {
        run_slideshow(&mut ctx, &cfg, discovery).await
    };

    if let Some(path) = &cfg.filelist {
        match filelist::write_filelist(ctx.list(), path) {
            Ok(()) => info!(path = %path.display(), "filelist written"),
            Err(err) => warn!(path = %path.display(), "failed to write filelist: {err}"),
        }
    }
    result
}

async fn run_slideshow(
    ctx: &mut PlaylistContext<DecodingLoader, TitleRenderer<io::Stdout>>,
    cfg: &Configuration,
    discovery: Discovery,
) -> Result<()> {
    let (event_tx, event_rx) = mpsc::channel::<ControlEvent>(64);
    let cancel = CancellationToken::new();
    let mut workers = JoinSet::new();

    workers.spawn({
        let tx = event_tx.clone();
        let cancel = cancel.clone();
        async move { signals::run(tx, cancel).await.context("signal task failed") }
    });

    if io::stdin().is_terminal() && !discovery.reads_stdin() {
        let tx = event_tx.clone();
        // A detached thread: a pending terminal read must not hold up exit.
        std::thread::spawn(move || {
            match input::forward_commands(io::stdin().lock(), &tx) {
                Ok(_) => info!("stdin closed; initiating shutdown"),
                Err(err) => warn!("stdin command reader failed: {err}"),
            }
            let _ = tx.blocking_send(ControlEvent::Shutdown);
        });
    } else {
        debug!("stdin is not a terminal; skipping command reader");
    }

    let _watcher = if cfg.watch {
        match watch::start_watcher(&watch::watch_dirs(ctx.list()), event_tx.clone()) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!("failed to start file watcher: {err}");
                None
            }
        }
    } else {
        None
    };
    drop(event_tx);

    let settings = controller::ControllerSettings {
        delay: cfg.delay,
        reload: cfg.reload,
        ..Default::default()
    };
    let result = controller::run(ctx, event_rx, Some(discovery), settings, cancel.clone())
        .await
        .context("slideshow failed");

    // Ensure other tasks are asked to stop
    cancel.cancel();
    while let Some(res) = workers.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }
    result
}
