use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use routereel::{AssetCache, FrameManifest, FramePipeline, Route, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "routereel", version, about = "Turn a route into street-level frames")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample a route and write the frame manifest.
    Frames(FramesArgs),
    /// Sample a route, cache every frame image locally, and write the manifest.
    Cache(CacheArgs),
    /// Check a route file for structural problems.
    Validate(ValidateArgs),
    /// Delete every cached image.
    ClearCache(ClearCacheArgs),
}

#[derive(Args, Debug)]
struct RouteArgs {
    /// Route JSON.
    #[arg(long)]
    route: PathBuf,

    /// Sampling interval near maneuvers, in meters.
    #[arg(long)]
    interval: Option<f64>,

    /// Settings JSON.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output manifest path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FramesArgs {
    #[command(flatten)]
    route: RouteArgs,
}

#[derive(Args, Debug)]
struct CacheArgs {
    #[command(flatten)]
    route: RouteArgs,

    /// Cache directory (overrides settings and environment).
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Route JSON.
    #[arg(long)]
    route: PathBuf,
}

#[derive(Args, Debug)]
struct ClearCacheArgs {
    /// Cache directory (overrides settings and environment).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Settings JSON.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("routereel=info")),
        )
        .try_init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frames(args) => cmd_frames(args),
        Command::Cache(args) => cmd_cache(args).await,
        Command::Validate(args) => cmd_validate(args),
        Command::ClearCache(args) => cmd_clear_cache(args).await,
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(p) => Settings::from_path(p)?,
        None => Settings::default(),
    };
    settings
        .apply_env()
        .context("apply ROUTEREEL_* environment overrides")?;
    Ok(settings)
}

fn load_route(path: &Path) -> anyhow::Result<Route> {
    Route::from_path(path).with_context(|| format!("load route '{}'", path.display()))
}

fn write_manifest(manifest: &FrameManifest, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            manifest.write_to_path(path)?;
            eprintln!("wrote {} frames to {}", manifest.frames.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            manifest.to_writer_pretty(&mut lock)?;
            writeln!(lock).context("write manifest to stdout")?;
        }
    }
    Ok(())
}

fn cmd_frames(args: FramesArgs) -> anyhow::Result<()> {
    let a = args.route;
    let settings = load_settings(a.settings.as_deref())?;
    let pipeline = FramePipeline::new(&settings)?;
    let route = load_route(&a.route)?;

    let interval = a.interval.unwrap_or(settings.sampler.base_interval_m);
    let manifest = pipeline.manifest(&route, interval);
    write_manifest(&manifest, a.out.as_deref())
}

async fn cmd_cache(args: CacheArgs) -> anyhow::Result<()> {
    let a = args.route;
    let mut settings = load_settings(a.settings.as_deref())?;
    if let Some(dir) = args.cache_dir {
        settings.cache.dir = Some(dir);
    }
    let pipeline = FramePipeline::new(&settings)?;
    let route = load_route(&a.route)?;
    let cache = AssetCache::open_disk_or_pass_through(settings.cache.clone())
        .await
        .context("open asset cache")?;

    let interval = a.interval.unwrap_or(settings.sampler.base_interval_m);
    let manifest = pipeline
        .sample_route_with_cache(&route, interval, &cache, |p| {
            tracing::info!(
                done = p.succeeded + p.failed,
                total = p.total,
                failed = p.failed,
                "caching {:.0}%",
                p.percentage
            );
        })
        .await;

    let stats = cache.stats();
    cache.teardown().await.context("close asset cache")?;
    eprintln!(
        "cached {}/{} frames (hits {}, fetched {}, evicted {})",
        manifest.stats.cached,
        manifest.stats.emitted,
        stats.hits,
        stats.misses.saturating_sub(stats.fetch_failures),
        stats.evictions
    );
    write_manifest(&manifest, a.out.as_deref())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let route = load_route(&args.route)?;
    route.validate()?;
    println!(
        "ok: {} path points, {} steps, {:.0} m",
        route.path.len(),
        route.steps.len(),
        route.path_length_m()
    );
    Ok(())
}

async fn cmd_clear_cache(args: ClearCacheArgs) -> anyhow::Result<()> {
    let mut settings = load_settings(args.settings.as_deref())?;
    if let Some(dir) = args.cache_dir {
        settings.cache.dir = Some(dir);
    }
    let cache = AssetCache::open_disk(settings.cache.clone())
        .await
        .context("open asset cache")?;
    cache.clear().await?;
    cache.teardown().await?;
    eprintln!("cleared {}", settings.cache.resolve_dir()?.display());
    Ok(())
}
