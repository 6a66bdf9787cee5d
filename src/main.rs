//! Tile Pruner - responsive mosaic renderer.
//!
//! This binary wires the CLI to the library: page rendering, window
//! resolution, the HTTP render service and the tile size calculator.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_pruner::{
    bind_elements,
    calc::calculate,
    config::{CalcConfig, Cli, Command, RenderConfig, ServeConfig, SourceConfig, WindowConfig},
    create_s3_client,
    server::{create_router, RouterConfig, WindowResponse},
    FsFetcher, HostElement, HostEvent, HtmlPage, HttpFetcher, ImageCache, MosaicRenderer,
    PassStatus, S3Fetcher, Scheduler, SchedulerConfig, SourceRouter, TileSetDescriptor, Viewport,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Render(config) => run_render(config).await,
        Command::Window(config) => run_window(config),
        Command::Serve(config) => run_serve(config).await,
        Command::Calc(config) => run_calc(config),
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_pruner=debug,pruner=debug,tower_http=debug"
    } else {
        "tile_pruner=info,pruner=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the scheme-routing fetcher shared by `render` and `serve`.
async fn build_fetcher(source: &SourceConfig, tiles_root: &Path) -> SourceRouter {
    let s3_client = create_s3_client(source.s3_endpoint.as_deref(), &source.s3_region).await;

    SourceRouter::new(FsFetcher::new(tiles_root), HttpFetcher::new())
        .with_s3(S3Fetcher::new(s3_client))
}

// =============================================================================
// Render Command
// =============================================================================

async fn run_render(config: RenderConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let html = match tokio::fs::read_to_string(&config.page).await {
        Ok(html) => html,
        Err(e) => {
            error!("Failed to read {}: {}", config.page.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let page = HtmlPage::parse(&html);
    if page.is_empty() {
        warn!("No data-pruner elements found in {}", config.page.display());
        return ExitCode::SUCCESS;
    }

    let tiles_root = config.tiles_root();
    info!("Page: {}", config.page.display());
    info!("  Elements: {}", page.len());
    info!("  Tiles root: {}", tiles_root.display());
    info!("  Viewport: {}x{}", config.width, config.height);

    let fetcher = build_fetcher(&config.source, &tiles_root).await;
    let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(fetcher)))
        .with_max_composite_pixels(config.max_composite_pixels);
    let scheduler_config = SchedulerConfig::new()
        .with_resize_debounce(config.resize_debounce())
        .with_quality(config.quality);
    let mut scheduler = Scheduler::new(
        renderer.clone(),
        scheduler_config,
        Viewport::new(config.width, config.height),
    );

    let report = bind_elements(&mut scheduler, page.host_elements());

    // A headless page has everything in view at once.
    let (events, receiver) = mpsc::channel(report.bound.len().max(1));
    let driver = tokio::spawn(scheduler.run(receiver));
    for id in &report.bound {
        if events.send(HostEvent::Visible(id.clone())).await.is_err() {
            break;
        }
    }
    drop(events);

    let summary = match driver.await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Scheduler failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(&config.out_dir).await {
        error!("Failed to create {}: {}", config.out_dir.display(), e);
        return ExitCode::FAILURE;
    }

    let mut written = 0;
    let mut failed = 0;
    for pass in summary.latest_reports() {
        match &pass.status {
            PassStatus::Published {
                window,
                blank_cells,
            } => {
                let Some(element) = page.get(&pass.element_id) else {
                    continue;
                };
                let Some(published) = element.published() else {
                    continue;
                };
                let path = config.out_dir.join(format!(
                    "{}.{}",
                    element.id(),
                    published.image.format.extension()
                ));
                if let Err(e) = tokio::fs::write(&path, &published.image.data).await {
                    error!("Failed to write {}: {}", path.display(), e);
                    failed += 1;
                    continue;
                }
                info!(
                    "  {} -> {} ({}x{}, window {}, {} blank)",
                    element.id(),
                    path.display(),
                    published.image.width,
                    published.image.height,
                    window.header_value(),
                    blank_cells
                );
                written += 1;
            }
            PassStatus::Failed(e) => {
                warn!("  {}: {}", pass.element_id, e);
                failed += 1;
            }
            PassStatus::Superseded => {}
        }
    }

    let stats = renderer.cache().stats();
    info!(
        "Rendered {} element(s), {} skipped, {} failed; {} tile fetch(es), {} cached",
        written,
        report.skipped.len(),
        failed,
        stats.fetches,
        stats.entries
    );

    if written == 0 && (failed > 0 || !report.skipped.is_empty()) {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

// =============================================================================
// Window Command
// =============================================================================

fn run_window(config: WindowConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let descriptor = match TileSetDescriptor::parse(&config.descriptor) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tile_size = match config.resolve_tile_size(&descriptor) {
        Ok(size) => size,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let window = descriptor.resolve_window(tile_size, Viewport::new(config.width, config.height));
    let response = WindowResponse::new(&descriptor, window);

    match serde_json::to_string_pretty(&response) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let tiles_root = config.source.tiles_root_or(Path::new("."));

    info!("Tile Pruner v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Tiles root: {}", tiles_root.display());
    if let Some(ref endpoint) = config.source.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.source.s3_region);
    info!("  Cache max-age: {}s", config.cache_max_age);
    info!("  Composite limit: {} pixels", config.max_composite_pixels);

    let fetcher = build_fetcher(&config.source, &tiles_root).await;
    let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(fetcher)))
        .with_max_composite_pixels(config.max_composite_pixels);
    let router = create_router(renderer, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  pruner render service on http://{}", addr);
    info!("");
    info!("  Quick check:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl 'http://{}/window?width=1280&height=720&descriptor=...'",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Cannot listen on {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Render service stopped: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Calc Command
// =============================================================================

fn run_calc(config: CalcConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let Some(layout) = calculate(config.width, config.height) else {
        println!("No suitable tile size found.");
        return ExitCode::FAILURE;
    };

    if config.json {
        return match serde_json::to_string_pretty(&layout) {
            Ok(out) => {
                println!("{}", out);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    println!("Tile calculation complete!");
    println!(
        "Image dimensions = {} x {}px",
        layout.image_width, layout.image_height
    );
    println!("Columns = {}, Rows = {}", layout.columns, layout.rows);
    println!("Total tiles = {}", layout.total_tiles);
    println!(
        "Tile dimensions = {:.2} x {:.2}px",
        layout.tile_width, layout.tile_height
    );
    println!("Average pixel waste = {:.2}%", layout.waste_percent);

    ExitCode::SUCCESS
}
