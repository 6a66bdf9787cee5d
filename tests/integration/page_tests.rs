//! Page rendering integration tests.
//!
//! Tests verify:
//! - Mosaic elements are discovered in HTML and bound from their attributes
//! - Tiles are read from a directory on disk through the filesystem fetcher
//! - Every visible element receives its composite; broken ones are skipped

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use tile_pruner::{
    bind_elements, FsFetcher, HostElement, HostEvent, HtmlPage, HttpFetcher, ImageCache,
    MosaicRenderer, Scheduler, SchedulerConfig, SourceRouter, Viewport,
};

use super::test_utils::{decode, solid_png};

const GREEN: [u8; 4] = [0, 255, 0, 255];

/// Write `count` square PNG tiles named `{name}-{index}.png` below `dir/tiles`.
fn write_tiles(dir: &TempDir, name: &str, count: u32, size: u32) {
    let tiles = dir.path().join("tiles");
    std::fs::create_dir_all(&tiles).unwrap();
    let data = solid_png(size, size, GREEN);
    for index in 1..=count {
        std::fs::write(tiles.join(format!("{}-{}.png", name, index)), &data).unwrap();
    }
}

const PAGE: &str = r#"
<html>
  <body>
    <img id="hero" alt="" data-pruner='{"name": "harbour", "tile": "4 3", "roi": 11, "path": "/tiles/", "imageExtension": "png"}'>
    <div class="gallery">
      <img data-pruner="{&quot;name&quot;: &quot;pier&quot;, &quot;cols&quot;: 2, &quot;rows&quot;: 2, &quot;path&quot;: &quot;tiles/&quot;, &quot;imageExtension&quot;: &quot;png&quot;}">
      <img id="broken" data-pruner='{"name": "x"}'>
      <img id="plain" src="photo.jpg">
    </div>
  </body>
</html>
"#;

#[tokio::test]
async fn test_render_page_from_disk() {
    let dir = TempDir::new().unwrap();
    write_tiles(&dir, "harbour", 12, 64);
    write_tiles(&dir, "pier", 4, 32);

    let page = HtmlPage::parse(PAGE);
    assert_eq!(page.len(), 3);

    let fetcher = SourceRouter::new(FsFetcher::new(dir.path()), HttpFetcher::new());
    let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(fetcher)));
    let mut scheduler = Scheduler::new(renderer, SchedulerConfig::new(), Viewport::new(128, 128));

    let report = bind_elements(&mut scheduler, page.host_elements());
    assert_eq!(report.bound, vec!["hero".to_string(), "pruner-2".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "broken");

    let (events, receiver) = mpsc::channel(4);
    let driver = tokio::spawn(scheduler.run(receiver));
    for id in &report.bound {
        events.send(HostEvent::Visible(id.clone())).await.unwrap();
    }
    drop(events);

    let summary = driver.await.unwrap();
    assert_eq!(summary.passes, 2);
    assert_eq!(summary.published, 2);
    assert!(summary.latest_reports().all(|p| p.is_published()));

    // 64px tiles in a 128px viewport: a 2x2 window centred on tile 11 (row 2, col 2)
    let hero = page.get("hero").unwrap().published().unwrap();
    assert_eq!(hero.window.header_value(), "1,1,2,2");
    assert_eq!(hero.mime_type(), "image/png");
    let pixels = decode(&hero.image.data);
    assert_eq!(pixels.dimensions(), (128, 128));
    assert_eq!(pixels.get_pixel(127, 127).0, GREEN);

    // The whole 2x2 grid of 32px tiles fits
    let pier = page.get("pruner-2").unwrap().published().unwrap();
    assert_eq!(pier.window.header_value(), "0,0,2,2");
    assert_eq!((pier.image.width, pier.image.height), (64, 64));

    assert!(page.get("broken").unwrap().published().is_none());
    assert!(page.get("plain").is_none());
}

#[tokio::test]
async fn test_missing_tiles_on_disk_render_blank() {
    let dir = TempDir::new().unwrap();
    write_tiles(&dir, "harbour", 12, 64);
    std::fs::remove_file(dir.path().join("tiles/harbour-7.png")).unwrap();

    let page = HtmlPage::parse(PAGE);
    let element = page.get("hero").unwrap();

    let fetcher = FsFetcher::new(dir.path());
    let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(fetcher)));
    let mut scheduler = Scheduler::new(renderer, SchedulerConfig::new(), Viewport::new(128, 128));
    assert!(scheduler.bind(Arc::clone(element) as Arc<dyn HostElement>));
    assert!(scheduler.on_visible("hero"));

    let passes = scheduler.drain().await;
    assert_eq!(passes.len(), 1);

    // Tile 7 is row 1, column 2: the top-right cell of the window
    let published = element.published().unwrap();
    assert_eq!(published.blank_cells, 1);
    let pixels = decode(&published.image.data);
    assert_eq!(pixels.get_pixel(96, 32).0[3], 0);
    assert_eq!(pixels.get_pixel(32, 32).0, GREEN);
}
