//! Scheduler integration tests.
//!
//! Tests verify:
//! - Resize bursts collapse into one recompute
//! - Settled resizes to an unchanged viewport do nothing
//! - A pass overtaken by a newer one never publishes
//! - Elements are bound from their descriptors, skipping broken ones

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use tile_pruner::{
    bind_elements, BindingPhase, HostElement, HostEvent, ImageCache, MosaicRenderer, PassStatus,
    Scheduler, SchedulerConfig, Viewport,
};

use super::test_utils::{decode, png_descriptor, MockTileFetcher, RecordingElement};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn scheduler(fetcher: MockTileFetcher, viewport: Viewport) -> Scheduler<MockTileFetcher> {
    let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(fetcher)));
    Scheduler::new(renderer, SchedulerConfig::new(), viewport)
}

// =============================================================================
// Debounce
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_resize_burst_triggers_one_recompute() {
    let fetcher = MockTileFetcher::new().with_grid("", "m", 16, 100, RED);
    let mut scheduler = scheduler(fetcher, Viewport::new(200, 200));
    let element = RecordingElement::new("a", &png_descriptor("m", 4, 4, None));
    assert!(scheduler.bind(element.clone()));

    let (events, receiver) = mpsc::channel(8);
    let driver = tokio::spawn(scheduler.run(receiver));

    let resized = Viewport::new(300, 300);
    events.send(HostEvent::Visible("a".to_string())).await.unwrap();
    events.send(HostEvent::Resize(resized)).await.unwrap();
    events.send(HostEvent::Resize(resized)).await.unwrap();
    drop(events);

    let summary = driver.await.unwrap();

    // The first visibility plus a single pass for the settled burst
    assert_eq!(summary.passes, 2);
    assert_eq!(summary.published, 2);

    let latest = summary.latest("a").unwrap();
    assert_eq!(latest.generation, 2);
    assert_eq!(latest.viewport, resized);
    assert!(latest.is_published());

    let last_image = element.published().pop().unwrap();
    assert_eq!(last_image.window.cols_visible, 3);
}

#[tokio::test(start_paused = true)]
async fn test_settled_resize_to_same_viewport_is_ignored() {
    let fetcher = MockTileFetcher::new().with_grid("", "m", 16, 100, RED);
    let mut scheduler = scheduler(fetcher.clone(), Viewport::new(200, 200));
    let element = RecordingElement::new("a", &png_descriptor("m", 4, 4, None));
    scheduler.bind(element.clone());

    let (events, receiver) = mpsc::channel(8);
    let driver = tokio::spawn(scheduler.run(receiver));

    let resized = Viewport::new(300, 300);
    events.send(HostEvent::Visible("a".to_string())).await.unwrap();
    events.send(HostEvent::Resize(resized)).await.unwrap();
    sleep(Duration::from_millis(500)).await;

    // Same size again after the first burst settled
    events.send(HostEvent::Resize(resized)).await.unwrap();
    sleep(Duration::from_millis(500)).await;
    drop(events);

    let summary = driver.await.unwrap();
    assert_eq!(summary.passes, 2);
    assert_eq!(element.publish_count(), 2);
    assert_eq!(fetcher.request_count(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_resize_before_visibility_is_sampled_on_first_pass() {
    let fetcher = MockTileFetcher::new().with_grid("", "m", 16, 100, RED);
    let mut scheduler = scheduler(fetcher, Viewport::new(200, 200));
    let element = RecordingElement::new("a", &png_descriptor("m", 4, 4, None));
    scheduler.bind(element.clone());

    let (events, receiver) = mpsc::channel(8);
    let driver = tokio::spawn(scheduler.run(receiver));

    events
        .send(HostEvent::Resize(Viewport::new(400, 400)))
        .await
        .unwrap();
    sleep(Duration::from_millis(500)).await;
    events.send(HostEvent::Visible("a".to_string())).await.unwrap();
    drop(events);

    let summary = driver.await.unwrap();
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.latest("a").unwrap().viewport, Viewport::new(400, 400));
    assert_eq!(element.published()[0].window.cols_visible, 4);
}

#[tokio::test(start_paused = true)]
async fn test_long_session_summary_stays_per_element() {
    let fetcher = MockTileFetcher::new().with_grid("", "m", 16, 100, RED);
    let mut scheduler = scheduler(fetcher, Viewport::new(200, 200));
    let element = RecordingElement::new("a", &png_descriptor("m", 4, 4, None));
    scheduler.bind(element.clone());

    let (events, receiver) = mpsc::channel(8);
    let driver = tokio::spawn(scheduler.run(receiver));

    events.send(HostEvent::Visible("a".to_string())).await.unwrap();
    for step in 0..40u32 {
        let width = if step % 2 == 0 { 300 } else { 200 };
        events
            .send(HostEvent::Resize(Viewport::new(width, 200)))
            .await
            .unwrap();
        sleep(Duration::from_millis(500)).await;
    }
    drop(events);

    let summary = driver.await.unwrap();
    assert_eq!(summary.passes, 41);
    assert_eq!(summary.published, 41);
    assert_eq!(summary.latest_reports().count(), 1);
    assert_eq!(summary.latest("a").unwrap().generation, 41);
    assert_eq!(element.publish_count(), 41);
}

// =============================================================================
// Overlapping Passes
// =============================================================================

#[tokio::test]
async fn test_superseded_pass_is_not_published() {
    let fetcher = MockTileFetcher::new()
        .with_grid("", "slow", 4, 100, BLUE)
        .with_grid("", "fast", 4, 100, RED)
        .with_gated("slow-1.png");
    let viewport = Viewport::new(200, 200);
    let mut scheduler = scheduler(fetcher.clone(), viewport);
    let element = RecordingElement::new("a", &png_descriptor("slow", 2, 2, None));
    scheduler.bind(element.clone());

    // First pass blocks on its first tile
    assert!(scheduler.on_visible("a"));
    for _ in 0..200 {
        if fetcher.requests_for("slow-1.png") > 0 {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(fetcher.requests_for("slow-1.png"), 1);

    // The descriptor changes and a resize starts a second pass
    element.set_descriptor(&png_descriptor("fast", 2, 2, None));
    let now = Instant::now();
    scheduler.on_resize(Viewport::new(150, 150), now);
    assert_eq!(
        scheduler.fire_resize(now + scheduler.config().resize_debounce),
        1
    );
    assert_eq!(scheduler.generation("a"), Some(2));

    for _ in 0..200 {
        if element.publish_count() > 0 {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(element.publish_count(), 1);

    // Let the stale pass finish
    fetcher.open_gate();
    let reports = scheduler.drain().await;
    assert_eq!(reports.len(), 2);

    for report in &reports {
        match (report.generation, &report.status) {
            (1, PassStatus::Superseded) => {}
            (2, PassStatus::Published { .. }) => {}
            (generation, status) => panic!("generation {}: {:?}", generation, status),
        }
    }

    let published = element.published();
    assert_eq!(published.len(), 1);
    assert_eq!(decode(&published[0].image.data).get_pixel(0, 0).0, RED);
}

// =============================================================================
// Binding
// =============================================================================

#[tokio::test]
async fn test_bind_elements_skips_broken_descriptors() {
    let fetcher = MockTileFetcher::new().with_grid("", "m", 4, 100, RED);
    let mut scheduler = scheduler(fetcher, Viewport::new(200, 200));

    let good = RecordingElement::new("good", &png_descriptor("m", 2, 2, None));
    let broken = RecordingElement::new("broken", r#"{"name": "m", "cols": 0, "rows": 2, "path": ""}"#);
    let elements = vec![
        good.clone() as Arc<dyn HostElement>,
        broken as Arc<dyn HostElement>,
    ];

    let report = bind_elements(&mut scheduler, elements);

    assert_eq!(report.bound, vec!["good".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "broken");
    assert_eq!(scheduler.phase("good"), Some(BindingPhase::Pending));
    assert_eq!(scheduler.phase("broken"), None);

    assert!(scheduler.on_visible("good"));
    let reports = scheduler.drain().await;
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_published());
    assert_eq!(good.publish_count(), 1);
}
