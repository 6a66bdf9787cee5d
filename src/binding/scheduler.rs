//! Visibility and resize scheduling.
//!
//! Decides when each bound element gets a render pass.
//!
//! # Element Lifecycle
//!
//! ```text
//!  register        attach             first Visible            debounced Resize
//! ─────────► Idle ────────► Pending ───────────────► Active ──────────────────┐
//!                             │  ▲                     ▲                      │
//!                      Resize │  │ (ignored)           └──────────────────────┘
//!                             └──┘                   (only if viewport changed)
//! ```
//!
//! [`bind`](Scheduler::bind) is `register` followed by `attach`. Idle
//! elements ignore visibility and resize signals alike.
//!
//! Resize signals arrive in bursts while a window is dragged. They are
//! coalesced: every signal pushes the deadline out by the quiet period, and
//! only when the deadline passes are active elements re-rendered, and only
//! those whose last pass used a different viewport.
//!
//! # Overlapping Passes
//!
//! Passes run as independent tasks and may overlap for the same element.
//! Each pass takes a fresh generation number when it starts; when it
//! finishes it publishes only if no newer pass has started since. The last
//! pass to start is therefore the only one whose image survives.
//!
//! # Reports
//!
//! When driven by hand, finished passes queue up until [`drain`](Scheduler::drain)
//! collects them. [`run`](Scheduler::run) is meant for long-lived hosts and
//! keeps no queue: it folds every report into a [`RunSummary`] holding
//! counters and the latest report per element.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::element::HostElement;
use crate::descriptor::{TileSetDescriptor, DESCRIPTOR_ATTRIBUTE};
use crate::error::{DescriptorError, RenderError};
use crate::io::TileFetcher;
use crate::render::{MosaicRenderer, PublishedImage};
use crate::tile::{clamp_quality, OutputFormat, SurfaceEncoder, DEFAULT_JPEG_QUALITY};
use crate::window::{TileWindow, Viewport};

/// Default quiet period before a resize burst triggers passes.
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(200);

// =============================================================================
// Configuration
// =============================================================================

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Quiet period after the last resize signal
    pub resize_debounce: Duration,

    /// JPEG quality for composites of JPEG tile sets
    pub quality: u8,
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self {
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Set the resize quiet period.
    pub fn with_resize_debounce(mut self, debounce: Duration) -> Self {
        self.resize_debounce = debounce;
        self
    }

    /// Set the JPEG quality (clamped to 1-100).
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = clamp_quality(quality);
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Events and Reports
// =============================================================================

/// Binding phase of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPhase {
    /// Registered but not attached; signals are ignored
    Idle,

    /// Attached, waiting to become visible
    Pending,

    /// Rendered at least once; follows resizes
    Active,
}

/// Signal from the host environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The element with this id intersected the viewport
    Visible(String),

    /// The viewport changed size
    Resize(Viewport),
}

/// How a pass ended.
#[derive(Debug, Clone)]
pub enum PassStatus {
    /// The composite was handed to the element
    Published { window: TileWindow, blank_cells: usize },

    /// A newer pass started before this one finished; nothing was published
    Superseded,

    /// The pass failed as a whole; the element keeps its previous image
    Failed(RenderError),
}

/// Outcome of one pass for one element.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub element_id: String,
    pub generation: u64,
    pub viewport: Viewport,
    pub status: PassStatus,
}

impl PassReport {
    pub fn is_published(&self) -> bool {
        matches!(self.status, PassStatus::Published { .. })
    }
}

/// Totals of a [`run`](Scheduler::run), plus the newest report per element.
///
/// Its size depends on the number of bound elements, not on how many passes
/// ran.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub passes: usize,
    pub published: usize,
    pub superseded: usize,
    pub failed: usize,
    latest: HashMap<String, PassReport>,
}

impl RunSummary {
    fn record(&mut self, report: PassReport) {
        self.passes += 1;
        match report.status {
            PassStatus::Published { .. } => self.published += 1,
            PassStatus::Superseded => self.superseded += 1,
            PassStatus::Failed(_) => self.failed += 1,
        }

        // Passes finish out of order; keep the highest generation.
        let newer = self
            .latest
            .get(&report.element_id)
            .map_or(true, |current| report.generation >= current.generation);
        if newer {
            self.latest.insert(report.element_id.clone(), report);
        }
    }

    /// Report of the element's highest-generation pass.
    pub fn latest(&self, id: &str) -> Option<&PassReport> {
        self.latest.get(id)
    }

    /// Latest report of every element that ran at least one pass.
    pub fn latest_reports(&self) -> impl Iterator<Item = &PassReport> {
        self.latest.values()
    }
}

// =============================================================================
// Generation Counter
// =============================================================================

/// Per-element pass counter guarding publication.
#[derive(Debug, Default)]
struct Generation {
    latest: Mutex<u64>,
}

impl Generation {
    /// Start a new pass and return its generation.
    fn advance(&self) -> u64 {
        let mut latest = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *latest += 1;
        *latest
    }

    fn current(&self) -> u64 {
        match self.latest.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Run `publish` only if `generation` is still the latest.
    ///
    /// The check and the publish happen under one lock, so a pass that starts
    /// concurrently cannot slip in between them.
    fn publish_if_current(&self, generation: u64, publish: impl FnOnce()) -> bool {
        let latest = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *latest != generation {
            return false;
        }
        publish();
        true
    }
}

struct Binding {
    element: Arc<dyn HostElement>,
    phase: BindingPhase,
    last_viewport: Option<Viewport>,
    generation: Arc<Generation>,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Per-element state machine driving render passes.
///
/// The state transitions are plain methods taking the current instant, so
/// they can be driven directly; [`run`](Scheduler::run) wires them to a host
/// event channel and a timer.
pub struct Scheduler<F: TileFetcher + 'static> {
    renderer: MosaicRenderer<F>,
    encoder: SurfaceEncoder,
    config: SchedulerConfig,

    /// Most recent viewport reported by the host
    viewport: Viewport,

    bindings: HashMap<String, Binding>,

    /// When the current resize burst is considered over
    resize_deadline: Option<Instant>,

    passes: JoinSet<PassReport>,

    /// Finished reports waiting for `drain`; unused by `run`
    reports: Vec<PassReport>,
    queue_reports: bool,
    summary: RunSummary,
}

impl<F: TileFetcher + 'static> Scheduler<F> {
    /// Create a scheduler for a host whose viewport is currently `viewport`.
    pub fn new(renderer: MosaicRenderer<F>, config: SchedulerConfig, viewport: Viewport) -> Self {
        Self {
            renderer,
            encoder: SurfaceEncoder::with_quality(config.quality),
            config,
            viewport,
            bindings: HashMap::new(),
            resize_deadline: None,
            passes: JoinSet::new(),
            reports: Vec::new(),
            queue_reports: true,
            summary: RunSummary::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Most recent viewport reported by the host.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Register and attach an element. Returns `false` if its id is taken.
    pub fn bind(&mut self, element: Arc<dyn HostElement>) -> bool {
        let id = element.id().to_string();
        self.register(element) && self.attach(&id)
    }

    /// Make an element known without observing it yet.
    ///
    /// The element stays `Idle` until [`attach`](Self::attach). Returns
    /// `false` if the id is already registered.
    pub fn register(&mut self, element: Arc<dyn HostElement>) -> bool {
        let id = element.id().to_string();
        if self.bindings.contains_key(&id) {
            debug!(element = %id, "element already bound");
            return false;
        }

        self.bindings.insert(
            id,
            Binding {
                element,
                phase: BindingPhase::Idle,
                last_viewport: None,
                generation: Arc::new(Generation::default()),
            },
        );
        true
    }

    /// Start observing an idle element: `Idle → Pending`.
    pub fn attach(&mut self, id: &str) -> bool {
        match self.bindings.get_mut(id) {
            Some(binding) if binding.phase == BindingPhase::Idle => {
                binding.phase = BindingPhase::Pending;
                debug!(element = %id, "element attached, waiting for visibility");
                true
            }
            _ => false,
        }
    }

    /// Phase of an element, `None` if it was never bound.
    pub fn phase(&self, id: &str) -> Option<BindingPhase> {
        self.bindings.get(id).map(|b| b.phase)
    }

    /// Viewport used by the element's most recent pass.
    pub fn last_viewport(&self, id: &str) -> Option<Viewport> {
        self.bindings.get(id).and_then(|b| b.last_viewport)
    }

    /// Generation of the element's most recent pass (0 before the first).
    pub fn generation(&self, id: &str) -> Option<u64> {
        self.bindings.get(id).map(|b| b.generation.current())
    }

    /// Number of bound elements.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Passes started and not yet collected.
    pub fn passes_in_flight(&self) -> usize {
        self.passes.len()
    }

    /// Deadline of the pending resize burst, if any.
    pub fn resize_deadline(&self) -> Option<Instant> {
        self.resize_deadline
    }

    /// Apply a host event. Returns the number of passes started.
    pub fn handle_event(&mut self, event: HostEvent, now: Instant) -> usize {
        match event {
            HostEvent::Visible(id) => usize::from(self.on_visible(&id)),
            HostEvent::Resize(viewport) => {
                self.on_resize(viewport, now);
                0
            }
        }
    }

    /// First visibility of a pending element starts its first pass.
    ///
    /// Later visibility signals, and signals for unknown ids, are ignored.
    pub fn on_visible(&mut self, id: &str) -> bool {
        match self.bindings.get_mut(id) {
            Some(binding) if binding.phase == BindingPhase::Pending => {
                binding.phase = BindingPhase::Active;
            }
            Some(_) => return false,
            None => {
                debug!(element = %id, "visibility for unbound element ignored");
                return false;
            }
        }
        self.start_pass(id)
    }

    /// Record a viewport change and push the resize deadline out.
    pub fn on_resize(&mut self, viewport: Viewport, now: Instant) {
        self.viewport = viewport;
        self.resize_deadline = Some(now + self.config.resize_debounce);
    }

    /// Fire the resize burst if its quiet period has elapsed.
    ///
    /// Starts a pass for every active element whose last pass used a
    /// different viewport. Pending elements are untouched; they sample the
    /// viewport when they become visible. Returns the number of passes
    /// started.
    pub fn fire_resize(&mut self, now: Instant) -> usize {
        match self.resize_deadline {
            Some(deadline) if now >= deadline => self.resize_deadline = None,
            _ => return 0,
        }

        let viewport = self.viewport;
        let stale: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, b)| b.phase == BindingPhase::Active && b.last_viewport != Some(viewport))
            .map(|(id, _)| id.clone())
            .collect();

        debug!(
            width = viewport.width,
            height = viewport.height,
            elements = stale.len(),
            "resize settled"
        );

        stale.iter().filter(|id| self.start_pass(id)).count()
    }

    fn start_pass(&mut self, id: &str) -> bool {
        let viewport = self.viewport;
        let Some(binding) = self.bindings.get_mut(id) else {
            return false;
        };

        let generation = binding.generation.advance();
        binding.last_viewport = Some(viewport);

        let pass = Pass {
            renderer: self.renderer.clone(),
            encoder: self.encoder.clone(),
            element: Arc::clone(&binding.element),
            counter: Arc::clone(&binding.generation),
            generation,
            viewport,
        };

        debug!(element = %id, generation, "starting pass");
        self.passes.spawn(pass.run());
        true
    }

    fn record(&mut self, joined: Result<PassReport, JoinError>) {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "render pass task failed");
                return;
            }
        };
        if self.queue_reports {
            self.reports.push(report.clone());
        }
        self.summary.record(report);
    }

    /// Wait for every started pass.
    async fn settle(&mut self) {
        while let Some(joined) = self.passes.join_next().await {
            self.record(joined);
        }
    }

    /// Wait for every started pass and return the reports queued since the
    /// last drain.
    pub async fn drain(&mut self) -> Vec<PassReport> {
        self.settle().await;
        std::mem::take(&mut self.reports)
    }

    /// Counters over every pass collected so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Drive the scheduler from a host event channel until it closes.
    ///
    /// A resize burst still pending when the channel closes is honoured once
    /// its quiet period ends. Reports that were queued before the call are
    /// discarded.
    pub async fn run(mut self, mut events: mpsc::Receiver<HostEvent>) -> RunSummary {
        info!(elements = self.bindings.len(), "scheduler running");
        self.queue_reports = false;
        self.reports.clear();

        loop {
            let deadline = self.resize_deadline;
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event, Instant::now());
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_resize(Instant::now());
                }
                Some(joined) = self.passes.join_next(), if !self.passes.is_empty() => {
                    self.record(joined);
                }
            }
        }

        if let Some(deadline) = self.resize_deadline {
            sleep_until(deadline).await;
            self.fire_resize(deadline);
        }

        self.settle().await;
        info!(
            passes = self.summary.passes,
            published = self.summary.published,
            superseded = self.summary.superseded,
            failed = self.summary.failed,
            "scheduler stopped"
        );
        self.summary
    }
}

// =============================================================================
// Pass
// =============================================================================

/// Everything one pass needs, moved into its task.
struct Pass<F: TileFetcher> {
    renderer: MosaicRenderer<F>,
    encoder: SurfaceEncoder,
    element: Arc<dyn HostElement>,
    counter: Arc<Generation>,
    generation: u64,
    viewport: Viewport,
}

impl<F: TileFetcher> Pass<F> {
    async fn run(self) -> PassReport {
        let element_id = self.element.id().to_string();

        let status = match self.render().await {
            Ok(image) => {
                let window = image.window;
                let blank_cells = image.blank_cells;
                let element = &self.element;
                if self
                    .counter
                    .publish_if_current(self.generation, || element.publish(image))
                {
                    debug!(element = %element_id, generation = self.generation, blank_cells, "published");
                    PassStatus::Published {
                        window,
                        blank_cells,
                    }
                } else {
                    debug!(element = %element_id, generation = self.generation, "pass superseded, discarding");
                    PassStatus::Superseded
                }
            }
            Err(e) => {
                warn!(element = %element_id, error = %e, "render pass failed");
                PassStatus::Failed(e)
            }
        };

        PassReport {
            element_id,
            generation: self.generation,
            viewport: self.viewport,
            status,
        }
    }

    async fn render(&self) -> Result<PublishedImage, RenderError> {
        // Re-read every pass: the attribute may have changed since binding.
        let attribute = self
            .element
            .attribute(DESCRIPTOR_ATTRIBUTE)
            .ok_or(DescriptorError::MissingField(DESCRIPTOR_ATTRIBUTE))?;
        let descriptor = TileSetDescriptor::parse(&attribute)?;

        let output = self.renderer.render(&descriptor, self.viewport).await?;
        output.encode(
            &self.encoder,
            OutputFormat::from_extension(&descriptor.image_extension),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
