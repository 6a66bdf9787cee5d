//! Element binding and pass scheduling.
//!
//! Connects host elements to the render pipeline:
//!
//! ```text
//!   HtmlPage / host ──► bind_elements ──► Scheduler ──► MosaicRenderer
//!         ▲                 (validate)     (Visible,        │
//!         │                                 Resize)         │
//!         └──────────────── publish(PublishedImage) ◄───────┘
//! ```
//!
//! - [`HostElement`]: what the engine needs from an element
//! - [`bind_elements`]: validates descriptors and binds valid elements
//! - [`Scheduler`]: per-element state machine with debounced resizes
//! - [`HtmlPage`]: discovers elements in static HTML

mod binder;
mod element;
mod page;
mod scheduler;

pub use binder::{bind_elements, read_descriptor, BindReport, SkippedElement};
pub use element::HostElement;
pub use page::{HtmlPage, PageElement};
pub use scheduler::{
    BindingPhase, HostEvent, PassReport, PassStatus, RunSummary, Scheduler, SchedulerConfig,
    DEFAULT_RESIZE_DEBOUNCE,
};
