//! Element binder.
//!
//! Validates the descriptor of each discovered element and attaches the
//! valid ones to a [`Scheduler`]. One bad element never affects its
//! siblings: it is logged and skipped.

use std::sync::Arc;

use tracing::{info, warn};

use super::element::HostElement;
use super::scheduler::Scheduler;
use crate::descriptor::{TileSetDescriptor, DESCRIPTOR_ATTRIBUTE};
use crate::error::DescriptorError;
use crate::io::TileFetcher;

/// An element that was not bound, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedElement {
    pub id: String,
    pub error: DescriptorError,
}

/// Result of binding a batch of elements.
#[derive(Debug, Clone, Default)]
pub struct BindReport {
    /// Ids of elements now pending visibility
    pub bound: Vec<String>,

    /// Elements rejected for an invalid descriptor
    pub skipped: Vec<SkippedElement>,
}

/// Read and validate the descriptor carried by an element.
pub fn read_descriptor(element: &dyn HostElement) -> Result<TileSetDescriptor, DescriptorError> {
    let attribute = element
        .attribute(DESCRIPTOR_ATTRIBUTE)
        .ok_or(DescriptorError::MissingField(DESCRIPTOR_ATTRIBUTE))?;
    TileSetDescriptor::parse(&attribute)
}

/// Validate and bind every element.
///
/// Elements whose id is already bound are neither bound again nor reported
/// as skipped.
pub fn bind_elements<F, I>(scheduler: &mut Scheduler<F>, elements: I) -> BindReport
where
    F: TileFetcher + 'static,
    I: IntoIterator<Item = Arc<dyn HostElement>>,
{
    let mut report = BindReport::default();

    for element in elements {
        match read_descriptor(element.as_ref()) {
            Ok(descriptor) => {
                let id = element.id().to_string();
                if scheduler.bind(element) {
                    info!(
                        element = %id,
                        name = %descriptor.name,
                        cols = descriptor.grid.cols,
                        rows = descriptor.grid.rows,
                        "bound mosaic element"
                    );
                    report.bound.push(id);
                }
            }
            Err(error) => {
                warn!(element = %element.id(), error = %error, "skipping element with invalid descriptor");
                report.skipped.push(SkippedElement {
                    id: element.id().to_string(),
                    error,
                });
            }
        }
    }

    report
}
