use crate::render::PublishedImage;

/// A host-side element that can carry a mosaic.
///
/// The engine never touches the host's document model directly. It reads
/// the descriptor attribute through this trait and hands finished images
/// back through [`publish`](HostElement::publish).
pub trait HostElement: Send + Sync {
    /// Stable identifier of the element within its page.
    fn id(&self) -> &str;

    /// Current value of an attribute, if present.
    ///
    /// Read on every pass, so edits to the attribute take effect on the next
    /// resize.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Receive a finished composite.
    fn publish(&self, image: PublishedImage);
}
