use thiserror::Error;

/// I/O errors that can occur when fetching tile bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// The tile does not exist at the requested location
    #[error("Object not found: {0}")]
    NotFound(String),

    /// HTTP request failed or returned a non-success status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Local filesystem error other than a missing file
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    /// The source identifier cannot be routed to any fetcher
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),
}

/// A single tile could not be fetched or decoded.
///
/// Loaders convert this into a blank cell; it never aborts a render pass.
#[derive(Debug, Clone, Error)]
#[error("Failed to load tile {source_id}: {reason}")]
pub struct TileLoadError {
    /// Fully-qualified tile source identifier
    pub source_id: String,

    /// What went wrong
    pub reason: TileLoadReason,
}

/// Cause of a [`TileLoadError`].
#[derive(Debug, Clone, Error)]
pub enum TileLoadReason {
    /// The bytes could not be fetched
    #[error("{0}")]
    Fetch(#[from] IoError),

    /// The bytes were fetched but are not a decodable image
    #[error("decode failed: {0}")]
    Decode(String),
}

impl TileLoadError {
    pub fn fetch(source_id: impl Into<String>, err: IoError) -> Self {
        Self {
            source_id: source_id.into(),
            reason: TileLoadReason::Fetch(err),
        }
    }

    pub fn decode(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            reason: TileLoadReason::Decode(message.into()),
        }
    }

    /// Whether the tile is simply missing (as opposed to broken or unreachable).
    pub fn is_not_found(&self) -> bool {
        matches!(self.reason, TileLoadReason::Fetch(IoError::NotFound(_)))
    }
}

/// Errors produced while validating a `data-pruner` descriptor.
///
/// A descriptor error skips the element; it never affects sibling elements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The attribute value is not valid JSON (or not a JSON object)
    #[error("Invalid descriptor JSON: {0}")]
    InvalidJson(String),

    /// A required field is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape or an out-of-range value
    #[error("Invalid value for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl DescriptorError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        DescriptorError::InvalidField {
            field,
            message: message.into(),
        }
    }
}

/// Errors that abort a whole render pass.
///
/// Individual tile failures are not in here: they degrade to blank cells.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The descriptor failed validation
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// No explicit tile size and the first tile could not be loaded to infer it
    #[error("Cannot infer tile size: {0}")]
    TileSizeUnavailable(TileLoadError),

    /// The window would composite into more pixels than the renderer allows
    #[error("Composite of {width}x{height} pixels is larger than allowed")]
    CompositeTooLarge { width: u64, height: u64 },

    /// The composite could not be encoded
    #[error("Failed to encode composite: {message}")]
    Encode { message: String },
}
