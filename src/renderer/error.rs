//! Renderer initialization errors
//!
//! Indirect-draw-with-count and compute dispatch are hard requirements of the
//! culling pipeline; when the adapter cannot provide them initialization
//! fails loudly instead of degrading.

/// Renderer errors surfaced during initialization
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("No suitable GPU adapter available")]
    AdapterUnavailable,

    #[error("GPU is missing required capability: {feature}")]
    MissingCapability { feature: String },

    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("Device creation failed: {error}")]
    DeviceCreationFailed { error: String },
}
