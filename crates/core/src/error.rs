//! Unified infrastructure error type for instasearch.
//!
//! Domain-level rejections (eligibility verdicts, serving reasons, fetch
//! failures) carry their own enums; this type covers the plumbing that can
//! genuinely fail: file I/O and (de)serialization of persisted state.

/// Infrastructure errors for the prefetch engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A URL string could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Reading or writing the prefs file failed.
    #[error("prefs I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the persisted alias cache failed.
    #[error("prefs serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
