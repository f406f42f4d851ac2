//! Error types for nugen

use thiserror::Error;

/// nugen error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error: unrecognized enumerant, malformed mini-DSL,
    /// contradictory required fields. Fatal at initialization.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required resource could not be found (cross-section table, flux
    /// files for a tree-family mode). Fatal.
    #[error("resource unavailable: {0}")]
    Resource(String),

    /// The generator-side event record violates an invariant the current
    /// operation depends on.
    #[error("generator record invariant violated: {0}")]
    External(String),

    /// Flux pass-through carries inconsistent particle-code or length-unit
    /// flags.
    #[error("units mismatch: {0}")]
    Units(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
