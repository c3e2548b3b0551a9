//! Typed error enum for the `oas-normalizer` library API.
//!
//! Library consumers can match on specific variants. The CLI (`main.rs`)
//! converts these to `anyhow::Error` at the binary boundary for richer
//! context messages.

/// Errors produced by `oas-normalizer` library operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// File I/O failure (reading the source or writing the target document).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The source document could not be parsed at all.
    ///
    /// Partial parse problems are logged and tolerated; this variant means
    /// the input yielded no usable graph.
    #[error("failed to parse OpenAPI document: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// The normalized graph could not be serialized to JSON.
    #[error("failed to serialize normalized document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The run was cancelled cooperatively.
    ///
    /// Not a failure: the source is untouched and no target was written.
    #[error("normalization cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the library's public API.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time assertion that `Error` is `Send + Sync`.
    /// Required for use in async contexts and across thread boundaries.
    const _: () = {
        const fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    };

    #[test]
    fn cancelled_is_not_io() {
        assert!(matches!(Error::Cancelled, Error::Cancelled));
    }
}
