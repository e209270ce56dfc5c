//! Error taxonomy shared by every codec and statistics operation.

use thiserror::Error;

/// Result alias used across the crate.
pub type Rl2Result<T> = Result<T, Rl2Error>;

/// Failure reported by a pixel, raster, codec or statistics operation.
///
/// Every variant is terminal: nothing at this layer retries, and no
/// operation reports an error after partially mutating its output.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rl2Error {
    /// Accessor or operation invoked against the wrong sample type, pixel
    /// type or band count.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Band index, palette index, pixel position or sample value outside
    /// its legal range.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Header fields inconsistent, payload truncated or checksum failure.
    #[error("malformed BLOB: {0}")]
    MalformedBlob(String),

    /// Requested scale or compression not available for the pixel spec.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// A buffer sized from declared dimensions could not be allocated.
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    /// Statistics queried before any valid sample was aggregated.
    #[error("no data: {0}")]
    NoData(String),

    /// An external compression or image library reported a failure.
    #[error("codec failure: {0}")]
    Codec(String),
}

impl Rl2Error {
    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    pub(crate) fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedBlob(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedEncoding(msg.into())
    }

    pub(crate) fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}

/// Allocate a zero-filled buffer whose size comes from untrusted input.
pub(crate) fn try_alloc(len: usize) -> Rl2Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| Rl2Error::AllocationFailure(format!("{len} bytes: {e}")))?;
    buffer.resize(len, 0);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Rl2Error::out_of_range("band 3 of 3");
        assert_eq!(err.to_string(), "out of range: band 3 of 3");

        let err = Rl2Error::malformed("truncated header");
        assert!(err.to_string().contains("truncated header"));
    }

    #[test]
    fn test_try_alloc() {
        let buffer = try_alloc(16).unwrap();
        assert_eq!(buffer.len(), 16);
        assert!(buffer.iter().all(|&b| b == 0));

        let err = try_alloc(usize::MAX).unwrap_err();
        assert!(matches!(err, Rl2Error::AllocationFailure(_)));
    }
}
