//! The boundary to a rate-limited random-byte service.
//!
//! Transport, authentication and region selection for a remote KMS are the
//! provider's concern. The crate only needs "generate N random bytes" with N no
//! larger than the provider's per-call maximum.

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Failure reported by a [`RandomProvider`] call.
///
/// A provider may have produced some bytes before failing; they are handed
/// back in `partial` so the caller can account for them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ProviderError {
    pub partial: Vec<u8>,
    pub reason: String,
}

impl ProviderError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            partial: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn with_partial(partial: Vec<u8>, reason: impl Into<String>) -> Self {
        Self {
            partial,
            reason: reason.into(),
        }
    }
}

/// A remote random-byte service such as KMS `GenerateRandom`.
pub trait RandomProvider: Send + Sync {
    /// Return exactly `len` random bytes, or fail.
    fn generate_random(&self, len: usize) -> std::result::Result<Vec<u8>, ProviderError>;
}

impl<P: RandomProvider + ?Sized> RandomProvider for &P {
    fn generate_random(&self, len: usize) -> std::result::Result<Vec<u8>, ProviderError> {
        (**self).generate_random(len)
    }
}

impl<P: RandomProvider + ?Sized> RandomProvider for std::sync::Arc<P> {
    fn generate_random(&self, len: usize) -> std::result::Result<Vec<u8>, ProviderError> {
        (**self).generate_random(len)
    }
}

/// A local provider backed by the OS RNG that enforces its own per-call cap.
///
/// Behaves like a KMS endpoint without the network: requests above `max_len`
/// are refused, so anything driving it must chunk.
#[derive(Debug, Clone, Copy)]
pub struct OsRandomProvider {
    max_len: usize,
}

impl OsRandomProvider {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl RandomProvider for OsRandomProvider {
    fn generate_random(&self, len: usize) -> std::result::Result<Vec<u8>, ProviderError> {
        if len > self.max_len {
            return Err(ProviderError::new(format!(
                "NumberOfBytes {} exceeds limit {}",
                len, self.max_len
            )));
        }
        let mut out = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut out)
            .map_err(|e| ProviderError::new(e.to_string()))?;
        Ok(out)
    }
}
