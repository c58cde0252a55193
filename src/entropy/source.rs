//! The entropy capability shared by key generation, serial numbers and PEM encryption.

use crate::error::{PkiError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;

/// A provider of cryptographically strong random bytes.
///
/// `fill` either fills the whole buffer or fails. On failure the error reports
/// how many bytes at the start of `dest` were already written
/// (see [`PkiError::filled`]); the rest of the buffer is unspecified.
///
/// Implementations must be safe to share between threads: several issuance
/// operations may draw from the same source concurrently.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` with random bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

impl<T: EntropySource + ?Sized> EntropySource for &T {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill(dest)
    }
}

impl<T: EntropySource + ?Sized> EntropySource for Box<T> {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill(dest)
    }
}

impl<T: EntropySource + ?Sized> EntropySource for Arc<T> {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill(dest)
    }
}

/// Entropy read directly from the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| PkiError::ProviderFailure {
                requested: dest.len(),
                filled: 0,
                reason: e.to_string(),
            })
    }
}
