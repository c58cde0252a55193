//! Chunking adapter over a rate-limited random-byte provider.
//!
//! A request for `L` bytes against a provider capped at `M` bytes per call is
//! served by `L / M` full-size calls followed by one `L % M` remainder call
//! (only when the remainder is non-zero). Results are copied into the output
//! buffer in call order, so two requests of the same length against a
//! deterministic provider produce identical output.

use crate::entropy::provider::{ProviderError, RandomProvider};
use crate::entropy::source::EntropySource;
use crate::error::{PkiError, Result};
use tracing::{debug, warn};

/// Per-call limit of the AWS KMS `GenerateRandom` API.
pub const DEFAULT_MAX_BYTES_PER_CALL: usize = 1024;

/// An [`EntropySource`] that splits requests into provider-sized chunks.
#[derive(Debug, Clone)]
pub struct ChunkedEntropy<P> {
    provider: P,
    max_bytes_per_call: usize,
}

/// Outcome of a single provider call.
enum ChunkError {
    TooLarge { requested: usize, max: usize },
    Provider(ProviderError),
}

impl<P: RandomProvider> ChunkedEntropy<P> {
    /// Wrap `provider` using the default 1024-byte per-call limit.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            max_bytes_per_call: DEFAULT_MAX_BYTES_PER_CALL,
        }
    }

    /// Wrap `provider` with an explicit per-call limit.
    ///
    /// # Example
    ///
    /// ```
    /// use kmspki::entropy::ChunkedEntropy;
    /// use kmspki::entropy::mock::MockKms;
    ///
    /// let entropy = ChunkedEntropy::with_max_bytes_per_call(MockKms::new(), 256).unwrap();
    /// assert_eq!(entropy.max_bytes_per_call(), 256);
    /// assert!(ChunkedEntropy::with_max_bytes_per_call(MockKms::new(), 0).is_err());
    /// ```
    pub fn with_max_bytes_per_call(provider: P, max_bytes_per_call: usize) -> Result<Self> {
        if max_bytes_per_call == 0 {
            return Err(PkiError::ConfigError(
                "max bytes per call must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            provider,
            max_bytes_per_call,
        })
    }

    pub fn max_bytes_per_call(&self) -> usize {
        self.max_bytes_per_call
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The chunk sizes a request for `len` bytes is split into, in call order.
    pub fn chunk_plan(&self, len: usize) -> Vec<usize> {
        let full = len / self.max_bytes_per_call;
        let remainder = len % self.max_bytes_per_call;

        let mut plan = vec![self.max_bytes_per_call; full];
        if remainder > 0 {
            plan.push(remainder);
        }
        plan
    }

    /// One provider call. Never asked for more than the limit by `fill`.
    fn random_bytes(&self, n: usize) -> std::result::Result<Vec<u8>, ChunkError> {
        if n > self.max_bytes_per_call {
            return Err(ChunkError::TooLarge {
                requested: n,
                max: self.max_bytes_per_call,
            });
        }
        self.provider.generate_random(n).map_err(ChunkError::Provider)
    }
}

impl<P: RandomProvider> EntropySource for ChunkedEntropy<P> {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        if dest.is_empty() {
            return Ok(());
        }

        let requested = dest.len();
        let plan = self.chunk_plan(requested);
        debug!(
            requested,
            calls = plan.len(),
            max_bytes_per_call = self.max_bytes_per_call,
            "filling buffer from random provider"
        );

        let mut filled = 0;
        for (call, size) in plan.into_iter().enumerate() {
            let bytes = match self.random_bytes(size) {
                Ok(bytes) => bytes,
                Err(ChunkError::TooLarge { requested, max }) => {
                    return Err(PkiError::SizeExceeded { requested, max });
                }
                Err(ChunkError::Provider(err)) => {
                    let take = err.partial.len().min(size);
                    dest[filled..filled + take].copy_from_slice(&err.partial[..take]);
                    filled += take;
                    warn!(call = call + 1, filled, requested, reason = %err.reason, "random provider call failed");
                    return Err(PkiError::ProviderFailure {
                        requested,
                        filled,
                        reason: err.reason,
                    });
                }
            };

            let take = bytes.len().min(size);
            dest[filled..filled + take].copy_from_slice(&bytes[..take]);
            filled += take;

            if take < size {
                warn!(call = call + 1, filled, requested, "random provider returned short");
                return Err(PkiError::EntropyExhausted { requested, filled });
            }
        }

        Ok(())
    }
}
