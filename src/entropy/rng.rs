//! CSPRNG seeded from an entropy source.
//!
//! RSA prime search consumes an unbounded amount of randomness through the
//! infallible `RngCore::fill_bytes`. Drawing a single seed up front keeps the
//! entropy source as the only origin of randomness while letting provider
//! failures surface as a `Result` before key generation starts.

use crate::entropy::source::EntropySource;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Number of bytes drawn from the entropy source to seed the generator.
pub const SEED_LEN: usize = 32;

/// Build a ChaCha-based generator seeded with [`SEED_LEN`] bytes from `source`.
pub fn seeded_rng<E: EntropySource + ?Sized>(source: &E) -> Result<StdRng> {
    let mut seed = [0u8; SEED_LEN];
    source.fill(&mut seed)?;
    Ok(StdRng::from_seed(seed))
}
