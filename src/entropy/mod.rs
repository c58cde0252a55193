//! Entropy sources.
//!
//! Every operation in the crate that needs randomness takes an
//! [`EntropySource`] as an explicit parameter. Two realizations are provided:
//!
//! - [`OsEntropy`] reads directly from the operating system CSPRNG.
//! - [`ChunkedEntropy`] turns a rate-limited [`RandomProvider`] (such as a
//!   remote KMS `GenerateRandom` call capped at 1024 bytes) into an
//!   unbounded-length random stream.
//!
//! # Example
//!
//! ```rust
//! use kmspki::entropy::{ChunkedEntropy, EntropySource};
//! use kmspki::entropy::mock::MockKms;
//!
//! # fn example() -> kmspki::error::Result<()> {
//! let entropy = ChunkedEntropy::new(MockKms::new());
//! let mut buf = [0u8; 3000];
//! entropy.fill(&mut buf)?;
//! assert!(buf.iter().all(|b| *b != 0));
//! # Ok(())
//! # }
//! ```

pub mod chunked;
pub mod mock;
pub mod provider;
pub mod rng;
pub mod source;

pub use chunked::{ChunkedEntropy, DEFAULT_MAX_BYTES_PER_CALL};
pub use provider::{OsRandomProvider, ProviderError, RandomProvider};
pub use rng::seeded_rng;
pub use source::{EntropySource, OsEntropy};
