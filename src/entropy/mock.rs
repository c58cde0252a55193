//! Deterministic providers for tests and demos.
//!
//! [`MockKms`] stands in for a KMS endpoint: it never returns a zero byte, so
//! tests can check that every position of a buffer was written, and two fresh
//! instances produce the same stream. [`FailingProvider`] fails on a chosen
//! call after handing back a chosen number of bytes.

use crate::entropy::provider::{ProviderError, RandomProvider};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct CallLog {
    position: u64,
    sizes: Vec<usize>,
}

impl CallLog {
    fn record(&mut self, len: usize) -> Vec<u8> {
        self.sizes.push(len);
        (0..len).map(|_| self.next_byte()).collect()
    }

    fn next_byte(&mut self) -> u8 {
        let mut x = self.position.wrapping_add(0x9E37_79B9_7F4A_7C15);
        x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        x ^= x >> 31;
        self.position += 1;
        match (x >> 56) as u8 {
            0 => 1,
            b => b,
        }
    }
}

/// Deterministic stand-in for a KMS `GenerateRandom` endpoint.
#[derive(Debug, Default)]
pub struct MockKms {
    log: Mutex<CallLog>,
}

impl MockKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `generate_random` calls made so far.
    pub fn calls(&self) -> usize {
        self.lock().sizes.len()
    }

    /// Sizes of every call made so far, in order.
    pub fn requested_sizes(&self) -> Vec<usize> {
        self.lock().sizes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CallLog> {
        // A poisoned log only means another test thread panicked mid-call.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RandomProvider for MockKms {
    fn generate_random(&self, len: usize) -> Result<Vec<u8>, ProviderError> {
        Ok(self.lock().record(len))
    }
}

/// A provider that breaks on its `fail_on_call`-th call (1-indexed).
///
/// On that call it returns `partial` bytes, either as a failure
/// ([`FailingProvider::new`]) or as a silently short success
/// ([`FailingProvider::short`]).
#[derive(Debug)]
pub struct FailingProvider {
    inner: MockKms,
    fail_on_call: usize,
    partial: usize,
    silent: bool,
}

impl FailingProvider {
    pub fn new(fail_on_call: usize, partial: usize) -> Self {
        Self {
            inner: MockKms::new(),
            fail_on_call,
            partial,
            silent: false,
        }
    }

    pub fn short(fail_on_call: usize, partial: usize) -> Self {
        Self {
            silent: true,
            ..Self::new(fail_on_call, partial)
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }

    pub fn requested_sizes(&self) -> Vec<usize> {
        self.inner.requested_sizes()
    }
}

impl RandomProvider for FailingProvider {
    fn generate_random(&self, len: usize) -> Result<Vec<u8>, ProviderError> {
        let mut bytes = self.inner.generate_random(len)?;
        if self.inner.calls() != self.fail_on_call {
            return Ok(bytes);
        }

        bytes.truncate(self.partial.min(len));
        if self.silent {
            Ok(bytes)
        } else {
            Err(ProviderError::with_partial(bytes, "simulated KMS failure"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_kms_never_returns_zero() {
        let kms = MockKms::new();
        let bytes = kms.generate_random(4096).unwrap();
        assert_eq!(bytes.len(), 4096);
        assert!(bytes.iter().all(|b| *b != 0));
    }

    #[test]
    fn test_mock_kms_is_deterministic() {
        let a = MockKms::new();
        let b = MockKms::new();
        assert_eq!(a.generate_random(100).unwrap(), b.generate_random(100).unwrap());
        // The stream continues rather than restarting.
        assert_ne!(a.generate_random(100).unwrap(), MockKms::new().generate_random(100).unwrap());
    }

    #[test]
    fn test_mock_kms_records_calls() {
        let kms = MockKms::new();
        kms.generate_random(10).unwrap();
        kms.generate_random(3).unwrap();
        assert_eq!(kms.calls(), 2);
        assert_eq!(kms.requested_sizes(), vec![10, 3]);
    }

    #[test]
    fn test_failing_provider() {
        let provider = FailingProvider::new(2, 5);
        assert_eq!(provider.generate_random(10).unwrap().len(), 10);

        let err = provider.generate_random(10).unwrap_err();
        assert_eq!(err.partial.len(), 5);

        // Later calls succeed again; the adapter must not issue them.
        assert!(provider.generate_random(10).is_ok());
    }

    #[test]
    fn test_short_provider() {
        let provider = FailingProvider::short(1, 4);
        assert_eq!(provider.generate_random(10).unwrap().len(), 4);
    }
}
