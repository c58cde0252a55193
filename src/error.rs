//! Error types for the kmspki library.
//!
//! Every operation in the crate returns [`Result`]. Errors are propagated to the
//! immediate caller with the context needed to diagnose them (requested sizes,
//! partial byte counts, the underlying cause); nothing is retried or swallowed.

use thiserror::Error;

/// The main error type for kmspki operations.
#[derive(Error, Debug)]
pub enum PkiError {
    /// The entropy provider failed part-way through a request.
    ///
    /// `filled` bytes at the start of the caller's buffer hold the random bytes
    /// that were received before the failure.
    #[error("Entropy provider failure after {filled} of {requested} bytes: {reason}")]
    ProviderFailure {
        requested: usize,
        filled: usize,
        reason: String,
    },

    /// The entropy provider returned fewer bytes than asked without reporting an error.
    #[error("Entropy exhausted: provider returned {filled} of {requested} bytes")]
    EntropyExhausted { requested: usize, filled: usize },

    /// A single provider call asked for more than the provider allows.
    #[error("Entropy request of {requested} bytes exceeds the per-call maximum of {max}")]
    SizeExceeded { requested: usize, max: usize },

    /// Input was not a well-formed PEM block of the expected type
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// A PEM payload did not deserialize to the expected DER structure
    #[error("Parse error: {0}")]
    ParseError(String),

    /// An embedded signature failed verification
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// A freshly produced signature did not verify
    #[error("Signature generation error: {0}")]
    SignatureGeneration(String),

    /// A CA certificate and private key do not belong together
    #[error("Key mismatch: {0}")]
    KeyMismatch(String),

    /// Certificate template construction or encoding failed
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Invalid key format or content
    #[error("Invalid key: {0}")]
    InvalidKeyError(String),

    /// Passphrase did not decrypt the private key
    #[error("Invalid password")]
    InvalidPasswordError,

    /// An encrypted private key was supplied without a passphrase
    #[error("Private key is encrypted but no passphrase was supplied")]
    PassphraseRequired,

    /// The encrypted PEM block names a cipher we cannot decrypt
    #[error("Unsupported PEM cipher: {0}")]
    UnsupportedCipher(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PkiError {
    /// Number of random bytes already written to the caller's buffer when an
    /// entropy request failed, if this is an entropy error.
    pub fn filled(&self) -> Option<usize> {
        match self {
            PkiError::ProviderFailure { filled, .. } | PkiError::EntropyExhausted { filled, .. } => {
                Some(*filled)
            }
            _ => None,
        }
    }
}

/// A specialized Result type for kmspki operations.
pub type Result<T> = std::result::Result<T, PkiError>;
