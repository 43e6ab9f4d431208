//! use keyblob::error::KeyFileError;

use thiserror::Error;

/// Represents errors that can occur while reading or writing key containers.
///
/// Every variant is terminal to the operation that raised it. Secret scratch
/// buffers have already been zeroed by the time one of these reaches the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyFileError {
    /// Bad magic number or otherwise malformed header.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A field declared more bytes than the input holds.
    #[error("Unexpected end of file in {field}: expected {expected} bytes, found {available}")]
    UnexpectedEndOfFile {
        field: &'static str,
        expected: usize,
        available: usize,
    },

    /// The container is encrypted and no password was supplied.
    #[error("A password is required to decrypt this key")]
    PasswordRequired,

    /// None of the candidate keys produced a valid `RSA2` blob.
    #[error("The key could not be decrypted (wrong password?)")]
    DecryptionFailed,

    /// The blob carries an algorithm identifier other than the expected RSA one.
    #[error("Unsupported key algorithm: {0:#010x}")]
    UnsupportedAlgorithm(u32),

    /// The blob type byte and the RSAPUBKEY magic disagree.
    #[error("Blob type {blob_type:#04x} does not match RSA magic {magic:#010x}")]
    InconsistentHeader { blob_type: u8, magic: u32 },

    /// The RSA bit length is zero, not a multiple of 8, or above the configured maximum.
    #[error("Invalid key length: {0} bits")]
    InvalidKeyLength(u32),

    /// The trimmed public exponent does not fit the 4-byte on-disk field.
    #[error("Public exponent is {0} bytes long; at most 4 bytes can be stored")]
    ExponentTooLarge(usize),

    /// A stream cipher was keyed with an empty key.
    #[error("Cipher key must not be empty")]
    InvalidKey,

    /// Key parameters violate the field-length invariants.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A private key was requested from a public-only key.
    #[error("The private key is not available")]
    PrivateKeyUnavailable,

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),

    /// Error reading or writing a key file.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<der::Error> for KeyFileError {
    /// Converts a `der::Error` into a `KeyFileError`.
    fn from(err: der::Error) -> Self {
        KeyFileError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for KeyFileError {
    fn from(err: rsa::Error) -> Self {
        KeyFileError::RsaError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for KeyFileError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        KeyFileError::RsaError(err.to_string())
    }
}

impl From<std::io::Error> for KeyFileError {
    fn from(err: std::io::Error) -> Self {
        KeyFileError::Io(err.to_string())
    }
}
