//! PVK private-key files.
//!
//! ```text
//! magic:u32 = 0xB0B5F11E   reserved:i32   keyType:i32   encrypted:i32
//! saltLen:i32   keyLen:i32   salt[saltLen]   blob[keyLen]
//! ```
//!
//! `blob` is a CryptoAPI `PRIVATEKEYBLOB`. When the file is encrypted,
//! everything after the 8-byte BLOBHEADER is RC4-encrypted with a key derived
//! from `SHA-1(salt || password)`. Two keys are tried: the first 16 digest
//! bytes, then (for files written with export-grade crypto) the first 5 digest
//! bytes padded with zeros to 16 bytes.

use std::path::Path;

use bon::Builder;
use core::fmt;
use rand_core::{OsRng, RngCore};
use sha1::{Digest, Sha1};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::Result;
use crate::byte_order::FieldReader;
use crate::error::KeyFileError;
use crate::key::KeyBlob;
use crate::key::blob::{AlgorithmId, BLOB_HEADER_LEN, MAX_KEY_BITS, RSA2_MAGIC};
use crate::rc4;
use crate::secret::{DISCARD, ReleaseObserver, Scratch};

/// First four bytes of every PVK file, read little-endian.
pub const PVK_MAGIC: u32 = 0xB0B5_F11E;

const PVK_HEADER_LEN: usize = 24;
const SALT_LEN: usize = 16;
const RC4_KEY_LEN: usize = 16;
const STRONG_KEY_LEN: usize = 16;
const EXPORT_KEY_LEN: usize = 5;

/// `keyType` of a PVK file (the CryptoAPI key spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    /// `AT_KEYEXCHANGE`
    KeyExchange,
    /// `AT_SIGNATURE`
    #[default]
    Signature,
    /// Any other value found in a file.
    Other(i32),
}

impl KeyType {
    pub fn raw(self) -> i32 {
        match self {
            KeyType::KeyExchange => 1,
            KeyType::Signature => 2,
            KeyType::Other(value) => value,
        }
    }

    /// Algorithm id expected in the blob header for this key type.
    pub fn algorithm(self) -> AlgorithmId {
        match self {
            KeyType::KeyExchange => AlgorithmId::RsaKeyExchange,
            KeyType::Signature | KeyType::Other(_) => AlgorithmId::RsaSignature,
        }
    }
}

impl From<i32> for KeyType {
    fn from(value: i32) -> Self {
        match value {
            1 => KeyType::KeyExchange,
            2 => KeyType::Signature,
            other => KeyType::Other(other),
        }
    }
}

/// Options for reading PVK files.
///
/// # Fields
/// * `allow_export_key` - Whether to retry with the 40-bit export key when the strong key fails.
/// * `max_key_bits` - Largest RSA modulus accepted in the decrypted blob.
#[derive(Clone, Debug, Builder)]
pub struct PvkOptions {
    #[builder(default = true)]
    pub allow_export_key: bool,
    #[builder(default = MAX_KEY_BITS)]
    pub max_key_bits: u32,
}

impl Default for PvkOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A parsed PVK file.
///
/// After a successful parse `blob` always holds the plaintext key blob;
/// for encrypted files it was decrypted in place. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PvkContainer {
    #[zeroize(skip)]
    key_type: KeyType,
    encrypted: bool,
    salt: Vec<u8>,
    blob: Vec<u8>,
    #[zeroize(skip)]
    max_key_bits: u32,
}

impl PvkContainer {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Whether the file on disk was encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// The plaintext `PRIVATEKEYBLOB`.
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Decodes the inner key blob, expecting the algorithm that matches the key type.
    pub fn key_blob(&self) -> Result<KeyBlob> {
        KeyBlob::decode_with(&self.blob, self.key_type.algorithm(), self.max_key_bits)
    }
}

impl fmt::Debug for PvkContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PvkContainer")
            .field("key_type", &self.key_type)
            .field("encrypted", &self.encrypted)
            .field("salt_len", &self.salt.len())
            .field("blob_len", &self.blob.len())
            .finish()
    }
}

/// Reads PVK files.
///
/// Every buffer that holds password-derived material during decryption is a
/// [`Scratch`] guard; the reader's observer sees each one after it is wiped.
pub struct PvkReader<'o> {
    options: PvkOptions,
    observer: &'o dyn ReleaseObserver,
}

impl PvkReader<'static> {
    pub fn new(options: PvkOptions) -> Self {
        Self {
            options,
            observer: &DISCARD,
        }
    }
}

impl Default for PvkReader<'static> {
    fn default() -> Self {
        Self::new(PvkOptions::default())
    }
}

impl<'o> PvkReader<'o> {
    /// Reports released scratch buffers to `observer`.
    pub fn with_observer<'a>(self, observer: &'a dyn ReleaseObserver) -> PvkReader<'a> {
        PvkReader {
            options: self.options,
            observer,
        }
    }

    /// Parses a PVK file and decrypts its key blob if needed.
    ///
    /// # Arguments
    /// * `bytes` - The whole file.
    /// * `password` - Required when the file is encrypted; ignored otherwise.
    pub fn parse(&self, bytes: &[u8], password: Option<&str>) -> Result<PvkContainer> {
        let mut reader = FieldReader::new(bytes);
        let magic = reader.read_u32("magic")?;
        if magic != PVK_MAGIC {
            return Err(KeyFileError::InvalidFormat(format!(
                "Not a PVK file (magic {magic:#010x})"
            )));
        }
        reader.skip(4, "reserved")?;
        let key_type = KeyType::from(reader.read_i32("key type")?);
        let encrypted = reader.read_i32("encryption flag")? != 0;
        let salt_len = declared_len(reader.read_i32("salt length")?, "salt")?;
        let key_len = declared_len(reader.read_i32("key length")?, "key blob")?;

        let mut container = PvkContainer {
            key_type,
            encrypted,
            salt: reader.take(salt_len, "salt")?.to_vec(),
            blob: reader.take(key_len, "key blob")?.to_vec(),
            max_key_bits: self.options.max_key_bits,
        };
        tracing::debug!(?key_type, encrypted, salt_len, key_len, "Parsed PVK header");

        if encrypted {
            let password = password
                .filter(|p| !p.is_empty())
                .ok_or(KeyFileError::PasswordRequired)?;
            self.decrypt_in_place(&container.salt, password, &mut container.blob)?;
        }
        Ok(container)
    }

    /// Reads a PVK file from disk and decodes its key.
    pub fn load(&self, path: impl AsRef<Path>, password: Option<&str>) -> Result<KeyBlob> {
        let path = path.as_ref();
        let bytes = Zeroizing::new(std::fs::read(path)?);
        tracing::debug!(path = %path.display(), len = bytes.len(), "Loading PVK file");
        self.parse(&bytes, password)?.key_blob()
    }

    fn decrypt_in_place(&self, salt: &[u8], password: &str, blob: &mut [u8]) -> Result<()> {
        if blob.len() < BLOB_HEADER_LEN + RSA2_MAGIC.len() {
            return Err(KeyFileError::InvalidFormat(format!(
                "Encrypted key blob is only {} bytes long",
                blob.len()
            )));
        }
        let digest = salted_digest(salt, password, self.observer);

        let mut key_lens = vec![STRONG_KEY_LEN];
        if self.options.allow_export_key {
            key_lens.push(EXPORT_KEY_LEN);
        }
        for key_len in key_lens {
            let key = rc4_key(&digest, key_len, self.observer);
            let mut candidate = Scratch::new(
                "decrypted blob",
                blob[BLOB_HEADER_LEN..].to_vec(),
                self.observer,
            );
            rc4::apply(&key, &mut candidate)?;
            if candidate.starts_with(&RSA2_MAGIC) {
                if key_len == EXPORT_KEY_LEN {
                    tracing::warn!("PVK key blob was encrypted with a 40-bit export key");
                }
                blob[BLOB_HEADER_LEN..].copy_from_slice(&candidate);
                return Ok(());
            }
        }
        Err(KeyFileError::DecryptionFailed)
    }
}

/// Reads a PVK file and returns its key.
pub fn load_pvk(path: impl AsRef<Path>, password: Option<&str>) -> Result<KeyBlob> {
    PvkReader::default().load(path, password)
}

fn declared_len(value: i32, field: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        KeyFileError::InvalidFormat(format!("Negative length {value} declared for {field}"))
    })
}

/// `SHA-1(salt || password)`.
fn salted_digest<'o>(
    salt: &[u8],
    password: &str,
    observer: &'o dyn ReleaseObserver,
) -> Scratch<'o> {
    let password = Scratch::new("password", password.as_bytes().to_vec(), observer);
    let mut material = Scratch::zeroed("salted password", salt.len() + password.len(), observer);
    material[..salt.len()].copy_from_slice(salt);
    material[salt.len()..].copy_from_slice(&password);

    let mut output = Sha1::digest(&*material);
    let digest = Scratch::new("digest", output.to_vec(), observer);
    output.as_mut_slice().zeroize();
    digest
}

/// A 16-byte RC4 key holding the first `key_len` digest bytes, zero-padded.
fn rc4_key<'o>(
    digest: &[u8],
    key_len: usize,
    observer: &'o dyn ReleaseObserver,
) -> Scratch<'o> {
    let mut key = Scratch::zeroed("rc4 key", RC4_KEY_LEN, observer);
    key[..key_len].copy_from_slice(&digest[..key_len]);
    key
}

/// Writes PVK files.
///
/// # Fields
/// * `key_type` - CryptoAPI key type recorded in the header; also selects the blob algorithm id.
/// * `password` - Encrypts the key blob when set.
/// * `export_grade` - Encrypt with the 40-bit export key instead of the 128-bit key.
/// * `salt` - Fixed salt; a random 16-byte salt is drawn when absent.
#[derive(Builder)]
pub struct PvkWriter {
    #[builder(default)]
    key_type: KeyType,
    #[builder(into)]
    password: Option<Zeroizing<String>>,
    #[builder(default)]
    export_grade: bool,
    salt: Option<Vec<u8>>,
}

impl PvkWriter {
    /// Encodes a private key as a PVK file.
    pub fn encode(&self, key: &KeyBlob) -> Result<Zeroizing<Vec<u8>>> {
        let blob = key.encode_with(self.key_type.algorithm(), true)?;
        let password = match &self.password {
            Some(password) if password.is_empty() => {
                return Err(KeyFileError::InvalidInput(
                    "The password must not be empty".to_string(),
                ));
            }
            Some(password) => Some(password.as_str()),
            None => None,
        };
        let salt = match (password, &self.salt) {
            (None, _) => Vec::new(),
            (Some(_), Some(salt)) => salt.clone(),
            (Some(_), None) => {
                let mut salt = vec![0u8; SALT_LEN];
                OsRng.fill_bytes(&mut salt);
                salt
            }
        };

        let mut out = Zeroizing::new(Vec::with_capacity(PVK_HEADER_LEN + salt.len() + blob.len()));
        out.extend_from_slice(&PVK_MAGIC.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&self.key_type.raw().to_le_bytes());
        out.extend_from_slice(&i32::from(password.is_some()).to_le_bytes());
        out.extend_from_slice(&(salt.len() as u32).to_le_bytes());
        out.extend_from_slice(&(blob.len() as u32).to_le_bytes());
        out.extend_from_slice(&salt);
        let blob_start = out.len();
        out.extend_from_slice(&blob);

        if let Some(password) = password {
            let digest = salted_digest(&salt, password, &DISCARD);
            let key_len = if self.export_grade {
                EXPORT_KEY_LEN
            } else {
                STRONG_KEY_LEN
            };
            let key = rc4_key(&digest, key_len, &DISCARD);
            rc4::apply(&key, &mut out[blob_start + BLOB_HEADER_LEN..])?;
        }
        tracing::debug!(
            key_type = ?self.key_type,
            encrypted = password.is_some(),
            len = out.len(),
            "Encoded PVK file"
        );
        Ok(out)
    }

    /// Encodes a private key and writes it to `path`.
    pub fn save(&self, key: &KeyBlob, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.encode(key)?;
        std::fs::write(path, &*bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::tests::toy_key;
    use hex_literal::hex;
    use std::cell::RefCell;

    const SALT: [u8; 16] = hex!("000102030405060708090a0b0c0d0e0f");

    #[derive(Default)]
    struct Tracker(RefCell<Vec<(&'static str, bool)>>);

    impl ReleaseObserver for Tracker {
        fn released(&self, label: &'static str, contents: &[u8]) {
            let wiped = contents.iter().all(|&b| b == 0);
            self.0.borrow_mut().push((label, wiped));
        }
    }

    impl Tracker {
        fn assert_all_wiped(&self) {
            let released = self.0.borrow();
            assert!(!released.is_empty());
            for (label, wiped) in released.iter() {
                assert!(*wiped, "{label} was not wiped");
            }
        }

        fn labels(&self) -> Vec<&'static str> {
            self.0.borrow().iter().map(|(label, _)| *label).collect()
        }
    }

    fn header(key_type: i32, encrypted: i32, salt_len: u32, key_len: u32) -> Vec<u8> {
        let mut out = PVK_MAGIC.to_le_bytes().to_vec();
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&key_type.to_le_bytes());
        out.extend_from_slice(&encrypted.to_le_bytes());
        out.extend_from_slice(&salt_len.to_le_bytes());
        out.extend_from_slice(&key_len.to_le_bytes());
        out
    }

    /// Builds an encrypted PVK by hand: RC4 over everything after the
    /// BLOBHEADER, keyed with the first `key_len` bytes of SHA-1(salt || password).
    fn encrypted_fixture(password: &str, key_len: usize) -> Vec<u8> {
        let blob = toy_key().encode(true).unwrap();
        let mut digest_input = SALT.to_vec();
        digest_input.extend_from_slice(password.as_bytes());
        let digest = Sha1::digest(&digest_input);
        let mut rc4_key = [0u8; 16];
        rc4_key[..key_len].copy_from_slice(&digest[..key_len]);

        let mut encrypted = blob.to_vec();
        rc4::apply(&rc4_key, &mut encrypted[8..]).unwrap();
        assert_ne!(&encrypted[8..12], b"RSA2");

        let mut file = header(2, 1, SALT.len() as u32, encrypted.len() as u32);
        file.extend_from_slice(&SALT);
        file.extend_from_slice(&encrypted);
        file
    }

    #[test]
    fn test_parse_unencrypted() {
        let blob = toy_key().encode(true).unwrap();
        let mut file = header(2, 0, 0, blob.len() as u32);
        file.extend_from_slice(&blob);

        let container = PvkReader::default().parse(&file, None).unwrap();
        assert_eq!(container.key_type(), KeyType::Signature);
        assert!(!container.is_encrypted());
        assert!(container.salt().is_empty());
        assert_eq!(container.blob(), blob.as_slice());
        assert_eq!(container.key_blob().unwrap(), toy_key());
    }

    #[test]
    fn test_parse_encrypted_with_strong_key() {
        let file = encrypted_fixture("hunter2", 16);
        let container = PvkReader::default().parse(&file, Some("hunter2")).unwrap();
        assert!(container.is_encrypted());
        assert_eq!(container.salt(), &SALT);
        assert_eq!(&container.blob()[8..12], b"RSA2");
        assert_eq!(container.key_blob().unwrap(), toy_key());
    }

    #[test]
    fn test_parse_encrypted_with_export_key() {
        let file = encrypted_fixture("hunter2", 5);
        let container = PvkReader::default().parse(&file, Some("hunter2")).unwrap();
        assert_eq!(container.key_blob().unwrap(), toy_key());

        let strict = PvkReader::new(PvkOptions::builder().allow_export_key(false).build());
        assert_eq!(
            strict.parse(&file, Some("hunter2")).unwrap_err(),
            KeyFileError::DecryptionFailed
        );
    }

    #[test]
    fn test_parse_wrong_password() {
        let file = encrypted_fixture("hunter2", 16);
        assert_eq!(
            PvkReader::default()
                .parse(&file, Some("hunter3"))
                .unwrap_err(),
            KeyFileError::DecryptionFailed
        );
    }

    #[test]
    fn test_parse_requires_password() {
        let file = encrypted_fixture("hunter2", 16);
        let reader = PvkReader::default();
        assert_eq!(
            reader.parse(&file, None).unwrap_err(),
            KeyFileError::PasswordRequired
        );
        assert_eq!(
            reader.parse(&file, Some("")).unwrap_err(),
            KeyFileError::PasswordRequired
        );
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut file = encrypted_fixture("hunter2", 16);
        file[0] = 0x1F;
        assert!(matches!(
            PvkReader::default().parse(&file, Some("hunter2")),
            Err(KeyFileError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_rejects_negative_lengths() {
        let file = header(2, 0, u32::MAX, 0);
        assert!(matches!(
            PvkReader::default().parse(&file, None),
            Err(KeyFileError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_fields() {
        let file = encrypted_fixture("hunter2", 16);
        let blob_len = file.len() - PVK_HEADER_LEN - SALT.len();

        // One byte short of the declared blob.
        let err = PvkReader::default()
            .parse(&file[..file.len() - 1], Some("hunter2"))
            .unwrap_err();
        assert_eq!(
            err,
            KeyFileError::UnexpectedEndOfFile {
                field: "key blob",
                expected: blob_len,
                available: blob_len - 1
            }
        );

        // One byte short of the declared salt.
        let err = PvkReader::default()
            .parse(&file[..PVK_HEADER_LEN + SALT.len() - 1], Some("hunter2"))
            .unwrap_err();
        assert_eq!(
            err,
            KeyFileError::UnexpectedEndOfFile {
                field: "salt",
                expected: SALT.len(),
                available: SALT.len() - 1
            }
        );

        // Short header.
        let err = PvkReader::default().parse(&file[..10], None).unwrap_err();
        assert!(matches!(err, KeyFileError::UnexpectedEndOfFile { .. }));
    }

    #[test]
    fn test_scratch_wiped_after_success() {
        let tracker = Tracker::default();
        let file = encrypted_fixture("hunter2", 5);
        let container = PvkReader::default()
            .with_observer(&tracker)
            .parse(&file, Some("hunter2"))
            .unwrap();
        assert_eq!(container.key_blob().unwrap(), toy_key());

        tracker.assert_all_wiped();
        let labels = tracker.labels();
        for label in [
            "password",
            "salted password",
            "digest",
            "rc4 key",
            "decrypted blob",
        ] {
            assert!(labels.contains(&label), "{label} never released");
        }
        // Both candidate keys were tried.
        assert_eq!(labels.iter().filter(|l| **l == "rc4 key").count(), 2);
    }

    #[test]
    fn test_scratch_wiped_after_failure() {
        let tracker = Tracker::default();
        let file = encrypted_fixture("hunter2", 16);
        let err = PvkReader::default()
            .with_observer(&tracker)
            .parse(&file, Some("wrong"))
            .unwrap_err();
        assert_eq!(err, KeyFileError::DecryptionFailed);
        tracker.assert_all_wiped();
        let decrypted = tracker
            .labels()
            .iter()
            .filter(|l| **l == "decrypted blob")
            .count();
        assert_eq!(decrypted, 2);
    }

    #[test]
    fn test_writer_round_trip() {
        let key = toy_key();
        for export_grade in [false, true] {
            let file = PvkWriter::builder()
                .key_type(KeyType::KeyExchange)
                .password("correct horse".to_string())
                .export_grade(export_grade)
                .build()
                .encode(&key)
                .unwrap();
            let container = PvkReader::default()
                .parse(&file, Some("correct horse"))
                .unwrap();
            assert_eq!(container.key_type(), KeyType::KeyExchange);
            assert_eq!(container.salt().len(), SALT_LEN);
            assert_eq!(container.key_blob().unwrap(), key);
        }
    }

    #[test]
    fn test_writer_matches_hand_built_fixture() {
        let file = PvkWriter::builder()
            .password("hunter2".to_string())
            .salt(SALT.to_vec())
            .build()
            .encode(&toy_key())
            .unwrap();
        assert_eq!(file.as_slice(), encrypted_fixture("hunter2", 16).as_slice());
    }

    #[test]
    fn test_writer_requires_private_key() {
        let writer = PvkWriter::builder().build();
        assert_eq!(
            writer.encode(&toy_key().public_key_only()).unwrap_err(),
            KeyFileError::PrivateKeyUnavailable
        );
    }
}
