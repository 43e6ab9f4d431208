//! Strong-name key (SNK) files.
//!
//! A key-pair SNK file is a bare `PRIVATEKEYBLOB`. A public-only SNK file is
//! a `PUBLICKEYBLOB` preceded by a 12-byte header:
//!
//! ```text
//! sigAlgId:u32 = 0x2400 (CALG_RSA_SIGN)   hashAlgId:u32 = 0x8004 (CALG_SHA1)
//! cbPublicKey:u32                          PUBLICKEYBLOB[cbPublicKey]
//! ```
//!
//! Both layouts are accepted when loading; a public-only blob without the
//! header loads as well.

use std::path::Path;

use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::Result;
use crate::byte_order::FieldReader;
use crate::error::KeyFileError;
use crate::key::blob::{AlgorithmId, BlobType};
use crate::key::{KeyBlob, PrivateParts};

const CALG_SHA1: u32 = 0x0000_8004;
const PUBLIC_KEY_HEADER_LEN: usize = 12;

/// An RSA signing key as stored in an SNK file.
///
/// The key material is wiped when the value is dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnkFile {
    key: KeyBlob,
}

impl SnkFile {
    pub fn from_key_blob(key: KeyBlob) -> Self {
        Self { key }
    }

    /// Builds an SNK file from big-endian RSA parameters.
    ///
    /// # Arguments
    /// * `modulus` - The modulus.
    /// * `exponent` - The public exponent.
    /// * `private` - The private parameters, if the file should hold a key pair.
    pub fn from_parameters(
        modulus: Vec<u8>,
        exponent: Vec<u8>,
        private: Option<PrivateParts>,
    ) -> Result<Self> {
        let key = match private {
            Some(private) => KeyBlob::with_private(modulus, exponent, private)?,
            None => KeyBlob::new(modulus, exponent)?,
        };
        Ok(Self { key })
    }

    pub fn from_rsa_private_key(key: &RsaPrivateKey) -> Result<Self> {
        Ok(Self {
            key: KeyBlob::try_from(key)?,
        })
    }

    pub fn from_rsa_public_key(key: &RsaPublicKey) -> Result<Self> {
        Ok(Self {
            key: KeyBlob::try_from(key)?,
        })
    }

    /// Parses the contents of an SNK file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let blob = match bytes.first() {
            Some(&b) if b == BlobType::PrivateKey as u8 || b == BlobType::PublicKey as u8 => bytes,
            None => bytes,
            Some(_) => strip_public_key_header(bytes)?,
        };
        Ok(Self {
            key: KeyBlob::decode(blob)?,
        })
    }

    /// Reads an SNK file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = Zeroizing::new(std::fs::read(path)?);
        tracing::debug!(path = %path.display(), len = bytes.len(), "Loading SNK file");
        Self::from_bytes(&bytes)
    }

    pub fn has_private_key(&self) -> bool {
        self.key.has_private_key()
    }

    pub fn key_blob(&self) -> &KeyBlob {
        &self.key
    }

    /// A copy of the modulus and exponent only.
    pub fn public_key_only(&self) -> KeyBlob {
        self.key.public_key_only()
    }

    pub fn public_key(&self) -> Result<RsaPublicKey> {
        self.key.to_rsa_public_key()
    }

    /// Fails with [`KeyFileError::PrivateKeyUnavailable`] for public-only files.
    pub fn private_key(&self) -> Result<RsaPrivateKey> {
        self.key.to_rsa_private_key()
    }

    /// Encodes the file, with the public-key header when `include_private` is false.
    pub fn to_bytes(&self, include_private: bool) -> Result<Zeroizing<Vec<u8>>> {
        let blob = self.key.encode_with(AlgorithmId::RsaSignature, include_private)?;
        if include_private {
            return Ok(blob);
        }
        let mut out = Zeroizing::new(Vec::with_capacity(PUBLIC_KEY_HEADER_LEN + blob.len()));
        out.extend_from_slice(&(AlgorithmId::RsaSignature as u32).to_le_bytes());
        out.extend_from_slice(&CALG_SHA1.to_le_bytes());
        out.extend_from_slice(&(blob.len() as u32).to_le_bytes());
        out.extend_from_slice(&blob);
        Ok(out)
    }

    /// Writes the file to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>, include_private: bool) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(include_private)?;
        std::fs::write(path, &*bytes)?;
        tracing::debug!(
            path = %path.display(),
            include_private,
            bit_length = self.key.bit_length(),
            "Saved SNK file"
        );
        Ok(())
    }
}

impl From<KeyBlob> for SnkFile {
    fn from(key: KeyBlob) -> Self {
        Self::from_key_blob(key)
    }
}

fn strip_public_key_header(bytes: &[u8]) -> Result<&[u8]> {
    let mut reader = FieldReader::new(bytes);
    let sig_alg = reader.read_u32("signature algorithm")?;
    if sig_alg != AlgorithmId::RsaSignature as u32 {
        return Err(KeyFileError::InvalidFormat(format!(
            "Not an SNK file (leading word {sig_alg:#010x})"
        )));
    }
    let hash_alg = reader.read_u32("hash algorithm")?;
    let declared = reader.read_u32("public key size")?;
    if declared as usize != reader.remaining() {
        tracing::warn!(
            declared,
            actual = reader.remaining(),
            "SNK public key size does not match the file"
        );
    }
    tracing::debug!(hash_alg, "Stripped SNK public key header");
    Ok(&bytes[PUBLIC_KEY_HEADER_LEN..])
}
