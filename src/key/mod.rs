//! RSA key material as stored in CryptoAPI key blobs.
//!
//! All integers in this module are big-endian. The little-endian on-disk
//! layout is handled by [`blob`].

pub mod blob;

use core::fmt;

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub use blob::{AlgorithmId, BlobType, MAX_KEY_BITS};

use crate::Result;
use crate::byte_order::{left_pad, trim_leading_zeros};
use crate::error::KeyFileError;

/// The private half of an RSA key in CryptoAPI order.
///
/// `p`, `q`, `dp`, `dq` and `inverse_q` are half the modulus width;
/// `d` is the full modulus width.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateParts {
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub dp: Vec<u8>,
    pub dq: Vec<u8>,
    pub inverse_q: Vec<u8>,
    pub d: Vec<u8>,
}

impl fmt::Debug for PrivateParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateParts").finish_non_exhaustive()
    }
}

/// An RSA public key, optionally with its private parameters.
///
/// The buffers are owned exclusively and wiped when the blob is dropped.
/// Public accessors hand out borrows; [`KeyBlob::public_key_only`] makes an
/// independent copy without the private half.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyBlob {
    modulus: Vec<u8>,
    exponent: Vec<u8>,
    private: Option<PrivateParts>,
}

impl KeyBlob {
    /// Creates a public-only key from a big-endian modulus and exponent.
    ///
    /// Leading zeros are trimmed from the exponent. A modulus longer than
    /// [`MAX_KEY_BITS`] is rejected with [`KeyFileError::InvalidKeyLength`].
    pub fn new(modulus: Vec<u8>, exponent: Vec<u8>) -> Result<Self> {
        if modulus.is_empty() {
            return Err(KeyFileError::InvalidInput(
                "The modulus must not be empty".to_string(),
            ));
        }
        let bits = modulus.len().saturating_mul(8);
        if bits > MAX_KEY_BITS as usize {
            return Err(KeyFileError::InvalidKeyLength(
                u32::try_from(bits).unwrap_or(u32::MAX),
            ));
        }
        if exponent.is_empty() {
            return Err(KeyFileError::InvalidInput(
                "The exponent must not be empty".to_string(),
            ));
        }
        let exponent = trim_leading_zeros(&exponent).to_vec();
        Ok(Self {
            modulus,
            exponent,
            private: None,
        })
    }

    /// Creates a key pair, checking every private field against the modulus width.
    pub fn with_private(
        modulus: Vec<u8>,
        exponent: Vec<u8>,
        private: PrivateParts,
    ) -> Result<Self> {
        let mut key = Self::new(modulus, exponent)?;
        let half = key.modulus.len() / 2;
        let fields: [(&str, &[u8], usize); 6] = [
            ("P", &private.p, half),
            ("Q", &private.q, half),
            ("DP", &private.dp, half),
            ("DQ", &private.dq, half),
            ("InverseQ", &private.inverse_q, half),
            ("D", &private.d, key.modulus.len()),
        ];
        for (name, value, expected) in fields {
            if value.len() != expected {
                return Err(KeyFileError::InvalidInput(format!(
                    "{name} is {} bytes long, expected {expected}",
                    value.len()
                )));
            }
        }
        key.private = Some(private);
        Ok(key)
    }

    /// Assembles a blob whose invariants were established by the caller.
    pub(crate) fn from_parts(
        modulus: Vec<u8>,
        exponent: Vec<u8>,
        private: Option<PrivateParts>,
    ) -> Self {
        Self {
            modulus,
            exponent,
            private,
        }
    }

    /// Big-endian modulus.
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Big-endian public exponent without leading zeros.
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    pub fn private_parts(&self) -> Option<&PrivateParts> {
        self.private.as_ref()
    }

    pub fn has_private_key(&self) -> bool {
        self.private.is_some()
    }

    /// Modulus size in bits as recorded in the RSAPUBKEY header.
    ///
    /// Never above [`MAX_KEY_BITS`].
    pub fn bit_length(&self) -> u32 {
        (self.modulus.len() * 8) as u32
    }

    /// Copies the modulus and exponent into a new public-only blob.
    pub fn public_key_only(&self) -> KeyBlob {
        Self::from_parts(self.modulus.clone(), self.exponent.clone(), None)
    }

    /// Builds an `rsa` public key.
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey> {
        let n = BigUint::from_bytes_be(&self.modulus);
        let e = BigUint::from_bytes_be(&self.exponent);
        Ok(RsaPublicKey::new_with_max_size(
            n,
            e,
            MAX_KEY_BITS as usize,
        )?)
    }

    /// Builds an `rsa` private key from the modulus, exponents and primes.
    pub fn to_rsa_private_key(&self) -> Result<RsaPrivateKey> {
        let private = self
            .private
            .as_ref()
            .ok_or(KeyFileError::PrivateKeyUnavailable)?;
        let key = RsaPrivateKey::from_components(
            BigUint::from_bytes_be(&self.modulus),
            BigUint::from_bytes_be(&self.exponent),
            BigUint::from_bytes_be(&private.d),
            vec![
                BigUint::from_bytes_be(&private.p),
                BigUint::from_bytes_be(&private.q),
            ],
        )?;
        Ok(key)
    }

    /// Imports a PKCS#1 `RSAPrivateKey` document.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_der(der)?;
        Self::try_from(&key)
    }

    /// Exports the key pair as a PKCS#1 `RSAPrivateKey` document.
    pub fn to_pkcs1_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let key = self.to_rsa_private_key()?;
        let document = key.to_pkcs1_der()?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }
}

impl TryFrom<&RsaPublicKey> for KeyBlob {
    type Error = KeyFileError;

    fn try_from(key: &RsaPublicKey) -> Result<Self> {
        KeyBlob::new(key.n().to_bytes_be(), key.e().to_bytes_be())
    }
}

impl TryFrom<&RsaPrivateKey> for KeyBlob {
    type Error = KeyFileError;

    /// Converts a two-prime key, padding every private field to its fixed width.
    fn try_from(key: &RsaPrivateKey) -> Result<Self> {
        let [p, q] = key.primes() else {
            return Err(KeyFileError::InvalidInput(
                "Only two-prime RSA keys can be stored in a key blob".to_string(),
            ));
        };
        let modulus = key.n().to_bytes_be();
        let half = modulus.len() / 2;
        let inverse_q = Zeroizing::new(key.crt_coefficient().ok_or_else(|| {
            KeyFileError::InvalidInput("Q has no inverse modulo P".to_string())
        })?);
        let one = BigUint::from(1u8);
        let dp = Zeroizing::new(key.d() % (p - &one));
        let dq = Zeroizing::new(key.d() % (q - &one));

        let pad = |name: &str, value: &BigUint, width: usize| {
            let bytes = Zeroizing::new(value.to_bytes_be());
            left_pad(&bytes, width).ok_or_else(|| {
                KeyFileError::InvalidInput(format!("{name} does not fit in {width} bytes"))
            })
        };

        let private = PrivateParts {
            p: pad("P", p, half)?,
            q: pad("Q", q, half)?,
            dp: pad("DP", &*dp, half)?,
            dq: pad("DQ", &*dq, half)?,
            inverse_q: pad("InverseQ", &*inverse_q, half)?,
            d: pad("D", key.d(), modulus.len())?,
        };
        KeyBlob::with_private(modulus, key.e().to_bytes_be(), private)
    }
}

impl fmt::Debug for KeyBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBlob")
            .field("bit_length", &self.bit_length())
            .field("exponent", &self.exponent)
            .field("has_private_key", &self.has_private_key())
            .finish_non_exhaustive()
    }
}
