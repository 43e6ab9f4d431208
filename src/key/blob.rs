//! CryptoAPI `PUBLICKEYBLOB` / `PRIVATEKEYBLOB` codec.
//!
//! ```text
//! BLOBHEADER   bType:u8  bVersion:u8  reserved:u16  aiKeyAlg:u32
//! RSAPUBKEY    magic:u32 ("RSA1" | "RSA2")  bitlen:u32  pubexp:u32
//! modulus      bitlen/8 bytes
//! [private]    P, Q, DP, DQ, InverseQ: bitlen/16 bytes each; D: bitlen/8 bytes
//! ```
//!
//! Every integer is little-endian on disk and big-endian in [`KeyBlob`].

use zeroize::Zeroizing;

use super::{KeyBlob, PrivateParts};
use crate::Result;
use crate::byte_order::{
    FieldReader, from_little_endian, put_little_endian, trim_leading_zeros, trim_trailing_zeros,
};
use crate::error::KeyFileError;

/// Largest RSA key accepted by [`KeyBlob::decode`] and [`KeyBlob::new`].
pub const MAX_KEY_BITS: u32 = 16384;

/// Size of the BLOBHEADER, which PVK encryption leaves in the clear.
pub const BLOB_HEADER_LEN: usize = 8;

/// Size of the RSAPUBKEY that follows the BLOBHEADER.
pub const RSA_PUB_KEY_LEN: usize = 12;

/// `RSAPUBKEY.magic` of a private key blob, as it appears on disk.
pub const RSA2_MAGIC: [u8; 4] = *b"RSA2";

const RSA1: u32 = 0x3141_5352;
const RSA2: u32 = 0x3241_5352;
const CUR_BLOB_VERSION: u8 = 0x02;

/// `BLOBHEADER.bType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlobType {
    PublicKey = 0x06,
    PrivateKey = 0x07,
}

impl BlobType {
    fn magic(self) -> u32 {
        match self {
            BlobType::PublicKey => RSA1,
            BlobType::PrivateKey => RSA2,
        }
    }
}

impl TryFrom<u8> for BlobType {
    type Error = KeyFileError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x06 => Ok(BlobType::PublicKey),
            0x07 => Ok(BlobType::PrivateKey),
            other => Err(KeyFileError::InvalidFormat(format!(
                "Unknown key blob type {other:#04x}"
            ))),
        }
    }
}

/// `BLOBHEADER.aiKeyAlg` values for RSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AlgorithmId {
    /// `CALG_RSA_SIGN`, the only algorithm strong-name keys use.
    RsaSignature = 0x0000_2400,
    /// `CALG_RSA_KEYX`, used by exchange keys in PVK files.
    RsaKeyExchange = 0x0000_A400,
}

impl KeyBlob {
    /// Decodes a signature key blob, as found in SNK files.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::decode_with(bytes, AlgorithmId::RsaSignature, MAX_KEY_BITS)
    }

    /// Decodes a key blob whose header must name `algorithm` and whose
    /// modulus is at most `max_key_bits` long.
    pub fn decode_with(bytes: &[u8], algorithm: AlgorithmId, max_key_bits: u32) -> Result<Self> {
        let mut reader = FieldReader::new(bytes);

        let blob_type = BlobType::try_from(reader.read_u8("blob type")?)?;
        reader.skip(3, "blob header")?;
        let alg_id = reader.read_u32("algorithm id")?;
        if alg_id != algorithm as u32 {
            return Err(KeyFileError::UnsupportedAlgorithm(alg_id));
        }
        let magic = reader.read_u32("RSA magic")?;
        if magic != blob_type.magic() {
            return Err(KeyFileError::InconsistentHeader {
                blob_type: blob_type as u8,
                magic,
            });
        }
        let bit_length = reader.read_u32("bit length")?;
        if bit_length == 0 || bit_length % 8 != 0 || bit_length > max_key_bits {
            return Err(KeyFileError::InvalidKeyLength(bit_length));
        }

        let exponent = from_little_endian(trim_trailing_zeros(reader.take(4, "exponent")?));
        let modulus_len = (bit_length / 8) as usize;
        let half_len = (bit_length / 16) as usize;
        let modulus = from_little_endian(reader.take(modulus_len, "modulus")?);

        let private = match blob_type {
            BlobType::PublicKey => None,
            BlobType::PrivateKey => Some(PrivateParts {
                p: from_little_endian(reader.take(half_len, "P")?),
                q: from_little_endian(reader.take(half_len, "Q")?),
                dp: from_little_endian(reader.take(half_len, "DP")?),
                dq: from_little_endian(reader.take(half_len, "DQ")?),
                inverse_q: from_little_endian(reader.take(half_len, "InverseQ")?),
                d: from_little_endian(reader.take(modulus_len, "D")?),
            }),
        };

        tracing::debug!(
            ?blob_type,
            bit_length,
            trailing = reader.remaining(),
            "Decoded RSA key blob"
        );
        Ok(KeyBlob::from_parts(modulus, exponent, private))
    }

    /// Encodes the key as an `RSA_SIGN` blob.
    pub fn encode(&self, include_private: bool) -> Result<Zeroizing<Vec<u8>>> {
        self.encode_with(AlgorithmId::RsaSignature, include_private)
    }

    /// Encodes the key with the given algorithm id in its header.
    ///
    /// Writes a `PRIVATEKEYBLOB` when `include_private` is set, a
    /// `PUBLICKEYBLOB` otherwise.
    pub fn encode_with(
        &self,
        algorithm: AlgorithmId,
        include_private: bool,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let private = match (include_private, self.private_parts()) {
            (true, None) => return Err(KeyFileError::PrivateKeyUnavailable),
            (true, Some(private)) => Some(private),
            (false, _) => None,
        };
        let exponent = trim_leading_zeros(self.exponent());
        if exponent.len() > 4 {
            return Err(KeyFileError::ExponentTooLarge(exponent.len()));
        }
        let blob_type = if private.is_some() {
            BlobType::PrivateKey
        } else {
            BlobType::PublicKey
        };

        let mut out = Zeroizing::new(Vec::with_capacity(self.encoded_len(private.is_some())));
        out.extend_from_slice(&[blob_type as u8, CUR_BLOB_VERSION, 0, 0]);
        out.extend_from_slice(&(algorithm as u32).to_le_bytes());
        out.extend_from_slice(&blob_type.magic().to_le_bytes());
        out.extend_from_slice(&self.bit_length().to_le_bytes());

        let mut exponent_field = [0u8; 4];
        exponent_field[4 - exponent.len()..].copy_from_slice(exponent);
        put_little_endian(&mut out, &exponent_field);
        put_little_endian(&mut out, self.modulus());

        if let Some(private) = private {
            for field in [
                &private.p,
                &private.q,
                &private.dp,
                &private.dq,
                &private.inverse_q,
                &private.d,
            ] {
                put_little_endian(&mut out, field);
            }
        }
        Ok(out)
    }

    /// Size of the encoded blob in bytes.
    pub fn encoded_len(&self, include_private: bool) -> usize {
        let modulus_len = self.modulus().len();
        let mut len = BLOB_HEADER_LEN + RSA_PUB_KEY_LEN + modulus_len;
        if include_private {
            len += 5 * (modulus_len / 2) + modulus_len;
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::tests::toy_key;
    use hex_literal::hex;

    const PUBLIC_BLOB: [u8; 24] = hex!(
        "06 02 0000 00240000"
        "52534131 20000000 01000100"
        "01020304"
    );

    fn private_blob() -> Vec<u8> {
        let mut blob = hex!(
            "07 02 0000 00240000"
            "52534132 20000000 03000000"
            "01020304"
        )
        .to_vec();
        blob.extend_from_slice(&[0x11, 0x12]); // P
        blob.extend_from_slice(&[0x21, 0x22]); // Q
        blob.extend_from_slice(&[0x31, 0x32]); // DP
        blob.extend_from_slice(&[0x41, 0x42]); // DQ
        blob.extend_from_slice(&[0x51, 0x52]); // InverseQ
        blob.extend_from_slice(&[0x61, 0x62, 0x63, 0x64]); // D
        blob
    }

    #[test]
    fn test_decode_reverses_modulus() {
        let key = KeyBlob::decode(&PUBLIC_BLOB).unwrap();
        assert_eq!(key.modulus(), &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(key.exponent(), &[0x01, 0x00, 0x01]);
        assert_eq!(key.bit_length(), 32);
        assert!(!key.has_private_key());

        let encoded = key.encode(false).unwrap();
        assert_eq!(encoded.as_slice(), &PUBLIC_BLOB);
    }

    #[test]
    fn test_decode_private_fields() {
        let blob = private_blob();
        let key = KeyBlob::decode(&blob).unwrap();
        assert_eq!(key.exponent(), &[0x03]);

        let private = key.private_parts().unwrap();
        assert_eq!(private.p, vec![0x12, 0x11]);
        assert_eq!(private.q, vec![0x22, 0x21]);
        assert_eq!(private.dp, vec![0x32, 0x31]);
        assert_eq!(private.dq, vec![0x42, 0x41]);
        assert_eq!(private.inverse_q, vec![0x52, 0x51]);
        assert_eq!(private.d, vec![0x64, 0x63, 0x62, 0x61]);

        assert_eq!(key.encode(true).unwrap().as_slice(), blob.as_slice());
        assert_eq!(key.encoded_len(true), blob.len());
    }

    #[test]
    fn test_public_encoding_of_private_key() {
        let key = KeyBlob::decode(&private_blob()).unwrap();
        let public = KeyBlob::decode(&key.encode(false).unwrap()).unwrap();
        assert_eq!(public, key.public_key_only());
    }

    #[test]
    fn test_decode_rejects_unknown_blob_type() {
        let mut blob = PUBLIC_BLOB;
        blob[0] = 0x08;
        assert!(matches!(
            KeyBlob::decode(&blob),
            Err(KeyFileError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_decode_rejects_other_algorithms() {
        let mut blob = PUBLIC_BLOB;
        blob[5] = 0xA4;
        assert_eq!(
            KeyBlob::decode(&blob),
            Err(KeyFileError::UnsupportedAlgorithm(0xA400))
        );
        let key = KeyBlob::decode_with(&blob, AlgorithmId::RsaKeyExchange, MAX_KEY_BITS).unwrap();
        assert_eq!(key.bit_length(), 32);
    }

    #[test]
    fn test_decode_rejects_mismatched_magic() {
        let mut blob = PUBLIC_BLOB;
        blob[11] = b'2';
        assert_eq!(
            KeyBlob::decode(&blob),
            Err(KeyFileError::InconsistentHeader {
                blob_type: 0x06,
                magic: RSA2
            })
        );
    }

    #[test]
    fn test_decode_rejects_bad_bit_lengths() {
        for (bits, limit) in [(31u32, MAX_KEY_BITS), (0, MAX_KEY_BITS), (32, 24)] {
            let mut blob = PUBLIC_BLOB;
            blob[12..16].copy_from_slice(&bits.to_le_bytes());
            assert_eq!(
                KeyBlob::decode_with(&blob, AlgorithmId::RsaSignature, limit),
                Err(KeyFileError::InvalidKeyLength(bits))
            );
        }
    }

    #[test]
    fn test_decode_reports_truncated_field() {
        let blob = private_blob();
        let err = KeyBlob::decode(&blob[..blob.len() - 1]).unwrap_err();
        assert_eq!(
            err,
            KeyFileError::UnexpectedEndOfFile {
                field: "D",
                expected: 4,
                available: 3
            }
        );

        let err = KeyBlob::decode(&PUBLIC_BLOB[..22]).unwrap_err();
        assert!(matches!(
            err,
            KeyFileError::UnexpectedEndOfFile { field: "modulus", .. }
        ));
    }

    #[test]
    fn test_encode_rejects_large_exponent() {
        let key = KeyBlob::new(vec![0xC3; 8], vec![0x01, 0x00, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(key.encode(false), Err(KeyFileError::ExponentTooLarge(5)));

        // Leading zeros do not count towards the limit.
        let key = KeyBlob::new(vec![0xC3; 8], vec![0, 0, 0, 0, 0x01, 0x00, 0x01]).unwrap();
        assert!(key.encode(false).is_ok());
    }

    #[test]
    fn test_oversized_modulus_is_rejected() {
        let max_len = MAX_KEY_BITS as usize / 8;
        assert_eq!(
            KeyBlob::new(vec![0xC3; 2100], vec![1, 0, 1]),
            Err(KeyFileError::InvalidKeyLength(16800))
        );
        assert_eq!(
            KeyBlob::new(vec![0xC3; max_len + 1], vec![3]),
            Err(KeyFileError::InvalidKeyLength(MAX_KEY_BITS + 8))
        );

        // The largest accepted modulus still decodes after encoding.
        let key = KeyBlob::new(vec![0xC3; max_len], vec![1, 0, 1]).unwrap();
        assert_eq!(key.bit_length(), MAX_KEY_BITS);
        let encoded = key.encode(false).unwrap();
        assert_eq!(KeyBlob::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn test_encode_private_requires_private_key() {
        let key = KeyBlob::decode(&PUBLIC_BLOB).unwrap();
        assert_eq!(key.encode(true), Err(KeyFileError::PrivateKeyUnavailable));
    }

    #[test]
    fn test_zero_exponent_survives_round_trip() {
        let key = KeyBlob::new(vec![0xC3; 4], vec![0]).unwrap();
        let encoded = key.encode(false).unwrap();
        assert_eq!(&encoded[16..20], &[0, 0, 0, 0]);
        assert_eq!(KeyBlob::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn test_toy_key_round_trip() {
        let key = toy_key();
        let encoded = key.encode_with(AlgorithmId::RsaKeyExchange, true).unwrap();
        assert_eq!(&encoded[8..12], &RSA2_MAGIC);
        let decoded =
            KeyBlob::decode_with(&encoded, AlgorithmId::RsaKeyExchange, MAX_KEY_BITS).unwrap();
        assert_eq!(decoded, key);
    }
}
