//! # keyblob - Legacy Windows Key Containers in Pure Rust
//!
//! keyblob reads and writes the RSA key containers used by Windows
//! code-signing tooling, built entirely with rustcrypto libraries:
//! PVK private-key files (optionally RC4-encrypted with a password) and SNK
//! strong-name key files. It also encodes the small set of X.509 extensions
//! those tools attach to certificates and CRL entries.
//!
//! ## Supported Formats
//!
//! - **PVK**: `0xB0B5F11E` header, salt, and a `PRIVATEKEYBLOB`, plain or
//!   encrypted with a 128-bit or 40-bit RC4 key derived from the password
//! - **SNK**: a bare `PRIVATEKEYBLOB`, or a `PUBLICKEYBLOB` with the
//!   strong-name public-key header
//! - **DER**: Key Usage, Basic Constraints, Invalidity Date, CRL Number and
//!   Reason Code extension values
//!
//! ## Key Features
//!
//! - **Bit-exact**: every container written by this crate loads back to the
//!   same bytes
//! - **Secret hygiene**: key material, passwords and derived keys are zeroed
//!   on every exit path
//! - **RSA interop**: conversion to and from the `rsa` crate's key types and
//!   PKCS#1 DER
//!
//! ## Quick Start
//!
//! ### Loading a Password-Protected PVK File
//!
//! ```rust,no_run
//! use keyblob::pvk::load_pvk;
//!
//! # fn main() -> Result<(), keyblob::error::KeyFileError> {
//! let key = load_pvk("signing.pvk", Some("hunter2"))?;
//! println!("Loaded a {}-bit key", key.bit_length());
//! let rsa_key = key.to_rsa_private_key()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Converting a PVK File to an SNK File
//!
//! ```rust,no_run
//! use keyblob::{pvk::PvkReader, snk::SnkFile};
//!
//! # fn main() -> Result<(), keyblob::error::KeyFileError> {
//! let key = PvkReader::default().load("signing.pvk", Some("hunter2"))?;
//! let snk = SnkFile::from_key_blob(key);
//!
//! // Key pair for signing, public key for the build
//! snk.save("signing.snk", true)?;
//! snk.save("signing.public.snk", false)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Writing an Encrypted PVK File
//!
//! ```rust
//! use keyblob::pvk::{PvkReader, PvkWriter};
//! use keyblob::snk::SnkFile;
//! use rsa::{BigUint, RsaPrivateKey};
//!
//! # fn main() -> Result<(), keyblob::error::KeyFileError> {
//! # let rsa_key = RsaPrivateKey::from_p_q(
//! #     BigUint::from(4_294_967_291u32),
//! #     BigUint::from(4_294_967_279u32),
//! #     BigUint::from(65_537u32),
//! # )?;
//! let key = SnkFile::from_rsa_private_key(&rsa_key)?.key_blob().clone();
//!
//! let writer = PvkWriter::builder().password("correct horse".to_string()).build();
//! let bytes = writer.encode(&key)?;
//!
//! let container = PvkReader::default().parse(&bytes, Some("correct horse"))?;
//! assert_eq!(container.key_blob()?, key);
//! # Ok(())
//! # }
//! ```
//!
//! ### Encoding Certificate Extensions
//!
//! ```rust
//! use keyblob::cert::extensions::{
//!     encode_extension, BasicConstraints, ExtensionKind, KeyUsage, KeyUsageFlags,
//! };
//!
//! # fn main() -> Result<(), keyblob::error::KeyFileError> {
//! let usage = KeyUsage(KeyUsageFlags::DigitalSignature | KeyUsageFlags::KeyCertSign);
//! let key_usage = encode_extension(&ExtensionKind::KeyUsage(usage))?;
//! assert_eq!(key_usage.oid.to_string(), "2.5.29.15");
//! assert_eq!(key_usage.value, [0x03, 0x02, 0x00, 0x84]);
//!
//! let ca = BasicConstraints { is_ca: true, path_length: Some(0) };
//! let basic_constraints = encode_extension(&ExtensionKind::BasicConstraints(ca))?;
//! assert!(basic_constraints.critical);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is reported as a [`error::KeyFileError`] naming what went
//! wrong:
//!
//! ```rust
//! use keyblob::{error::KeyFileError, pvk::PvkReader};
//!
//! match PvkReader::default().parse(b"not a pvk file", None) {
//!     Ok(_) => println!("Key parsed"),
//!     Err(KeyFileError::UnexpectedEndOfFile { field, .. }) => {
//!         println!("File truncated in {}", field)
//!     }
//!     Err(KeyFileError::DecryptionFailed) => println!("Wrong password"),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Logging
//!
//! Headers parsed and files read or written are reported through [`tracing`]
//! at debug level; the 40-bit export-key fallback is reported as a warning.
//! Key bytes and passwords are never logged.
//!
//! ## Module Organization
//!
//! - [`pvk`]: PVK reading, decryption and writing
//! - [`snk`]: SNK strong-name key files
//! - [`key`]: the RSA key model and the CryptoAPI key blob codec
//! - [`cert`]: DER encoding of certificate extensions
//! - [`byte_order`]: on-disk little-endian to big-endian conversion
//! - [`rc4`]: the RC4 keystream used by encrypted PVK files
//! - [`secret`]: scratch buffers that are zeroed when released
//! - [`error`]: error types

pub mod byte_order;
pub mod cert;
pub mod error;
pub mod key;
pub mod pvk;
pub mod rc4;
pub mod secret;
pub mod snk;

use crate::error::KeyFileError;
pub type Result<T> = std::result::Result<T, KeyFileError>;

pub use key::{KeyBlob, PrivateParts};
pub use pvk::{PvkReader, PvkWriter, load_pvk};
pub use snk::SnkFile;
