//! DER encoding for the X.509 extensions attached to code-signing
//! certificates and CRL entries.
//!
//! - [`der`]: the [`der::DerNode`] tree and its encoder
//! - [`extensions`]: Key Usage, Basic Constraints, Invalidity Date, CRL Number
//!   and Reason Code
//! - [`params`]: [`params::ExtensionParam`], an encoded extension ready to
//!   attach to a certificate

pub mod der;
pub mod extensions;
pub mod params;

pub use extensions::{ExtensionKind, ToX509Extension, encode_extension};
pub use params::ExtensionParam;
