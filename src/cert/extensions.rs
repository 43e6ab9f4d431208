use der::flagset::{FlagSet, flags};
use der::oid::ObjectIdentifier;
use time::OffsetDateTime;

use super::der::DerNode;
use super::params::ExtensionParam;
use crate::Result;

/// Trait for converting to X.509 extensions.
///
/// This trait provides the identity of an extension and the DER encoding of
/// its value.
///
/// # Example
/// ```
/// use keyblob::cert::extensions::{CrlNumber, ToX509Extension};
/// let number = CrlNumber(300);
/// assert_eq!(CrlNumber::OID.to_string(), "2.5.29.20");
/// assert_eq!(number.to_x509_extension_value().unwrap(), [0x02, 0x02, 0x01, 0x2C]);
/// ```
pub trait ToX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Human-readable name of the extension.
    const NAME: &'static str;

    /// Whether the extension is marked critical unless the caller says otherwise.
    const CRITICAL: bool;

    /// Builds the DER tree of the extension value.
    fn to_der_node(&self) -> Result<DerNode>;

    /// Encodes the extension value into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(self.to_der_node()?.encode())
    }
}

flags! {
    /// Key usage bits, numbered as in the first octet of the `KeyUsage` BIT STRING.
    pub enum KeyUsageFlags: u8 {
        DigitalSignature = 0x80,
        NonRepudiation = 0x40,
        KeyEncipherment = 0x20,
        DataEncipherment = 0x10,
        KeyAgreement = 0x08,
        KeyCertSign = 0x04,
        CrlSign = 0x02,
        EncipherOnly = 0x01,
    }
}

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyUsage(pub FlagSet<KeyUsageFlags>);

impl ToX509Extension for KeyUsage {
    const OID: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_KEY_USAGE;
    const NAME: &'static str = "Key Usage";
    const CRITICAL: bool = false;

    fn to_der_node(&self) -> Result<DerNode> {
        Ok(DerNode::BitString(vec![self.0.bits()]))
    }
}

impl From<FlagSet<KeyUsageFlags>> for KeyUsage {
    fn from(flags: FlagSet<KeyUsageFlags>) -> Self {
        Self(flags)
    }
}

impl From<KeyUsageFlags> for KeyUsage {
    fn from(flag: KeyUsageFlags) -> Self {
        Self(flag.into())
    }
}

/// Represents the Basic Constraints extension.
///
/// This extension indicates whether the certificate is a CA certificate and its path length.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `path_length` - The maximum number of intermediate CAs allowed. Only
///   written for CA certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub path_length: Option<u32>,
}

impl ToX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS;
    const NAME: &'static str = "Basic Constraints";
    const CRITICAL: bool = true;

    fn to_der_node(&self) -> Result<DerNode> {
        let mut fields = vec![DerNode::Boolean(self.is_ca)];
        if let (true, Some(path_length)) = (self.is_ca, self.path_length) {
            fields.push(DerNode::integer(path_length.into()));
        }
        Ok(DerNode::Sequence(fields))
    }
}

/// Represents the Invalidity Date CRL entry extension.
///
/// The time is written as a UTC `GeneralizedTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidityDate(pub OffsetDateTime);

impl ToX509Extension for InvalidityDate {
    const OID: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_INVALIDITY_DATE;
    const NAME: &'static str = "Invalidity Date";
    const CRITICAL: bool = false;

    fn to_der_node(&self) -> Result<DerNode> {
        DerNode::generalized_time(self.0)
    }
}

/// Represents the CRL Number extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrlNumber(pub u32);

impl ToX509Extension for CrlNumber {
    const OID: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_CRL_NUMBER;
    const NAME: &'static str = "CRL Number";
    const CRITICAL: bool = false;

    fn to_der_node(&self) -> Result<DerNode> {
        Ok(DerNode::integer(self.0.into()))
    }
}

/// Represents the Reason Code CRL entry extension.
///
/// The code is written as an `INTEGER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ReasonCode {
    #[default]
    Unspecified = 0,
    KeyCompromise = 1,
    CaCompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    RemoveFromCrl = 8,
}

impl ToX509Extension for ReasonCode {
    const OID: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_CRL_REASONS;
    const NAME: &'static str = "Reason Code";
    const CRITICAL: bool = false;

    fn to_der_node(&self) -> Result<DerNode> {
        Ok(DerNode::integer(*self as i64))
    }
}

/// One of the supported extensions, for callers that pick the kind at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    KeyUsage(KeyUsage),
    BasicConstraints(BasicConstraints),
    InvalidityDate(InvalidityDate),
    CrlNumber(CrlNumber),
    ReasonCode(ReasonCode),
}

impl ExtensionKind {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            ExtensionKind::KeyUsage(_) => KeyUsage::OID,
            ExtensionKind::BasicConstraints(_) => BasicConstraints::OID,
            ExtensionKind::InvalidityDate(_) => InvalidityDate::OID,
            ExtensionKind::CrlNumber(_) => CrlNumber::OID,
            ExtensionKind::ReasonCode(_) => ReasonCode::OID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtensionKind::KeyUsage(_) => KeyUsage::NAME,
            ExtensionKind::BasicConstraints(_) => BasicConstraints::NAME,
            ExtensionKind::InvalidityDate(_) => InvalidityDate::NAME,
            ExtensionKind::CrlNumber(_) => CrlNumber::NAME,
            ExtensionKind::ReasonCode(_) => ReasonCode::NAME,
        }
    }
}

/// Encodes `kind` with its default criticality.
///
/// # Example
/// ```
/// use keyblob::cert::extensions::{encode_extension, BasicConstraints, ExtensionKind};
/// let ext = encode_extension(&ExtensionKind::BasicConstraints(BasicConstraints {
///     is_ca: true,
///     path_length: Some(0),
/// }))
/// .unwrap();
/// assert!(ext.critical);
/// assert_eq!(ext.value, [0x30, 0x06, 0x01, 0x01, 0xFF, 0x02, 0x01, 0x00]);
/// ```
pub fn encode_extension(kind: &ExtensionKind) -> Result<ExtensionParam> {
    match kind {
        ExtensionKind::KeyUsage(ext) => ExtensionParam::with_default_criticality(ext),
        ExtensionKind::BasicConstraints(ext) => ExtensionParam::with_default_criticality(ext),
        ExtensionKind::InvalidityDate(ext) => ExtensionParam::with_default_criticality(ext),
        ExtensionKind::CrlNumber(ext) => ExtensionParam::with_default_criticality(ext),
        ExtensionKind::ReasonCode(ext) => ExtensionParam::with_default_criticality(ext),
    }
}
