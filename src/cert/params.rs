use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::{Decode, Encode};
use x509_cert::ext::Extension;

use super::extensions::ToX509Extension;
use crate::Result;

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Creates an `ExtensionParam` marked with the extension's usual criticality.
    pub fn with_default_criticality<E: ToX509Extension>(extension: &E) -> Result<Self> {
        Self::from_extension(extension, E::CRITICAL)
    }

    /// Wraps the value in an `x509-cert` extension.
    pub fn to_x509_extension(&self) -> Result<Extension> {
        Ok(Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }

    /// Encodes the complete `Extension` SEQUENCE.
    ///
    /// A non-critical extension omits the `critical` field, as DER requires
    /// for default values.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_x509_extension()?.to_der()?)
    }

    /// Parses a complete `Extension` SEQUENCE.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let ext = Extension::from_der(bytes)?;
        Ok(Self::from(&ext))
    }
}

impl From<&Extension> for ExtensionParam {
    fn from(ext: &Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}
