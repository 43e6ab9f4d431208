use std::path::PathBuf;

use keyblob::KeyBlob;
use rand_core::OsRng;
use rsa::RsaPrivateKey;

pub fn generate_rsa_key(bits: usize) -> RsaPrivateKey {
    RsaPrivateKey::new(&mut OsRng, bits).expect("Failed to generate RSA key")
}

pub fn generate_key_blob(bits: usize) -> KeyBlob {
    KeyBlob::try_from(&generate_rsa_key(bits)).expect("Failed to convert RSA key")
}

/// A path in the temp directory that no other test uses.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("keyblob-{}-{name}", std::process::id()))
}
