//! RC4 keystream, as used by CryptoAPI to encrypt PVK payloads.
//!
//! RC4 is broken as a cipher. It is here only because legacy PVK files were
//! written with it.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyFileError;

/// RC4 state: the 256-byte permutation plus the two stream indices.
///
/// The permutation is key-equivalent material and is wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Runs the key-scheduling algorithm over `key`.
    pub fn new(key: &[u8]) -> Result<Self, KeyFileError> {
        if key.is_empty() {
            return Err(KeyFileError::InvalidKey);
        }
        let mut s = [0u8; 256];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256usize {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        Ok(Rc4 { s, i: 0, j: 0 })
    }

    /// XORs the next `data.len()` keystream bytes into `data`.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for b in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let idx = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *b ^= self.s[idx as usize];
        }
    }
}

/// Decrypts (or encrypts) `data` in place with a fresh keystream for `key`.
///
/// No state carries over between calls.
pub fn apply(key: &[u8], data: &mut [u8]) -> Result<(), KeyFileError> {
    Rc4::new(key)?.apply_keystream(data);
    Ok(())
}
