//! Scoped buffers for key-derivation scratch data.
//!
//! A [`Scratch`] buffer is zeroed when it goes out of scope, whichever way
//! the scope is left. After zeroing, the guard reports the (now zeroed)
//! contents to a [`ReleaseObserver`], which lets tests check that nothing
//! recoverable is left behind.

use core::fmt;
use core::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// Receives every scratch buffer after it has been wiped.
pub trait ReleaseObserver {
    /// Called once per buffer, after zeroing and before deallocation.
    fn released(&self, label: &'static str, contents: &[u8]);
}

/// Observer that ignores releases.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ReleaseObserver for Discard {
    fn released(&self, _label: &'static str, _contents: &[u8]) {}
}

pub(crate) static DISCARD: Discard = Discard;

/// A heap buffer holding secret bytes, wiped on drop.
pub struct Scratch<'o> {
    label: &'static str,
    buf: Vec<u8>,
    observer: &'o dyn ReleaseObserver,
}

impl<'o> Scratch<'o> {
    /// Takes ownership of `buf`.
    pub(crate) fn new(
        label: &'static str,
        buf: Vec<u8>,
        observer: &'o dyn ReleaseObserver,
    ) -> Self {
        Self {
            label,
            buf,
            observer,
        }
    }

    /// A zero-filled buffer of `len` bytes.
    pub(crate) fn zeroed(
        label: &'static str,
        len: usize,
        observer: &'o dyn ReleaseObserver,
    ) -> Self {
        Self::new(label, vec![0u8; len], observer)
    }
}

impl Deref for Scratch<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for Scratch<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        // Wipe the slice rather than the Vec so the length survives for the observer.
        self.buf.as_mut_slice().zeroize();
        self.observer.released(self.label, &self.buf);
    }
}

impl fmt::Debug for Scratch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scratch")
            .field("label", &self.label)
            .field("len", &self.buf.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<(&'static str, Vec<u8>)>>);

    impl ReleaseObserver for Recorder {
        fn released(&self, label: &'static str, contents: &[u8]) {
            self.0.borrow_mut().push((label, contents.to_vec()));
        }
    }

    #[test]
    fn test_scratch_is_wiped_on_drop() {
        let recorder = Recorder::default();
        {
            let mut scratch = Scratch::new("key", vec![1, 2, 3], &recorder);
            scratch[0] = 9;
            assert_eq!(&scratch[..], &[9, 2, 3]);
        }
        assert_eq!(*recorder.0.borrow(), vec![("key", vec![0u8, 0, 0])]);
    }

    #[test]
    fn test_scratch_is_wiped_on_early_return() {
        fn fails(observer: &dyn ReleaseObserver) -> Result<(), ()> {
            let _scratch = Scratch::new("digest", vec![0xFF; 4], observer);
            Err(())
        }

        let recorder = Recorder::default();
        assert!(fails(&recorder).is_err());
        let released = recorder.0.borrow();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].1, vec![0; 4]);
    }
}
