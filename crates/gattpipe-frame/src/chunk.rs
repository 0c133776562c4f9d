//! Splitting encoded frames into link-sized fragments.

use std::iter::FusedIterator;
use std::num::NonZeroUsize;
use std::slice;

/// Per-write overhead of an ATT write/notify (opcode + handle).
pub const ATT_WRITE_OVERHEAD: usize = 3;

/// Fragment size used when the link reports an unusable budget: the minimum
/// ATT MTU (23) minus [`ATT_WRITE_OVERHEAD`].
pub const DEFAULT_FRAGMENT_SIZE: NonZeroUsize = match NonZeroUsize::new(20) {
    Some(size) => size,
    None => panic!("default fragment size must be non-zero"),
};

/// Lazy left-to-right split of a byte slice into fragments.
///
/// Every fragment but the last is exactly `max_fragment_size` bytes. Cloning
/// restarts the sequence from the current position.
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    inner: slice::Chunks<'a, u8>,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Fragments<'_> {}

impl FusedIterator for Fragments<'_> {}

/// Split `bytes` into the minimal ordered sequence of fragments no larger
/// than `max_fragment_size`.
pub fn chunk(bytes: &[u8], max_fragment_size: NonZeroUsize) -> Fragments<'_> {
    Fragments {
        inner: bytes.chunks(max_fragment_size.get()),
    }
}

/// Number of fragments [`chunk`] produces for `len` bytes.
pub fn fragment_count(len: usize, max_fragment_size: NonZeroUsize) -> usize {
    len.div_ceil(max_fragment_size.get())
}

/// Usable fragment size for a link reporting `reported` bytes per operation.
///
/// Subtracts the fixed per-write `overhead`; a report at or below the
/// overhead falls back to `fallback`.
pub fn fragment_budget(reported: usize, overhead: usize, fallback: NonZeroUsize) -> NonZeroUsize {
    reported
        .checked_sub(overhead)
        .and_then(NonZeroUsize::new)
        .unwrap_or(fallback)
}
