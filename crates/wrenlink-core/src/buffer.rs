//! NUL-terminated module source buffers.

use std::fmt;

use crate::config::TerminatorPolicy;

/// Module source ready to hand to the VM's compiler.
///
/// Always ends in a NUL terminator and `len()` counts it, so a buffer is
/// never shorter than one byte. A module that was not found has no buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    bytes: Vec<u8>,
}

#[allow(clippy::len_without_is_empty)]
impl SourceBuffer {
    /// Copy `source` and append a terminator.
    pub fn from_source(source: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(source.len() + 1);
        bytes.extend_from_slice(source);
        bytes.push(0);
        SourceBuffer { bytes }
    }

    /// Terminate a retrieved payload according to `policy`.
    ///
    /// With [`TerminatorPolicy::OverwriteLast`] the buffer keeps the payload's
    /// length and its final byte becomes the terminator; an empty payload
    /// still yields a one-byte buffer.
    pub fn from_payload(mut payload: Vec<u8>, policy: TerminatorPolicy) -> Self {
        match policy {
            TerminatorPolicy::Append => payload.push(0),
            TerminatorPolicy::OverwriteLast => match payload.last_mut() {
                Some(last) => *last = 0,
                None => payload.push(0),
            },
        }
        SourceBuffer { bytes: payload }
    }

    /// Length in bytes, terminator included
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Source text without the terminator
    pub fn source(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    /// Source text and terminator
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    /// Source text as UTF-8, if it is
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(self.source()).ok()
    }

    /// Take the bytes, terminator included
    pub fn into_bytes_with_nul(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("len", &self.bytes.len())
            .field("source", &String::from_utf8_lossy(self.source()))
            .finish()
    }
}
