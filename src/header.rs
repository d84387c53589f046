//! The fixed 13-byte header codec.
//!
//! All multi-byte fields are big-endian. [`HeaderView`] is a thin borrow
//! over the first [`HEADER_SIZE`] bytes of the mapping; every cursor field
//! is read and written through it so the endianness and offsets stay in
//! one place.

use std::convert::TryInto;

/// Size in bytes of the fixed header at the start of the mapping.
pub const HEADER_SIZE: usize = 13;

/// Largest payload (post length-prefix) a single packet may carry.
pub const MAX_PACKET_SIZE: usize = 16_384;

/// Largest number of packets a single `Pop` call may return.
pub const MAX_READ_PACKET_COUNT: usize = 1024;

/// Size in bytes of a length-prefix preceding each packet payload.
pub const FRAME_PREFIX_SIZE: usize = 2;

/// The only header layout version this implementation understands.
pub const VERSION: u8 = 1;

/// Borrowed view over the 13-byte header at the start of the mapping.
///
/// Field offsets (big-endian):
/// ```text
/// 0  : u8   version
/// 1  : u32  viewSize
/// 5  : u32  nextWriteAt
/// 9  : u32  nextReadAt
/// ```
pub(crate) struct HeaderView<'a> {
    bytes: &'a mut [u8],
}

impl<'a> HeaderView<'a> {
    /// Wraps the first [`HEADER_SIZE`] bytes of `bytes` as a header.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`HEADER_SIZE`].
    pub(crate) fn new(bytes: &'a mut [u8]) -> Self {
        assert!(bytes.len() >= HEADER_SIZE, "mapping too small for header");
        Self { bytes }
    }

    pub(crate) fn version(&self) -> u8 {
        self.bytes[0]
    }

    pub(crate) fn view_size(&self) -> u32 {
        read_u32(&self.bytes[1..5])
    }

    pub(crate) fn next_write_at(&self) -> u32 {
        read_u32(&self.bytes[5..9])
    }

    pub(crate) fn next_read_at(&self) -> u32 {
        read_u32(&self.bytes[9..13])
    }

    pub(crate) fn set_view_size(&mut self, v: u32) {
        write_u32(&mut self.bytes[1..5], v);
    }

    pub(crate) fn set_next_write_at(&mut self, v: u32) {
        write_u32(&mut self.bytes[5..9], v);
    }

    pub(crate) fn set_next_read_at(&mut self, v: u32) {
        write_u32(&mut self.bytes[9..13], v);
    }

    /// Unconditionally resets the header to a fresh, empty queue: version 1,
    /// all cursors and the view size at zero. This is what `Open` does by
    /// default (see the "reset on open" note in the crate docs); any prior
    /// packets become unreachable.
    pub(crate) fn reset(&mut self) {
        self.bytes[0] = VERSION;
        self.set_view_size(0);
        self.set_next_write_at(0);
        self.set_next_read_at(0);
    }
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes(b.try_into().unwrap())
}

fn write_u32(b: &mut [u8], v: u32) {
    b.copy_from_slice(&v.to_be_bytes());
}
