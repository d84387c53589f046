//! Pure cursor arithmetic for the ring protocol.
//!
//! Everything here works on plain `u32` offsets into the body and never
//! touches a file or a mapping; [`Queue`](crate::Queue) is the thin layer
//! that reads and writes bytes at the offsets this module computes. Keeping
//! the two apart means the boundary cases (wrap exactly at `bodyLen`, a
//! writer lapping an unread region) are unit-testable without a real
//! backing file.

use crate::error::{Error, Operation, Result};

/// Outcome of placing one frame during `Push`.
pub(crate) struct WriteOutcome {
    /// Offset at which the frame's length prefix must be written.
    pub frame_offset: u32,
    /// The write cursor after this frame.
    pub next_write_at: u32,
    /// The view size after this frame (grown, or clamped on wrap).
    pub view_size: u32,
    /// `Some(at)` if placing this frame overran the unread region; both the
    /// in-memory and header read cursors must jump to `at`.
    pub overran_to: Option<u32>,
}

/// Computes where the next frame of `frame_len` total bytes (prefix +
/// payload) should land, starting from `pos`/`view_size`, wrapping at most
/// once around the body.
///
/// `read_at` is the writer's view of the read cursor (the value most
/// recently seen in the header, or bumped in-memory by a prior overrun in
/// this same `Push` call).
pub(crate) fn advance_write(
    mut pos: u32,
    mut view_size: u32,
    read_at: u32,
    frame_len: u32,
    body_len: u32,
) -> Result<WriteOutcome> {
    loop {
        let will_write_to = pos
            .checked_add(frame_len)
            .ok_or_else(|| Error::internal(Operation::Push, "frame offset overflowed u32"))?;

        if will_write_to > body_len {
            if pos == 0 {
                return Err(Error::internal(
                    Operation::Push,
                    "packet does not fit in the body even after wrapping",
                ));
            }
            // Freeze the view at the old tail and retry from the front.
            view_size = pos;
            pos = 0;
            continue;
        }

        let overran_to = if read_at > pos && will_write_to > read_at {
            Some(will_write_to)
        } else {
            None
        };
        if will_write_to > view_size {
            view_size = will_write_to;
        }

        return Ok(WriteOutcome {
            frame_offset: pos,
            next_write_at: will_write_to,
            view_size,
            overran_to,
        });
    }
}

/// Whether a `Pop` call starting at `read_at` must treat the reader as
/// having fallen behind the writer (so it reads forward even though
/// `read_at >= next_write_at`, which normally means "nothing to read").
///
/// The degenerate case `read_at == next_write_at == view_size` is a truly
/// empty queue, not a lapped one, and must not set `fallBehind`.
pub(crate) fn is_fall_behind(read_at: u32, next_write_at: u32, view_size: u32) -> bool {
    read_at >= next_write_at && !(read_at == next_write_at && next_write_at == view_size)
}

/// Read-side cursor carried across `Pop` calls. `view_size` only matters
/// while `fall_behind` is set: it is the frozen tail boundary the reader is
/// still draining from before it can jump to the writer's fresh data, and
/// the caller (`Queue::pop`) refreshes it from the header every time
/// `fall_behind` is (re)computed true. While caught up (`fall_behind ==
/// false`), `next_write_at` alone bounds how far the reader may advance, so
/// a stale `view_size` left over from an earlier lap cannot cut a read
/// short.
pub(crate) struct ReadCursor {
    pub pos: u32,
    pub view_size: u32,
    pub fall_behind: bool,
}

impl ReadCursor {
    /// Returns the offset of the next frame to read, or `None` if the
    /// reader has caught up to `next_write_at`. Advances past an internal
    /// wrap point as needed; never advances past a real frame (callers must
    /// call [`ReadCursor::consume`] themselves once the frame is read).
    pub(crate) fn next_frame_offset(&mut self, next_write_at: u32) -> Option<u32> {
        loop {
            if !self.fall_behind {
                if self.pos >= next_write_at {
                    return None;
                }
                return Some(self.pos);
            }
            if self.pos >= self.view_size {
                self.pos = 0;
                self.fall_behind = false;
                self.view_size = next_write_at;
                continue;
            }
            return Some(self.pos);
        }
    }

    /// Advances past a frame of `frame_len` total bytes just read at the
    /// offset returned by [`ReadCursor::next_frame_offset`].
    pub(crate) fn consume(&mut self, frame_len: u32) {
        self.pos += frame_len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_fits_in_place() {
        let out = advance_write(0, 0, 0, 3, 1011).unwrap();
        assert_eq!(out.frame_offset, 0);
        assert_eq!(out.next_write_at, 3);
        assert_eq!(out.view_size, 3);
        assert!(out.overran_to.is_none());
    }

    #[test]
    fn frame_fits_exactly_at_body_edge() {
        // pos = 1008, a 3-byte frame reaches exactly 1011 == bodyLen: no wrap.
        let out = advance_write(1008, 1008, 0, 3, 1011).unwrap();
        assert_eq!(out.next_write_at, 1011);
        assert_eq!(out.view_size, 1011);
    }

    #[test]
    fn frame_wraps_past_body_edge() {
        // pos = 1009, a 3-byte frame would reach 1012 > bodyLen: wraps to 0.
        let out = advance_write(1009, 1009, 0, 3, 1011).unwrap();
        assert_eq!(out.frame_offset, 0);
        assert_eq!(out.next_write_at, 3);
        // The view freezes at the old tail (1009); it isn't shrunk by a
        // write that lands well inside it.
        assert_eq!(out.view_size, 1009);
    }

    #[test]
    fn write_past_unread_region_bumps_read_cursor() {
        // read_at = 2, frame lands at [2, 5): overruns the unread byte at 2..2? actually check with a clearer overlap.
        let out = advance_write(0, 5, 2, 5, 1011).unwrap();
        assert_eq!(out.overran_to, Some(5));
    }

    #[test]
    fn write_without_reaching_read_cursor_does_not_overrun() {
        let out = advance_write(0, 5, 10, 5, 1011).unwrap();
        assert!(out.overran_to.is_none());
    }

    #[test]
    fn fall_behind_excludes_truly_empty_queue() {
        assert!(!is_fall_behind(0, 0, 0));
        assert!(is_fall_behind(5, 5, 3));
        assert!(!is_fall_behind(3, 5, 3));
    }

    #[test]
    fn read_cursor_wraps_and_shrinks_view_to_write_cursor() {
        let mut cursor = ReadCursor {
            pos: 9,
            view_size: 9,
            fall_behind: false,
        };
        assert_eq!(cursor.next_frame_offset(9), None);

        cursor.pos = 9;
        cursor.view_size = 9;
        cursor.fall_behind = true;
        assert_eq!(cursor.next_frame_offset(4), Some(0));
        assert_eq!(cursor.view_size, 4);
    }
}
