//! The memory-mapped, single-producer single-consumer packet queue.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::Path;
use std::slice;

use crate::error::{Error, Operation, Result};
use crate::header::{HeaderView, FRAME_PREFIX_SIZE, HEADER_SIZE, MAX_PACKET_SIZE};
use crate::os::{self, Flush};
use crate::pool::{Packets, ScratchPool};
use crate::ring::{self, ReadCursor};

/// How `Queue::open` should treat an existing backing file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
    /// Reinitialize the header to an empty queue, discarding whatever the
    /// file already held. This is what [`Queue::open`] does.
    Reset,
    /// Preserve the header as found, resuming from the cursors already on
    /// disk. Intended for a consumer or producer restarting against a file
    /// the other side is still using.
    Reopen,
}

/// A durable, memory-mapped, single-producer single-consumer byte-packet
/// queue.
///
/// Only one thread may call [`Queue::push`] and only one thread may call
/// [`Queue::pop`]; those two roles may run concurrently with each other
/// (see the crate docs), but `Queue` itself does not enforce that split —
/// callers on the same side must serialize their own calls.
pub struct Queue {
    file: File,
    ptr: *mut u8,
    map_len: usize,
    body_len: u32,

    // Write-side state, used only by `push`, persisted to the header at the
    // end of every call. `pop` must not read these: a consumer is commonly
    // a separate `Queue` handle on the same file, and these only reflect
    // this handle's own writes.
    next_write_at: u32,
    write_view_size: u32,

    // Read-side state. `read_cursor.pos` is the uncommitted cursor described
    // in the crate docs: it is only written to the header at the *start* of
    // the next `Pop` call. `read_cursor.view_size` is never persisted; it
    // only matters while the reader has fallen behind, and `pop` refreshes
    // it from the header's committed view every time that's detected, so it
    // never goes stale between calls or across a resumed `Reopen`.
    read_cursor: ReadCursor,

    pool: ScratchPool,

    unmapped: bool,
}

// SAFETY: `Queue` owns its mapping exclusively (no other `Queue` maps the
// same region) and all access to the mapped bytes goes through `&mut self`
// methods, so moving it to another thread and continuing to use it there is
// sound. It is not `Sync`: the single-producer-single-consumer protocol
// requires that `push` and `pop` each be called from a single, consistent
// thread at a time, but that thread may change between calls.
unsafe impl Send for Queue {}

impl Queue {
    /// Opens `path`, creating and zero-filling a new `size_kib`-kilobyte
    /// backing file if one does not already exist, and resets the header to
    /// an empty queue.
    pub fn open<P: AsRef<Path>>(path: P, size_kib: u32) -> Result<Self> {
        Self::open_with_mode(path, size_kib, OpenMode::Reset)
    }

    /// Like [`Queue::open`], but lets the caller choose whether the header
    /// is reset or preserved.
    pub fn open_with_mode<P: AsRef<Path>>(path: P, size_kib: u32, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let total_len = u64::from(size_kib) * 1024;

        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                create_zeroed(path, total_len)?;
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(|err| Error::io(Operation::Open, err))?
            }
            Err(err) => return Err(Error::io(Operation::Open, err)),
        };

        let file_len = file
            .metadata()
            .map_err(|err| Error::io(Operation::Open, err))?
            .len();
        if file_len < HEADER_SIZE as u64 {
            return Err(Error::internal(
                Operation::Open,
                "backing file is smaller than the header",
            ));
        }

        let map_len = file_len as usize;
        let body_len = (map_len - HEADER_SIZE) as u32;

        log::info!(
            "opening dqueue at {} ({} body bytes, mode {:?})",
            path.display(),
            body_len,
            mode
        );

        let ptr =
            unsafe { os::map_file(&file, map_len) }.map_err(|err| Error::io(Operation::Map, err))?;

        let mut queue = Self {
            file,
            ptr,
            map_len,
            body_len,
            next_write_at: 0,
            write_view_size: 0,
            read_cursor: ReadCursor {
                pos: 0,
                view_size: 0,
                fall_behind: false,
            },
            pool: ScratchPool::new(),
            unmapped: false,
        };

        if mode == OpenMode::Reset {
            queue.header().reset();
        }

        let header = queue.header();
        let next_write_at = header.next_write_at();
        let next_read_at = header.next_read_at();
        let view_size = header.view_size();
        drop(header);

        if next_write_at > queue.body_len {
            return Err(Error::internal(
                Operation::Open,
                "nextWriteAt in the header exceeds the body length",
            ));
        }

        queue.next_write_at = next_write_at;
        queue.write_view_size = view_size;
        queue.read_cursor.pos = next_read_at;
        // Also seeded here for a resumed reader that is already behind at
        // open time; `pop` keeps it current from then on.
        queue.read_cursor.view_size = view_size;

        Ok(queue)
    }

    /// Number of body bytes available to packets (total mapping size minus
    /// the 13-byte header).
    pub fn capacity(&self) -> u32 {
        self.body_len
    }

    /// Appends `payloads` to the queue in order.
    ///
    /// If placing a packet would lap the unread region, both the producer's
    /// in-memory read cursor and the header's committed read cursor jump
    /// forward past it: the oldest unread packets are dropped to make room.
    ///
    /// Returns [`Error::packet_too_large`] if any payload exceeds
    /// `MAX_PACKET_SIZE`, without writing any of `payloads`.
    pub fn push<'a, I>(&mut self, payloads: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        // Validated as a whole batch up front: once the first frame is
        // written below, there is no clean way to undo it, so a single
        // oversized payload must not leave the earlier ones in the batch
        // half-applied.
        if self.next_write_at > self.body_len {
            return Err(Error::internal(
                Operation::Push,
                "nextWriteAt exceeds bodyLen",
            ));
        }

        let payloads: Vec<&[u8]> = payloads.into_iter().collect();
        for payload in &payloads {
            if payload.len() > MAX_PACKET_SIZE {
                return Err(Error::packet_too_large(Operation::Push, payload.len()));
            }
        }

        for payload in payloads {
            let frame_len = (FRAME_PREFIX_SIZE + payload.len()) as u32;
            let outcome = ring::advance_write(
                self.next_write_at,
                self.write_view_size,
                self.read_cursor.pos,
                frame_len,
                self.body_len,
            )?;

            self.write_frame(outcome.frame_offset, payload);

            if let Some(at) = outcome.overran_to {
                self.read_cursor.pos = at;
                self.header().set_next_read_at(at);
            }

            self.next_write_at = outcome.next_write_at;
            self.write_view_size = outcome.view_size;
        }

        let mut header = self.header();
        header.set_next_write_at(self.next_write_at);
        header.set_view_size(self.write_view_size);
        Ok(())
    }

    /// Returns up to `MAX_READ_PACKET_COUNT` packets in FIFO order.
    ///
    /// The read cursor reported in the header lags one call behind: the
    /// position committed here is the one this call *started* at, so a
    /// packet is only irrecoverably dropped once the producer has
    /// overwritten it, not merely once it has been returned from `pop`.
    pub fn pop(&mut self) -> Result<Packets<'_>> {
        self.pool.begin();

        let start_pos = self.read_cursor.pos;
        let mut header = self.header();
        header.set_next_read_at(start_pos);
        // Snapshot the writer's cursor from the header, not from
        // `self.next_write_at`/`self.write_view_size`: those only reflect
        // this handle's own `push` calls, but the producer is commonly a
        // separate `Queue` handle mapping the same file.
        let next_write_at = header.next_write_at();
        let view_size = header.view_size();
        drop(header);

        self.read_cursor.fall_behind = ring::is_fall_behind(start_pos, next_write_at, view_size);
        if self.read_cursor.fall_behind {
            // The reader is draining a frozen tail from before the writer's
            // most recent wrap; `view_size` must be the real boundary of
            // that tail, not whatever this cursor last saw, so it is
            // refreshed from the header every time this is detected rather
            // than only once at `open`.
            self.read_cursor.view_size = view_size;
        }

        while !self.pool.is_full() {
            let offset = match self.read_cursor.next_frame_offset(next_write_at) {
                Some(offset) => offset,
                None => break,
            };

            let len = self.read_u16(offset) as usize;
            if len > MAX_PACKET_SIZE {
                return Err(Error::packet_too_large(Operation::Pop, len));
            }

            let payload_at = offset as usize + FRAME_PREFIX_SIZE;
            let payload = unsafe { slice::from_raw_parts(self.ptr.add(HEADER_SIZE + payload_at), len) };
            self.pool.push(payload);

            self.read_cursor.consume((FRAME_PREFIX_SIZE + len) as u32);
        }

        Ok(self.pool.packets())
    }

    /// Requests that dirty pages be written back to the backing file.
    ///
    /// Neither `push` nor `pop` flush implicitly; call this explicitly at
    /// whatever cadence suits the caller's durability needs.
    pub fn flush(&self, mode: Flush) -> Result<()> {
        unsafe { os::flush(self.ptr, &self.file, self.map_len, mode) }
            .map_err(|err| Error::io(Operation::Flush, err))
    }

    /// Unmaps the backing region and closes the file descriptor.
    ///
    /// Both steps are attempted; the unmap error, if any, is returned. The
    /// file descriptor close itself is delegated to `File`'s own `Drop`
    /// (std has no safe, portable way to observe its error), so only an
    /// unmap failure is reported here.
    pub fn close(mut self) -> Result<()> {
        let result = self.unmap_now();
        self.unmapped = true;
        result
    }

    fn unmap_now(&mut self) -> Result<()> {
        unsafe { os::unmap(self.ptr, self.map_len) }.map_err(|err| Error::io(Operation::Close, err))
    }

    fn header(&self) -> HeaderView<'_> {
        // SAFETY: the mapping is at least HEADER_SIZE bytes (checked in
        // open_with_mode) and lives as long as `self`.
        let bytes = unsafe { slice::from_raw_parts_mut(self.ptr, HEADER_SIZE) };
        HeaderView::new(bytes)
    }

    fn body_mut(&self) -> &mut [u8] {
        // SAFETY: body_len was computed from the mapping's actual length.
        unsafe { slice::from_raw_parts_mut(self.ptr.add(HEADER_SIZE), self.body_len as usize) }
    }

    fn write_frame(&self, offset: u32, payload: &[u8]) {
        let offset = offset as usize;
        let body = self.body_mut();
        body[offset..offset + FRAME_PREFIX_SIZE].copy_from_slice(&(payload.len() as u16).to_be_bytes());
        body[offset + FRAME_PREFIX_SIZE..offset + FRAME_PREFIX_SIZE + payload.len()]
            .copy_from_slice(payload);
    }

    fn read_u16(&self, offset: u32) -> u16 {
        let offset = offset as usize;
        let body = self.body_mut();
        u16::from_be_bytes([body[offset], body[offset + 1]])
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        if self.unmapped {
            return;
        }
        if let Err(err) = self.unmap_now() {
            log::warn!("failed to unmap dqueue: {}", err);
        }
    }
}

fn create_zeroed(path: &Path, total_len: u64) -> Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|err| Error::io(Operation::Open, err))?;

    const CHUNK: usize = 64 * 1024;
    let zeros = [0u8; CHUNK];
    let mut remaining = total_len;
    while remaining > 0 {
        let n = std::cmp::min(remaining, CHUNK as u64) as usize;
        file.write_all(&zeros[..n])
            .map_err(|err| Error::io(Operation::Open, err))?;
        remaining -= n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &tempfile::TempDir, name: &str, kib: u32) -> Queue {
        Queue::open(dir.path().join(name), kib).unwrap()
    }

    #[test]
    fn fresh_queue_is_empty() {
        let dir = tempdir().unwrap();
        let mut q = open(&dir, "q", 1);
        let packets = q.pop().unwrap();
        assert!(packets.is_empty());
    }

    #[test]
    fn push_then_pop_round_trips_in_order() {
        let dir = tempdir().unwrap();
        let mut q = open(&dir, "q", 1);
        q.push(vec![&b"a"[..], &b"bb"[..], &b"ccc"[..]]).unwrap();

        let packets = q.pop().unwrap();
        let collected: Vec<&[u8]> = packets.iter().collect();
        assert_eq!(collected, vec![&b"a"[..], &b"bb"[..], &b"ccc"[..]]);
    }

    #[test]
    fn read_cursor_commit_is_lazy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q");
        let mut q = Queue::open(&path, 1).unwrap();
        q.push(vec![&b"a"[..]]).unwrap();

        // First pop reads the packet but must not yet commit the header's
        // read cursor.
        let packets = q.pop().unwrap();
        assert_eq!(packets.len(), 1);
        drop(packets);

        // Reopening without resetting exposes the header as it stands right
        // now: the commit is still pending.
        let reopened = Queue::open_with_mode(&path, 1, OpenMode::Reopen).unwrap();
        assert_eq!(reopened.header().next_read_at(), 0);
        drop(reopened);

        // The second pop (on the original handle) commits the prior pop's
        // cursor and finds nothing new.
        let empty = q.pop().unwrap();
        assert!(empty.is_empty());
        drop(q);

        let reopened = Queue::open_with_mode(&path, 1, OpenMode::Reopen).unwrap();
        assert_eq!(reopened.header().next_read_at(), 3);
    }

    #[test]
    fn producer_overrunning_unread_region_drops_oldest_packets() {
        let dir = tempdir().unwrap();
        let mut q = open(&dir, "q", 1);

        let payloads: Vec<String> = (0..1024u32).map(|i| i.to_string()).collect();
        let refs: Vec<&[u8]> = payloads.iter().map(|s| s.as_bytes()).collect();
        q.push(refs).unwrap();

        let packets = q.pop().unwrap();
        let collected: Vec<Vec<u8>> = packets.iter().map(|p| p.to_vec()).collect();

        assert_eq!(collected.len(), 194);
        assert_eq!(collected[0], b"830");
        assert_eq!(collected[collected.len() - 1], b"1023");
    }

    #[test]
    fn packet_larger_than_max_is_rejected_without_partial_write() {
        let dir = tempdir().unwrap();
        let mut q = open(&dir, "q", 32);
        let huge = vec![0u8; crate::header::MAX_PACKET_SIZE + 1];
        let err = q.push(vec![huge.as_slice()]).unwrap_err();
        assert!(err.is_packet_too_large());

        let packets = q.pop().unwrap();
        assert!(packets.is_empty());
    }

    #[test]
    fn close_unmaps_and_a_fresh_open_sees_the_committed_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q");
        let mut q = Queue::open(&path, 1).unwrap();
        q.push(vec![&b"a"[..]]).unwrap();
        q.close().unwrap();

        let reopened = Queue::open_with_mode(&path, 1, OpenMode::Reopen).unwrap();
        assert_eq!(reopened.header().next_write_at(), 3);
    }
}
