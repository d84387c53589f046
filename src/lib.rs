//! A durable, single-producer single-consumer byte-packet queue backed by a
//! memory-mapped file.
//!
//! A producer [`Queue::push`]es variable-length byte packets; a consumer
//! [`Queue::pop`]s them back out in FIFO order, up to `MAX_READ_PACKET_COUNT`
//! per call. The queue lives entirely in a fixed-size file: a 13-byte header
//! holding the cursors, followed by a body that is a circular buffer of
//! length-prefixed frames. There is no growth past that fixed size — if the
//! producer writes faster than the consumer reads, the oldest unread packets
//! are silently dropped to make room for new ones.
//!
//! This crate does not provide multi-producer or multi-consumer
//! synchronization, cryptographic integrity, or exactly-once delivery. It
//! assumes a single writer and a single reader, each serializing their own
//! calls, coordinating through the backing file alone.
//!
//! # Example
//!
//! ```no_run
//! use dqueue::Queue;
//!
//! # fn main() -> dqueue::Result<()> {
//! let mut producer = Queue::open("/tmp/example.dq", 1024)?;
//! producer.push(vec![&b"hello"[..], &b"world"[..]])?;
//!
//! let mut consumer = Queue::open_with_mode(
//!     "/tmp/example.dq",
//!     1024,
//!     dqueue::OpenMode::Reopen,
//! )?;
//! for packet in consumer.pop()? {
//!     println!("{:?}", packet);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod header;
mod os;
mod pool;
mod queue;
mod ring;

pub use crate::error::{Error, Operation, Result};
pub use crate::os::Flush;
pub use crate::pool::{Packets, PacketsIter};
pub use crate::queue::{OpenMode, Queue};

pub use crate::header::MAX_PACKET_SIZE;
pub use crate::header::MAX_READ_PACKET_COUNT;
