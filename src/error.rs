//! Types for working with the various ways a queue operation can fail.

use std::{fmt, io};

/// A specialized `Result` type for queue operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A list specifying the operation that was being attempted when an
/// [`Error`] occurred.
///
/// This list is intended to grow over time and it is not recommended to
/// exhaustively match against it.
///
/// [`Error`]: struct.Error.html
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Operation {
    /// The operation failed while opening or creating the backing file.
    Open,
    /// The operation failed while mapping or unmapping the backing file.
    Map,
    /// The operation failed while closing the backing file.
    Close,
    /// The operation failed while flushing dirty pages to the backing file.
    Flush,
    /// The operation failed during `Push`.
    Push,
    /// The operation failed during `Pop`.
    Pop,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match *self {
            Operation::Open => "open queue file",
            Operation::Map => "map queue file",
            Operation::Close => "close queue file",
            Operation::Flush => "flush queue file",
            Operation::Push => "push packets",
            Operation::Pop => "pop packets",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// A list specifying general categories of queue errors.
///
/// These map directly to the error kinds named by the wire protocol: a
/// failure of the host file system or virtual memory system (`Io`), an
/// oversized or corrupt packet (`PacketTooLarge`), or a violated cursor
/// invariant (`Internal`).
#[non_exhaustive]
pub struct Error {
    repr: Repr,
    op: Operation,
}

enum Repr {
    Io(io::Error),
    PacketTooLarge { len: usize },
    Internal(&'static str),
}

impl Error {
    /// Returns an error that wraps a `std::io::Error` along with an
    /// [`Operation`].
    pub fn io(op: Operation, err: io::Error) -> Self {
        Self {
            repr: Repr::Io(err),
            op,
        }
    }

    /// Returns an error for a payload, or a stored length prefix, that
    /// exceeds `MAX_PACKET_SIZE`.
    pub fn packet_too_large(op: Operation, len: usize) -> Self {
        Self {
            repr: Repr::PacketTooLarge { len },
            op,
        }
    }

    /// Returns an error for a violated cursor invariant. This indicates a
    /// bug in the caller or corruption of the backing file; it is not
    /// recoverable.
    pub fn internal(op: Operation, why: &'static str) -> Self {
        Self {
            repr: Repr::Internal(why),
            op,
        }
    }

    /// Returns an error that wraps the last OS error, for use immediately
    /// after a failing syscall.
    pub fn last_os_error(op: Operation) -> Self {
        Self::io(op, io::Error::last_os_error())
    }

    /// Returns the corresponding `std::io::ErrorKind` for this error.
    pub fn kind(&self) -> io::ErrorKind {
        match self.repr {
            Repr::Io(ref err) => err.kind(),
            Repr::PacketTooLarge { .. } => io::ErrorKind::InvalidData,
            Repr::Internal(_) => io::ErrorKind::Other,
        }
    }

    /// Returns the [`Operation`] that was being attempted when this error
    /// occurred.
    pub fn operation(&self) -> Operation {
        self.op
    }

    /// Returns `true` if this is a `PacketTooLarge` error.
    pub fn is_packet_too_large(&self) -> bool {
        matches!(self.repr, Repr::PacketTooLarge { .. })
    }

    /// Returns `true` if this is an `Internal` invariant-violation error.
    pub fn is_internal(&self) -> bool {
        matches!(self.repr, Repr::Internal(_))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.repr {
            Repr::Io(ref err) => Some(err),
            Repr::PacketTooLarge { .. } | Repr::Internal(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self {
            repr: Repr::Io(err),
            op: Operation::Map,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = fmt.debug_struct("Error");
        d.field("op", &self.op);
        match self.repr {
            Repr::Io(ref err) => d.field("io", err),
            Repr::PacketTooLarge { ref len } => d.field("len", len),
            Repr::Internal(ref why) => d.field("why", why),
        };
        d.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Io(ref err) => write!(fmt, "failed to {}: {}", self.op, err),
            Repr::PacketTooLarge { len } => write!(
                fmt,
                "failed to {}: packet of {} bytes exceeds MAX_PACKET_SIZE",
                self.op, len
            ),
            Repr::Internal(why) => write!(fmt, "failed to {}: {}", self.op, why),
        }
    }
}
