pub mod ether;
pub mod itch;
pub mod mold;
pub mod pcap;

use std::fmt;
use std::io;

pub type WireResult<T> = Result<T, WireError>;

#[derive(Debug)]
pub enum WireError {
    /// Clean end of the capture on a record boundary.
    Eof,
    Io(io::Error),
    /// Record, frame or message shorter than its layout requires.
    Truncated,
    /// The capture's magic number is not the classic little-endian one.
    BadMagic(u32),
    /// A link, network or transport layer this toolkit does not produce.
    UnsupportedLayer(&'static str),
    /// Unknown one-byte message discriminator.
    UnknownMsgType(u8),
    /// Replacement payload length differs from the record being rewritten.
    PayloadMismatch { expected: usize, got: usize },
    /// No record has been read yet, so there is nothing to replace.
    NoRecord,
}

impl From<io::Error> for WireError {
    #[inline]
    fn from(err: io::Error) -> WireError {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => WireError::Truncated,
            _ => WireError::Io(err),
        }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Eof => write!(f, "end of capture"),
            WireError::Io(err) => write!(f, "i/o error: {}", err),
            WireError::Truncated => write!(f, "truncated data"),
            WireError::BadMagic(magic) => write!(f, "unsupported capture magic {:#010x}", magic),
            WireError::UnsupportedLayer(layer) => write!(f, "unsupported {}", layer),
            WireError::UnknownMsgType(t) => write!(f, "unknown message type {:#04x}", t),
            WireError::PayloadMismatch { expected, got } => {
                write!(f, "payload length {} does not match record length {}", got, expected)
            }
            WireError::NoRecord => write!(f, "no record read yet"),
        }
    }
}

impl WireError {
    /// OS error number when one is attached, for errno-style exit codes.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            WireError::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }
}
