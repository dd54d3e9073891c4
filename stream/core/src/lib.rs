pub mod config;
pub mod event;
pub mod gen;
pub mod parse;
pub mod squeue;
pub mod stats;
pub mod symbol;
pub mod wheel;
pub mod writer;

use std::fmt;
use std::io;
use wireline::WireError;

pub type GenResult<T> = Result<T, GenError>;

#[derive(Debug)]
pub enum GenError {
    /// A command-line or configuration value is malformed or out of range.
    InvalidArgument(String),
    /// The reference hash has no free slot left.
    RefSpaceExhausted,
    Wire(WireError),
    Io(io::Error),
}

impl From<WireError> for GenError {
    #[inline]
    fn from(err: WireError) -> GenError {
        GenError::Wire(err)
    }
}

impl From<io::Error> for GenError {
    #[inline]
    fn from(err: io::Error) -> GenError {
        GenError::Io(err)
    }
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenError::InvalidArgument(msg) => write!(f, "{}", msg),
            GenError::RefSpaceExhausted => write!(f, "reference hash table is full"),
            GenError::Wire(err) => write!(f, "{}", err),
            GenError::Io(err) => write!(f, "{}", err),
        }
    }
}

impl GenError {
    /// Errno-style process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            GenError::InvalidArgument(_) => 22,
            GenError::RefSpaceExhausted => 12,
            GenError::Wire(err) => err.raw_os_error().unwrap_or(5),
            GenError::Io(err) => err.raw_os_error().unwrap_or(5),
        }
    }
}
