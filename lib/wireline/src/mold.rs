//! MoldUDP64 downstream header: a 10-byte session, a 64-bit sequence number
//! and a 16-bit message count, all big-endian.

use crate::{WireError, WireResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

pub const SESSION_LEN: usize = 10;
pub const HEADER_LEN: usize = SESSION_LEN + 8 + 2;

/// Session identifier stamped on every generated packet.
pub const SESSION: [u8; SESSION_LEN] = *b"sessionabc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoldHeader {
    pub session: [u8; SESSION_LEN],
    pub seq_num: u64,
    pub msg_cnt: u16,
}

impl MoldHeader {
    /// Header for a single-message packet in the generator's session.
    #[inline]
    pub fn new(seq_num: u64) -> MoldHeader {
        MoldHeader {
            session: SESSION,
            seq_num,
            msg_cnt: 1,
        }
    }

    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.session)?;
        out.write_u64::<BigEndian>(self.seq_num)?;
        out.write_u16::<BigEndian>(self.msg_cnt)?;
        Ok(())
    }

    pub fn read(buf: &[u8]) -> WireResult<MoldHeader> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated);
        }
        let mut session = [0u8; SESSION_LEN];
        session.copy_from_slice(&buf[..SESSION_LEN]);
        let mut rest = &buf[SESSION_LEN..];
        Ok(MoldHeader {
            session,
            seq_num: rest.read_u64::<BigEndian>()?,
            msg_cnt: rest.read_u16::<BigEndian>()?,
        })
    }
}
