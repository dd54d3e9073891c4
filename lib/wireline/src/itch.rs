//! ITCH message layouts. All integers are big-endian, all layouts are
//! byte-aligned with no padding; a single leading byte discriminates the
//! message type.

use crate::{WireError, WireResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

pub const SYMBOL_LEN: usize = 8;
pub const MPID_LEN: usize = 4;

pub const MSG_TRADING_ACTION: u8 = b'H';
pub const MSG_TIMESTAMP: u8 = b'T';
pub const MSG_ADD_ORDER: u8 = b'A';
pub const MSG_ADD_ORDER_MPID: u8 = b'F';
pub const MSG_ORDER_EXECUTED: u8 = b'C';
pub const MSG_ORDER_CANCEL: u8 = b'X';
pub const MSG_ORDER_DELETE: u8 = b'D';
pub const MSG_ORDER_REPLACE: u8 = b'U';

pub const SIDE_BUY: u8 = b'B';
pub const SIDE_SELL: u8 = b'S';
pub const EXEC_PRINTABLE: u8 = b'Y';

/// One decoded ITCH message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItchMessage {
    Timestamp {
        seconds: u32,
    },
    AddOrder {
        timestamp_ns: u32,
        ref_num: u64,
        buy_sell: u8,
        shares: u32,
        stock: [u8; SYMBOL_LEN],
        price: u32,
    },
    AddOrderMpid {
        timestamp_ns: u32,
        ref_num: u64,
        buy_sell: u8,
        shares: u32,
        stock: [u8; SYMBOL_LEN],
        price: u32,
        attribution: [u8; MPID_LEN],
    },
    OrderExecuted {
        timestamp_ns: u32,
        ref_num: u64,
        shares: u32,
        match_num: u64,
        printable: u8,
        price: u32,
    },
    OrderCancel {
        timestamp_ns: u32,
        ref_num: u64,
        shares: u32,
    },
    OrderDelete {
        timestamp_ns: u32,
        ref_num: u64,
    },
    OrderReplace {
        timestamp_ns: u32,
        orig_ref_num: u64,
        new_ref_num: u64,
        shares: u32,
        price: u32,
    },
    TradingAction {
        timestamp_ns: u32,
        stock: [u8; SYMBOL_LEN],
        state: u8,
        reserved: u8,
        reason: [u8; 4],
    },
}

impl ItchMessage {
    pub fn msg_type(&self) -> u8 {
        match self {
            ItchMessage::Timestamp { .. } => MSG_TIMESTAMP,
            ItchMessage::AddOrder { .. } => MSG_ADD_ORDER,
            ItchMessage::AddOrderMpid { .. } => MSG_ADD_ORDER_MPID,
            ItchMessage::OrderExecuted { .. } => MSG_ORDER_EXECUTED,
            ItchMessage::OrderCancel { .. } => MSG_ORDER_CANCEL,
            ItchMessage::OrderDelete { .. } => MSG_ORDER_DELETE,
            ItchMessage::OrderReplace { .. } => MSG_ORDER_REPLACE,
            ItchMessage::TradingAction { .. } => MSG_TRADING_ACTION,
        }
    }

    /// Serialized length including the type byte.
    pub fn wire_len(&self) -> usize {
        match self {
            ItchMessage::Timestamp { .. } => 5,
            ItchMessage::AddOrder { .. } => 30,
            ItchMessage::AddOrderMpid { .. } => 34,
            ItchMessage::OrderExecuted { .. } => 30,
            ItchMessage::OrderCancel { .. } => 17,
            ItchMessage::OrderDelete { .. } => 13,
            ItchMessage::OrderReplace { .. } => 29,
            ItchMessage::TradingAction { .. } => 19,
        }
    }

    /// The order reference the message is about, when it has one.
    pub fn ref_num(&self) -> Option<u64> {
        match *self {
            ItchMessage::AddOrder { ref_num, .. }
            | ItchMessage::AddOrderMpid { ref_num, .. }
            | ItchMessage::OrderExecuted { ref_num, .. }
            | ItchMessage::OrderCancel { ref_num, .. }
            | ItchMessage::OrderDelete { ref_num, .. } => Some(ref_num),
            ItchMessage::OrderReplace { orig_ref_num, .. } => Some(orig_ref_num),
            ItchMessage::Timestamp { .. } | ItchMessage::TradingAction { .. } => None,
        }
    }

    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u8(self.msg_type())?;
        match *self {
            ItchMessage::Timestamp { seconds } => {
                out.write_u32::<BigEndian>(seconds)?;
            }
            ItchMessage::AddOrder {
                timestamp_ns,
                ref_num,
                buy_sell,
                shares,
                stock,
                price,
            } => {
                out.write_u32::<BigEndian>(timestamp_ns)?;
                out.write_u64::<BigEndian>(ref_num)?;
                out.write_u8(buy_sell)?;
                out.write_u32::<BigEndian>(shares)?;
                out.write_all(&stock)?;
                out.write_u32::<BigEndian>(price)?;
            }
            ItchMessage::AddOrderMpid {
                timestamp_ns,
                ref_num,
                buy_sell,
                shares,
                stock,
                price,
                attribution,
            } => {
                out.write_u32::<BigEndian>(timestamp_ns)?;
                out.write_u64::<BigEndian>(ref_num)?;
                out.write_u8(buy_sell)?;
                out.write_u32::<BigEndian>(shares)?;
                out.write_all(&stock)?;
                out.write_u32::<BigEndian>(price)?;
                out.write_all(&attribution)?;
            }
            ItchMessage::OrderExecuted {
                timestamp_ns,
                ref_num,
                shares,
                match_num,
                printable,
                price,
            } => {
                out.write_u32::<BigEndian>(timestamp_ns)?;
                out.write_u64::<BigEndian>(ref_num)?;
                out.write_u32::<BigEndian>(shares)?;
                out.write_u64::<BigEndian>(match_num)?;
                out.write_u8(printable)?;
                out.write_u32::<BigEndian>(price)?;
            }
            ItchMessage::OrderCancel {
                timestamp_ns,
                ref_num,
                shares,
            } => {
                out.write_u32::<BigEndian>(timestamp_ns)?;
                out.write_u64::<BigEndian>(ref_num)?;
                out.write_u32::<BigEndian>(shares)?;
            }
            ItchMessage::OrderDelete {
                timestamp_ns,
                ref_num,
            } => {
                out.write_u32::<BigEndian>(timestamp_ns)?;
                out.write_u64::<BigEndian>(ref_num)?;
            }
            ItchMessage::OrderReplace {
                timestamp_ns,
                orig_ref_num,
                new_ref_num,
                shares,
                price,
            } => {
                out.write_u32::<BigEndian>(timestamp_ns)?;
                out.write_u64::<BigEndian>(orig_ref_num)?;
                out.write_u64::<BigEndian>(new_ref_num)?;
                out.write_u32::<BigEndian>(shares)?;
                out.write_u32::<BigEndian>(price)?;
            }
            ItchMessage::TradingAction {
                timestamp_ns,
                stock,
                state,
                reserved,
                reason,
            } => {
                out.write_u32::<BigEndian>(timestamp_ns)?;
                out.write_all(&stock)?;
                out.write_u8(state)?;
                out.write_u8(reserved)?;
                out.write_all(&reason)?;
            }
        }
        Ok(())
    }

    /// Decodes one message from the start of `buf`.
    pub fn read(buf: &[u8]) -> WireResult<ItchMessage> {
        if buf.is_empty() {
            return Err(WireError::Truncated);
        }
        let msg_type = buf[0];
        let mut cur = Cursor::new(&buf[1..]);

        let msg = match msg_type {
            MSG_TIMESTAMP => ItchMessage::Timestamp {
                seconds: cur.read_u32::<BigEndian>()?,
            },
            MSG_ADD_ORDER => ItchMessage::AddOrder {
                timestamp_ns: cur.read_u32::<BigEndian>()?,
                ref_num: cur.read_u64::<BigEndian>()?,
                buy_sell: cur.read_u8()?,
                shares: cur.read_u32::<BigEndian>()?,
                stock: read_bytes(&mut cur)?,
                price: cur.read_u32::<BigEndian>()?,
            },
            MSG_ADD_ORDER_MPID => ItchMessage::AddOrderMpid {
                timestamp_ns: cur.read_u32::<BigEndian>()?,
                ref_num: cur.read_u64::<BigEndian>()?,
                buy_sell: cur.read_u8()?,
                shares: cur.read_u32::<BigEndian>()?,
                stock: read_bytes(&mut cur)?,
                price: cur.read_u32::<BigEndian>()?,
                attribution: read_bytes(&mut cur)?,
            },
            MSG_ORDER_EXECUTED => ItchMessage::OrderExecuted {
                timestamp_ns: cur.read_u32::<BigEndian>()?,
                ref_num: cur.read_u64::<BigEndian>()?,
                shares: cur.read_u32::<BigEndian>()?,
                match_num: cur.read_u64::<BigEndian>()?,
                printable: cur.read_u8()?,
                price: cur.read_u32::<BigEndian>()?,
            },
            MSG_ORDER_CANCEL => ItchMessage::OrderCancel {
                timestamp_ns: cur.read_u32::<BigEndian>()?,
                ref_num: cur.read_u64::<BigEndian>()?,
                shares: cur.read_u32::<BigEndian>()?,
            },
            MSG_ORDER_DELETE => ItchMessage::OrderDelete {
                timestamp_ns: cur.read_u32::<BigEndian>()?,
                ref_num: cur.read_u64::<BigEndian>()?,
            },
            MSG_ORDER_REPLACE => ItchMessage::OrderReplace {
                timestamp_ns: cur.read_u32::<BigEndian>()?,
                orig_ref_num: cur.read_u64::<BigEndian>()?,
                new_ref_num: cur.read_u64::<BigEndian>()?,
                shares: cur.read_u32::<BigEndian>()?,
                price: cur.read_u32::<BigEndian>()?,
            },
            MSG_TRADING_ACTION => ItchMessage::TradingAction {
                timestamp_ns: cur.read_u32::<BigEndian>()?,
                stock: read_bytes(&mut cur)?,
                state: cur.read_u8()?,
                reserved: cur.read_u8()?,
                reason: read_bytes(&mut cur)?,
            },
            other => return Err(WireError::UnknownMsgType(other)),
        };
        Ok(msg)
    }
}

#[inline]
fn read_bytes<const N: usize>(cur: &mut Cursor<&[u8]>) -> WireResult<[u8; N]> {
    let mut out = [0u8; N];
    cur.read_exact(&mut out)?;
    Ok(out)
}

pub fn side_str(buy_sell: u8) -> &'static str {
    match buy_sell {
        SIDE_BUY => "BUY",
        SIDE_SELL => "SELL",
        _ => "INVALID",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(msg: &ItchMessage) -> Vec<u8> {
        let mut buf = Vec::new();
        msg.write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn add_order_layout_is_byte_exact() {
        let msg = ItchMessage::AddOrder {
            timestamp_ns: 0x0102_0304,
            ref_num: 0x1122_3344_5566_7788,
            buy_sell: SIDE_BUY,
            shares: 100,
            stock: *b"ACME\0\0\0\0",
            price: 0x0315,
        };
        let expected: Vec<u8> = vec![
            0x41, // 'A'
            0x01, 0x02, 0x03, 0x04, // ns
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, // ref
            0x42, // 'B'
            0x00, 0x00, 0x00, 0x64, // shares
            0x41, 0x43, 0x4d, 0x45, 0x00, 0x00, 0x00, 0x00, // stock
            0x00, 0x00, 0x03, 0x15, // price
        ];
        assert_eq!(encode(&msg), expected);
        assert_eq!(ItchMessage::read(&expected).unwrap(), msg);
    }

    #[test]
    fn replace_layout_is_byte_exact() {
        let msg = ItchMessage::OrderReplace {
            timestamp_ns: 1,
            orig_ref_num: 2,
            new_ref_num: 3,
            shares: 4,
            price: 5,
        };
        let expected: Vec<u8> = vec![
            0x55, // 'U'
            0x00, 0x00, 0x00, 0x01, // ns
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, // orig
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, // new
            0x00, 0x00, 0x00, 0x04, // shares
            0x00, 0x00, 0x00, 0x05, // price
        ];
        assert_eq!(encode(&msg), expected);
        assert_eq!(ItchMessage::read(&expected).unwrap(), msg);
    }

    #[test]
    fn executed_layout_is_byte_exact() {
        let msg = ItchMessage::OrderExecuted {
            timestamp_ns: 0x0a0b_0c0d,
            ref_num: 0x01,
            shares: 0x0200,
            match_num: 0x0304_0506_0708_090a,
            printable: EXEC_PRINTABLE,
            price: 0x0b,
        };
        let expected: Vec<u8> = vec![
            0x43, // 'C'
            0x0a, 0x0b, 0x0c, 0x0d, // ns
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // ref
            0x00, 0x00, 0x02, 0x00, // shares
            0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, // match
            0x59, // 'Y'
            0x00, 0x00, 0x00, 0x0b, // price
        ];
        assert_eq!(encode(&msg), expected);
        assert_eq!(ItchMessage::read(&expected).unwrap(), msg);
    }

    #[test]
    fn wire_lengths_match_serialization() {
        let messages = [
            ItchMessage::Timestamp { seconds: 17 },
            ItchMessage::AddOrder {
                timestamp_ns: 1,
                ref_num: 2,
                buy_sell: SIDE_SELL,
                shares: 30,
                stock: *b"IONX\0\0\0\0",
                price: 250,
            },
            ItchMessage::AddOrderMpid {
                timestamp_ns: 1,
                ref_num: 2,
                buy_sell: SIDE_BUY,
                shares: 30,
                stock: *b"IONX\0\0\0\0",
                price: 250,
                attribution: *b"MPID",
            },
            ItchMessage::OrderExecuted {
                timestamp_ns: 1,
                ref_num: 2,
                shares: 30,
                match_num: 9,
                printable: EXEC_PRINTABLE,
                price: 250,
            },
            ItchMessage::OrderCancel {
                timestamp_ns: 1,
                ref_num: 2,
                shares: 30,
            },
            ItchMessage::OrderDelete {
                timestamp_ns: 1,
                ref_num: 2,
            },
            ItchMessage::OrderReplace {
                timestamp_ns: 1,
                orig_ref_num: 2,
                new_ref_num: 3,
                shares: 30,
                price: 250,
            },
            ItchMessage::TradingAction {
                timestamp_ns: 1,
                stock: *b"IONX\0\0\0\0",
                state: b'T',
                reserved: 0,
                reason: *b"\0\0\0\0",
            },
        ];
        for msg in &messages {
            let buf = encode(msg);
            assert_eq!(buf.len(), msg.wire_len(), "type {}", msg.msg_type() as char);
            assert_eq!(&ItchMessage::read(&buf).unwrap(), msg);
        }
    }

    #[test]
    fn unknown_type_is_reported() {
        match ItchMessage::read(&[0x5a, 0, 0, 0, 0]) {
            Err(WireError::UnknownMsgType(0x5a)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn truncated_message_is_reported() {
        let full = encode(&ItchMessage::OrderCancel {
            timestamp_ns: 1,
            ref_num: 2,
            shares: 3,
        });
        match ItchMessage::read(&full[..10]) {
            Err(WireError::Truncated) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        match ItchMessage::read(&[]) {
            Err(WireError::Truncated) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
