//! Order lifecycle events and the packed time key the scheduler sorts by.

use crate::symbol::TradeSymbol;
use flow::rand::{dtime_to_nsec, dtime_to_sec};
use std::fmt;
use std::sync::Arc;

/// Bits of the nanosecond field folded into the unit id.
pub const UNIT_SHIFT: u32 = 9;
pub const UNIT_TIME_BITS: u32 = 32 - UNIT_SHIFT;
pub const UNIT_TIME_MASK: u32 = (1 << UNIT_TIME_BITS) - 1;

/// Scheduler slot index of a `(sec, nsec)` emission time.
#[inline]
pub fn unit_id(sec: u32, nsec: u32) -> u32 {
    (sec << UNIT_SHIFT) | (nsec >> UNIT_TIME_BITS)
}

/// Position of an emission time within its unit.
#[inline]
pub fn unit_time(nsec: u32) -> u32 {
    nsec & UNIT_TIME_MASK
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBody {
    Add {
        shares: u32,
        price: u32,
        buy: bool,
    },
    Exec {
        shares: u32,
        price: u32,
        match_num: u64,
    },
    Cancel {
        shares: u32,
    },
    Replace {
        shares: u32,
        price: u32,
        orig_ref_num: u64,
    },
    Timestamp {
        seconds: u32,
    },
}

impl EventBody {
    pub fn type_str(&self) -> &'static str {
        match self {
            EventBody::Add { .. } => "ADD",
            EventBody::Exec { .. } => "EXEC",
            EventBody::Cancel { .. } => "CANCEL",
            EventBody::Replace { .. } => "REPLACE",
            EventBody::Timestamp { .. } => "TIMESTAMP",
        }
    }
}

/// One event of an order's life, self-contained: everything the wire encoder
/// needs is copied in at creation, so an event can be handed to the writer
/// thread and dropped after serialization.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    /// Emission time in seconds since stream start.
    pub time: f64,
    pub t_sec: u32,
    pub t_nsec: u32,
    pub unit_id: u32,
    pub unit_time: u32,
    /// Assigned at submit, in emission order.
    pub seq_num: u64,
    /// Reference of the order this event belongs to (the new reference for
    /// a replace).
    pub ref_num: u64,
    /// Shares still open once this event has been applied.
    pub remain_shares: u32,
    pub cur_price: u32,
    pub symbol: Option<Arc<TradeSymbol>>,
    pub body: EventBody,
}

impl OrderEvent {
    pub fn new(
        time: f64,
        symbol: Option<Arc<TradeSymbol>>,
        ref_num: u64,
        remain_shares: u32,
        cur_price: u32,
        body: EventBody,
    ) -> OrderEvent {
        let t_sec = dtime_to_sec(time);
        let t_nsec = dtime_to_nsec(time);
        OrderEvent {
            time,
            t_sec,
            t_nsec,
            unit_id: unit_id(t_sec, t_nsec),
            unit_time: unit_time(t_nsec),
            seq_num: 0,
            ref_num,
            remain_shares,
            cur_price,
            symbol,
            body,
        }
    }

    /// The once-per-second tick event, pinned to the exact second boundary.
    pub fn timestamp(seconds: u32) -> OrderEvent {
        OrderEvent::new(
            f64::from(seconds),
            None,
            0,
            0,
            0,
            EventBody::Timestamp { seconds },
        )
    }

    fn symbol_str(&self) -> &str {
        self.symbol.as_ref().map_or("--", |s| s.name_str())
    }
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time: {}.{:09} ", self.t_sec, self.t_nsec)?;
        match self.body {
            EventBody::Add { shares, price, buy } => write!(
                f,
                "{} ADD order ref: {} shares: {} price: {}, req: {}",
                self.symbol_str(),
                self.ref_num,
                shares,
                price,
                if buy { "BUY" } else { "SELL" }
            ),
            EventBody::Exec {
                shares,
                price,
                match_num,
            } => write!(
                f,
                "{} EXEC order ref: {} shares: {} price: {} match: {}, remains: {}",
                self.symbol_str(),
                self.ref_num,
                shares,
                price,
                match_num,
                self.remain_shares
            ),
            EventBody::Cancel { shares } => write!(
                f,
                "{} CANCEL order ref: {} shares: {}, remains: {}",
                self.symbol_str(),
                self.ref_num,
                shares,
                self.remain_shares
            ),
            EventBody::Replace {
                shares,
                price,
                orig_ref_num,
            } => write!(
                f,
                "{} REPLACE order ref: {} -> {} shares: {} price: {}",
                self.symbol_str(),
                orig_ref_num,
                self.ref_num,
                shares,
                price
            ),
            EventBody::Timestamp { seconds } => write!(f, "timestamp: {} sec", seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_packing_splits_nsec() {
        assert_eq!(unit_id(0, 0), 0);
        assert_eq!(unit_time(0), 0);

        // 2^23 ns rolls the unit over
        assert_eq!(unit_id(0, 1 << 23), 1);
        assert_eq!(unit_time(1 << 23), 0);
        assert_eq!(unit_time((1 << 23) - 1), (1 << 23) - 1);

        // one second spans 512 unit slots
        assert_eq!(unit_id(1, 0), 512);
        assert_eq!(unit_id(3, 999_999_999), (3 << 9) | (999_999_999 >> 23));
    }

    #[test]
    fn event_times_decompose() {
        let ev = OrderEvent::new(1.5, None, 1, 0, 0, EventBody::Cancel { shares: 10 });
        assert_eq!(ev.t_sec, 1);
        assert_eq!(ev.t_nsec, 500_000_000);
        assert_eq!(ev.unit_id, unit_id(1, 500_000_000));
        assert_eq!(ev.unit_time, unit_time(500_000_000));
    }

    #[test]
    fn timestamp_sits_on_the_second_boundary() {
        let ev = OrderEvent::timestamp(5);
        assert_eq!(ev.t_sec, 5);
        assert_eq!(ev.t_nsec, 0);
        assert_eq!(ev.unit_id, 5 << UNIT_SHIFT);
        assert_eq!(ev.unit_time, 0);
        assert_eq!(ev.body, EventBody::Timestamp { seconds: 5 });
    }
}
