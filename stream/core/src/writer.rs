//! The consumer side of the pipeline: pulls event batches off the handoff
//! queue, serializes each one into a MoldUDP64/ITCH payload and appends it
//! to the capture.

use crate::event::{EventBody, OrderEvent};
use crate::squeue::SyncQueue;
use crate::stats::WriterStats;
use flow::logging::{self, Logger};
use wireline::itch::{ItchMessage, EXEC_PRINTABLE, SIDE_BUY, SIDE_SELL};
use wireline::mold::{self, MoldHeader};
use wireline::pcap::PcapWriter;
use wireline::WireResult;

/// Fixed skew added to every record's microsecond stamp.
pub const RECORD_USEC_SKEW: u32 = 3;

/// The wire message for a submitted event.
pub fn itch_message(event: &OrderEvent) -> ItchMessage {
    match event.body {
        EventBody::Add { shares, price, buy } => {
            let symbol = event
                .symbol
                .as_ref()
                .expect("add order must carry a symbol");
            ItchMessage::AddOrder {
                timestamp_ns: event.t_nsec,
                ref_num: event.ref_num,
                buy_sell: if buy { SIDE_BUY } else { SIDE_SELL },
                shares,
                stock: symbol.wire_name(),
                price,
            }
        }
        EventBody::Exec {
            shares,
            price,
            match_num,
        } => ItchMessage::OrderExecuted {
            timestamp_ns: event.t_nsec,
            ref_num: event.ref_num,
            shares,
            match_num,
            printable: EXEC_PRINTABLE,
            price,
        },
        EventBody::Cancel { shares } => ItchMessage::OrderCancel {
            timestamp_ns: event.t_nsec,
            ref_num: event.ref_num,
            shares,
        },
        EventBody::Replace {
            shares,
            price,
            orig_ref_num,
        } => ItchMessage::OrderReplace {
            timestamp_ns: event.t_nsec,
            orig_ref_num,
            new_ref_num: event.ref_num,
            shares,
            price,
        },
        EventBody::Timestamp { seconds } => ItchMessage::Timestamp { seconds },
    }
}

/// Mold header plus one ITCH message, the full UDP payload of one packet.
pub fn encode_event(event: &OrderEvent) -> WireResult<Vec<u8>> {
    let msg = itch_message(event);
    let mut payload = Vec::with_capacity(mold::HEADER_LEN + msg.wire_len());
    MoldHeader::new(event.seq_num).write(&mut payload)?;
    msg.write(&mut payload)?;
    Ok(payload)
}

/// Consumes batches until the queue shuts down, writing one capture record
/// per event. Runs on the writer thread; the capture is flushed and closed
/// before returning.
pub fn run_writer(
    queue: &SyncQueue<Box<OrderEvent>>,
    mut pcap: PcapWriter,
    log: &Logger,
) -> WireResult<WriterStats> {
    let log = log.new(logging::o!());
    let mut stats = WriterStats::default();
    let mut batch: Vec<Box<OrderEvent>> = Vec::new();
    let mut failure = None;

    // After a write failure the queue must still be drained to completion,
    // or the producer's shutdown would wait on it forever.
    while queue.pull_list(&mut batch) {
        if failure.is_some() {
            batch.clear();
            continue;
        }
        logging::trace!(log, "batch received"; "events" => batch.len());
        for event in batch.drain(..) {
            let result = encode_event(&event).and_then(|payload| {
                pcap.add_record(
                    event.t_sec,
                    event.t_nsec / 1000 + RECORD_USEC_SKEW,
                    &payload,
                )?;
                stats.records += 1;
                stats.payload_bytes += payload.len() as u64;
                Ok(())
            });
            if let Err(err) = result {
                logging::error!(log, "capture write failed"; "error" => %err);
                failure = Some(err);
                break;
            }
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }
    pcap.finish()?;
    logging::debug!(log, "capture written";
                    "records" => stats.records,
                    "payload_bytes" => stats.payload_bytes);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::TradeSymbol;
    use flow::rand::Rand;
    use std::sync::Arc;

    #[test]
    fn encoded_payload_carries_the_sequence_number() {
        let mut event = OrderEvent::timestamp(9);
        event.seq_num = 0x0102_0304;
        let payload = encode_event(&event).unwrap();
        assert_eq!(payload.len(), mold::HEADER_LEN + 5);

        let mold = MoldHeader::read(&payload).unwrap();
        assert_eq!(mold.seq_num, 0x0102_0304);
        assert_eq!(mold.msg_cnt, 1);
        assert_eq!(
            ItchMessage::read(&payload[mold::HEADER_LEN..]).unwrap(),
            ItchMessage::Timestamp { seconds: 9 }
        );
    }

    #[test]
    fn add_event_maps_onto_the_add_order_message() {
        let (mut rand, _) = Rand::from_seed(Some(12));
        let symbol = Arc::new(TradeSymbol::from_name("ACME", &mut rand));
        let mut event = OrderEvent::new(
            0.125,
            Some(symbol.clone()),
            77,
            500,
            120,
            EventBody::Add {
                shares: 500,
                price: 120,
                buy: false,
            },
        );
        event.seq_num = 3;

        match itch_message(&event) {
            ItchMessage::AddOrder {
                timestamp_ns,
                ref_num,
                buy_sell,
                shares,
                stock,
                price,
            } => {
                assert_eq!(timestamp_ns, 125_000_000);
                assert_eq!(ref_num, 77);
                assert_eq!(buy_sell, SIDE_SELL);
                assert_eq!(shares, 500);
                assert_eq!(stock, symbol.wire_name());
                assert_eq!(price, 120);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn replace_event_carries_both_references() {
        let mut event = OrderEvent::new(
            1.0,
            None,
            200,
            30,
            55,
            EventBody::Replace {
                shares: 30,
                price: 55,
                orig_ref_num: 100,
            },
        );
        event.seq_num = 8;
        match itch_message(&event) {
            ItchMessage::OrderReplace {
                orig_ref_num,
                new_ref_num,
                ..
            } => {
                assert_eq!(orig_ref_num, 100);
                assert_eq!(new_ref_num, 200);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
