//! Capture parser/editor: streams records, checks MoldUDP64 sequence
//! continuity, classifies ITCH traffic against an optional subscription
//! list, and can rewrite sequence numbers or record timestamps in place.

use crate::stats::ParseStats;
use crate::symbol::{name_bytes_u32, TradeSymbol};
use crate::{GenError, GenResult};
use flow::dhash::{AddError, DHashStats, DHashTable, DEF_POLY, DEF_WIDTH};
use flow::logging::{self, Logger};
use wireline::ether::EndpointAddr;
use wireline::itch::{self, ItchMessage};
use wireline::mold::{self, MoldHeader};
use wireline::pcap::PcapReader;
use wireline::WireError;
use std::path::PathBuf;
use std::sync::Arc;

/// Byte offset of the Mold sequence number within a record payload.
const SEQ_NUM_OFF: usize = mold::SESSION_LEN;

#[derive(Debug, Clone)]
pub struct ParseParams {
    pub file: PathBuf,
    /// Sequence number the first record is expected to carry.
    pub expect_first_seq: u64,
    /// Rewrite sequence numbers as a gap-free run starting here.
    pub edit_first_seq: Option<u64>,
    /// Shift record timestamps so the capture starts at this second.
    pub edit_time_sec: Option<u32>,
    /// Accepted for CLI symmetry; the parser never retires references.
    pub no_hash_del: bool,
    pub verbose: bool,
}

struct Subscription {
    name_dhash: DHashTable,
    refn_dhash: DHashTable,
    num_symbols: u32,
}

pub struct Parser {
    params: ParseParams,
    refn_dhash: DHashTable,
    subscr: Option<Subscription>,
    stats: ParseStats,
    log: Logger,
}

impl Parser {
    pub fn new(
        params: ParseParams,
        subscription: Option<&[Arc<TradeSymbol>]>,
        log: &Logger,
    ) -> Parser {
        let subscr = subscription.map(|symbols| {
            // Stock names hash under a single polynomial, references under
            // the full pair.
            let mut name_dhash = DHashTable::new(DEF_WIDTH, &DEF_POLY[..1]);
            for symbol in symbols {
                match name_dhash.add(symbol.name_u32()) {
                    Ok(()) | Err(AddError::Exists) => {}
                    Err(err) => panic!("subscription name hash rejected a symbol: {:?}", err),
                }
            }
            Subscription {
                name_dhash,
                refn_dhash: DHashTable::new(DEF_WIDTH, &DEF_POLY),
                num_symbols: symbols.len() as u32,
            }
        });

        Parser {
            refn_dhash: DHashTable::new(DEF_WIDTH, &DEF_POLY),
            subscr,
            stats: ParseStats::default(),
            log: log.new(logging::o!()),
            params,
        }
    }

    /// Statistics of the reference hash, for the end-of-run report.
    pub fn dhash_stats(&self) -> DHashStats {
        self.refn_dhash.stats()
    }

    /// Subscription symbol count when a list is loaded.
    pub fn num_subscr_symbols(&self) -> Option<u32> {
        self.subscr.as_ref().map(|s| s.num_symbols)
    }

    /// Streams the capture to EOF. Returns the accumulated statistics.
    pub fn run(&mut self) -> GenResult<ParseStats> {
        logging::debug!(self.log, "parse started";
                        "file" => %self.params.file.display(),
                        "expect" => self.params.expect_first_seq,
                        "no_hash_del" => self.params.no_hash_del);

        let editing = self.params.edit_first_seq.is_some() || self.params.edit_time_sec.is_some();
        let mut reader = PcapReader::open(&self.params.file, editing)?;

        let mut first = true;
        let mut first_src = None;
        let mut first_dst = None;
        let mut expected_seq = self.params.expect_first_seq;
        let mut edit_seq: Option<u64> = None;
        let mut time_delta: i64 = 0;

        loop {
            let record = match reader.read_record() {
                Ok(record) => record,
                Err(WireError::Eof) => break,
                Err(err) => return Err(err.into()),
            };
            self.stats.records += 1;

            let mold = MoldHeader::read(&record.payload)?;
            let rec_seq = mold.seq_num;

            if first {
                first = false;
                println!("{} -> {}", record.src, record.dst);
                first_src = Some(record.src);
                first_dst = Some(record.dst);
                self.stats.first_seq = rec_seq;

                if let Some(edit_first) = self.params.edit_first_seq {
                    // Rewriting to the number already on the wire is a no-op.
                    if edit_first != rec_seq {
                        edit_seq = Some(edit_first);
                    }
                }
                if let Some(edit_sec) = self.params.edit_time_sec {
                    time_delta = i64::from(edit_sec) - i64::from(record.ts_sec);
                }
            }
            self.report_endpoint_changes(&record.src, &record.dst, &first_src, &first_dst);

            if mold.msg_cnt != 1 {
                self.stats.bad_msg_cnt += 1;
                logging::warn!(self.log, "unexpected message count";
                               "seq" => rec_seq, "msg_cnt" => mold.msg_cnt);
            } else {
                if rec_seq != expected_seq {
                    println!("seq.err. expected:{} recvd:{}", expected_seq, rec_seq);
                    self.stats.seq_errors += 1;
                    expected_seq = rec_seq;
                }

                match ItchMessage::read(&record.payload[mold::HEADER_LEN..]) {
                    Ok(msg) => {
                        if self.params.verbose {
                            print_message(rec_seq, &msg);
                        }
                        self.dispatch(&msg)?;
                    }
                    Err(WireError::UnknownMsgType(_)) => self.stats.illegal_types += 1,
                    Err(err) => return Err(err.into()),
                }
            }
            expected_seq = expected_seq.wrapping_add(1);

            let new_payload = edit_seq.map(|seq| {
                let mut payload = record.payload.clone();
                payload[SEQ_NUM_OFF..SEQ_NUM_OFF + 8].copy_from_slice(&seq.to_be_bytes());
                payload
            });
            if let Some(seq) = edit_seq {
                edit_seq = Some(seq + 1);
            }
            let retime = if time_delta != 0 {
                Some((
                    (i64::from(record.ts_sec) + time_delta) as u32,
                    record.ts_usec,
                ))
            } else {
                None
            };

            if new_payload.is_some() || retime.is_some() {
                reader.replace_last_record(
                    new_payload.as_deref().unwrap_or(&record.payload[..]),
                    retime,
                )?;
                self.stats.edited_records += 1;
            }

            self.stats.last_seq = rec_seq;
        }

        logging::debug!(self.log, "parse finished";
                        "records" => self.stats.records,
                        "seq_errors" => self.stats.seq_errors);
        Ok(self.stats)
    }

    fn report_endpoint_changes(
        &self,
        src: &EndpointAddr,
        dst: &EndpointAddr,
        first_src: &Option<EndpointAddr>,
        first_dst: &Option<EndpointAddr>,
    ) {
        let src_changed = first_src.map_or(false, |f| f != *src);
        let dst_changed = first_dst.map_or(false, |f| f != *dst);
        if src_changed {
            print!("new src: {}", src);
        }
        if dst_changed {
            print!("{}new dst: {}", if src_changed { " -> " } else { "" }, dst);
        }
        if src_changed || dst_changed {
            println!();
        }
    }

    fn dispatch(&mut self, msg: &ItchMessage) -> GenResult<()> {
        match *msg {
            ItchMessage::AddOrder {
                ref_num, stock, ..
            } => {
                self.stats.orders += 1;
                let refn32 = ref_num as u32;
                match self.refn_dhash.add(refn32) {
                    Ok(()) | Err(AddError::Exists) => {}
                    Err(AddError::BucketOverflow) => self.stats.bucket_overflows += 1,
                    Err(AddError::TableFull) => return Err(GenError::RefSpaceExhausted),
                }

                match &mut self.subscr {
                    None => self.stats.unsubscr_orders += 1,
                    Some(subscr) => {
                        if subscr.name_dhash.find(name_bytes_u32(&stock)) {
                            self.stats.subscr_orders += 1;
                            logging::debug!(self.log, "subscribed order";
                                            "ref" => refn32);
                            match subscr.refn_dhash.add(refn32) {
                                Ok(()) | Err(AddError::Exists) => {}
                                Err(AddError::BucketOverflow) => {
                                    self.stats.bucket_overflows += 1
                                }
                                Err(AddError::TableFull) => {
                                    return Err(GenError::RefSpaceExhausted)
                                }
                            }
                        } else {
                            self.stats.unsubscr_orders += 1;
                        }
                    }
                }
            }
            ItchMessage::OrderExecuted { ref_num, .. } => {
                self.stats.execs += 1;
                if self.subscribed(ref_num) {
                    self.stats.subscr_execs += 1;
                }
            }
            ItchMessage::OrderCancel { ref_num, .. } => {
                self.stats.cancels += 1;
                if self.subscribed(ref_num) {
                    self.stats.subscr_cancels += 1;
                }
            }
            ItchMessage::OrderReplace { orig_ref_num, .. } => {
                self.stats.replaces += 1;
                if self.subscribed(orig_ref_num) {
                    self.stats.subscr_replaces += 1;
                }
            }
            ItchMessage::Timestamp { .. } => {
                self.stats.timestamps += 1;
            }
            // Delete, attributed add and trading action never appear in
            // generated streams; they count with the unknowns.
            ItchMessage::OrderDelete { .. }
            | ItchMessage::AddOrderMpid { .. }
            | ItchMessage::TradingAction { .. } => {
                self.stats.illegal_types += 1;
            }
        }
        Ok(())
    }

    #[inline]
    fn subscribed(&self, ref_num: u64) -> bool {
        self.subscr
            .as_ref()
            .map_or(false, |s| s.refn_dhash.find(ref_num as u32))
    }
}

fn print_message(seq: u64, msg: &ItchMessage) {
    match *msg {
        ItchMessage::Timestamp { seconds } => {
            println!("{} timestamp: {} sec", seq, seconds);
        }
        ItchMessage::AddOrder {
            timestamp_ns,
            ref_num,
            buy_sell,
            shares,
            stock,
            price,
        } => {
            println!(
                "{} .{:09} ADD ref: {} {} shares: {} {} price: {}",
                seq,
                timestamp_ns,
                ref_num,
                stock_str(&stock),
                shares,
                itch::side_str(buy_sell),
                price
            );
        }
        ItchMessage::OrderExecuted {
            timestamp_ns,
            ref_num,
            shares,
            match_num,
            price,
            ..
        } => {
            println!(
                "{} .{:09} EXEC ref: {} shares: {} price: {} match: {}",
                seq, timestamp_ns, ref_num, shares, price, match_num
            );
        }
        ItchMessage::OrderCancel {
            timestamp_ns,
            ref_num,
            shares,
        } => {
            println!(
                "{} .{:09} CANCEL ref: {} shares: {}",
                seq, timestamp_ns, ref_num, shares
            );
        }
        ItchMessage::OrderReplace {
            timestamp_ns,
            orig_ref_num,
            new_ref_num,
            shares,
            price,
        } => {
            println!(
                "{} .{:09} REPLACE ref: {} -> {} shares: {} price: {}",
                seq, timestamp_ns, orig_ref_num, new_ref_num, shares, price
            );
        }
        other => {
            println!("{} unhandled message type {}", seq, other.msg_type() as char);
        }
    }
}

fn stock_str(stock: &[u8; itch::SYMBOL_LEN]) -> String {
    let end = stock.iter().position(|&b| b == 0).unwrap_or(stock.len());
    String::from_utf8_lossy(&stock[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::OrderEvent;
    use crate::writer::encode_event;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;
    use wireline::pcap::PcapWriter;

    fn endpoints() -> (EndpointAddr, EndpointAddr) {
        (
            EndpointAddr {
                mac: [2, 0, 0, 0, 0, 1],
                ip: Ipv4Addr::new(192, 168, 7, 1),
                port: 4000,
            },
            EndpointAddr {
                mac: [2, 0, 0, 0, 0, 2],
                ip: Ipv4Addr::new(192, 168, 7, 2),
                port: 4001,
            },
        )
    }

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("parse-{}-{}.pcap", name, std::process::id()));
        path
    }

    fn write_capture(path: &PathBuf, seqs: &[u64]) {
        let (dst, src) = endpoints();
        let mut writer = PcapWriter::create(path, dst, src).unwrap();
        for (i, &seq) in seqs.iter().enumerate() {
            let mut event = OrderEvent::timestamp(i as u32);
            event.seq_num = seq;
            let payload = encode_event(&event).unwrap();
            writer.add_record(i as u32, 3, &payload).unwrap();
        }
        writer.finish().unwrap();
    }

    fn params(path: &PathBuf) -> ParseParams {
        ParseParams {
            file: path.clone(),
            expect_first_seq: 0,
            edit_first_seq: None,
            edit_time_sec: None,
            no_hash_del: false,
            verbose: false,
        }
    }

    #[test]
    fn contiguous_capture_has_no_seq_errors() {
        let path = temp_path("contiguous");
        write_capture(&path, &[0, 1, 2, 3]);

        let log = logging::discard();
        let mut parser = Parser::new(params(&path), None, &log);
        let stats = parser.run().unwrap();

        assert_eq!(stats.records, 4);
        assert_eq!(stats.timestamps, 4);
        assert_eq!(stats.seq_errors, 0);
        assert_eq!(stats.illegal_types, 0);
        assert_eq!((stats.first_seq, stats.last_seq), (0, 3));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn gaps_are_reported_and_resynchronized() {
        let path = temp_path("gappy");
        write_capture(&path, &[0, 1, 5, 6, 2]);

        let log = logging::discard();
        let mut parser = Parser::new(params(&path), None, &log);
        let stats = parser.run().unwrap();

        // one jump forward, one jump backward
        assert_eq!(stats.seq_errors, 2);
        assert_eq!(stats.records, 5);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn edit_first_rewrites_a_gap_free_run() {
        let path = temp_path("edit");
        write_capture(&path, &[100, 101, 105, 106]);

        let log = logging::discard();
        let mut edit_params = params(&path);
        edit_params.expect_first_seq = 100;
        edit_params.edit_first_seq = Some(1);
        let mut parser = Parser::new(edit_params, None, &log);
        let stats = parser.run().unwrap();
        assert_eq!(stats.edited_records, 4);

        // the rewritten capture is gap-free from 1
        let mut reparse_params = params(&path);
        reparse_params.expect_first_seq = 1;
        let mut parser = Parser::new(reparse_params, None, &log);
        let stats = parser.run().unwrap();
        assert_eq!(stats.seq_errors, 0);
        assert_eq!(stats.records, 4);
        assert_eq!((stats.first_seq, stats.last_seq), (1, 4));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn edit_to_the_same_first_seq_is_a_noop() {
        let path = temp_path("edit-noop");
        write_capture(&path, &[0, 1, 2]);

        let log = logging::discard();
        let mut edit_params = params(&path);
        edit_params.edit_first_seq = Some(0);
        let mut parser = Parser::new(edit_params, None, &log);
        let stats = parser.run().unwrap();
        assert_eq!(stats.edited_records, 0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn foreign_message_types_count_as_illegal() {
        let path = temp_path("foreign");
        let (dst, src) = endpoints();
        let mut writer = PcapWriter::create(&path, dst, src).unwrap();

        let mut tick = OrderEvent::timestamp(0);
        tick.seq_num = 0;
        writer
            .add_record(0, 3, &encode_event(&tick).unwrap())
            .unwrap();

        // an order delete is valid on the wire but not generated here
        let mut payload = Vec::new();
        MoldHeader::new(1).write(&mut payload).unwrap();
        ItchMessage::OrderDelete {
            timestamp_ns: 5,
            ref_num: 9,
        }
        .write(&mut payload)
        .unwrap();
        writer.add_record(0, 4, &payload).unwrap();

        // an unknown discriminator altogether
        let mut payload = Vec::new();
        MoldHeader::new(2).write(&mut payload).unwrap();
        payload.extend_from_slice(&[0x5a, 0, 0, 0, 0]);
        writer.add_record(0, 5, &payload).unwrap();
        writer.finish().unwrap();

        let log = logging::discard();
        let mut parser = Parser::new(params(&path), None, &log);
        let stats = parser.run().unwrap();

        assert_eq!(stats.records, 3);
        assert_eq!(stats.timestamps, 1);
        assert_eq!(stats.illegal_types, 2);
        assert_eq!(stats.seq_errors, 0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn edit_time_shifts_record_headers() {
        let path = temp_path("edit-time");
        write_capture(&path, &[0, 1, 2]);

        let log = logging::discard();
        let mut edit_params = params(&path);
        edit_params.edit_time_sec = Some(100);
        let mut parser = Parser::new(edit_params, None, &log);
        let stats = parser.run().unwrap();
        assert_eq!(stats.edited_records, 3);

        let mut reader = PcapReader::open(&path, false).unwrap();
        for expect_sec in 100..103 {
            let record = reader.read_record().unwrap();
            assert_eq!(record.ts_sec, expect_sec);
        }

        std::fs::remove_file(&path).unwrap();
    }
}
