//! End-of-run counters for the generator, writer and parser, with the
//! stdout report blocks the binaries print.

use flow::dhash::{DHashStats, BUCKET_SLOTS};

/// Counters owned by the generator thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenStats {
    pub orders: u64,
    pub execs: u64,
    pub cancels: u64,
    pub replaces: u64,
    pub timestamps: u64,
    pub subscr_orders: u64,
    pub bucket_overflows: u32,
}

impl GenStats {
    /// Total events submitted to the writer.
    pub fn total_events(&self) -> u64 {
        self.orders + self.execs + self.cancels + self.replaces + self.timestamps
    }

    pub fn print(&self, dhash: &DHashStats) {
        println!("\nstatistics:");
        println!(
            "\torders:{} exec:{} cancel:{} replace:{} timestamps:{}",
            self.orders, self.execs, self.cancels, self.replaces, self.timestamps
        );
        if self.subscr_orders > 0 {
            println!(
                "\tsubscribed orders: {} ({:.1}%)",
                self.subscr_orders,
                (self.subscr_orders as f64 * 100.0) / self.orders.max(1) as f64
            );
        }
        print_dhash(dhash, self.bucket_overflows);
    }
}

/// Counters owned by the writer thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    pub records: u64,
    pub payload_bytes: u64,
}

/// Counters accumulated by the parser.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub records: u64,
    pub orders: u64,
    pub execs: u64,
    pub cancels: u64,
    pub replaces: u64,
    pub timestamps: u64,
    pub subscr_orders: u64,
    pub subscr_execs: u64,
    pub subscr_cancels: u64,
    pub subscr_replaces: u64,
    pub unsubscr_orders: u64,
    pub seq_errors: u64,
    pub illegal_types: u64,
    pub bad_msg_cnt: u64,
    pub bucket_overflows: u32,
    pub first_seq: u64,
    pub last_seq: u64,
    pub edited_records: u64,
}

impl ParseStats {
    pub fn print(&self, dhash: &DHashStats, num_subscr_symbols: Option<u32>) {
        println!("\nstatistics:");
        println!(
            "\trecords:{} orders:{} exec:{} cancel:{} replace:{} timestamps:{}",
            self.records, self.orders, self.execs, self.cancels, self.replaces, self.timestamps
        );
        print_dhash(dhash, self.bucket_overflows);
        println!(
            "\tseq.nums: {} - {}, seq.errors: {}, illegal msg.types: {}, bad msg counts: {}",
            self.first_seq, self.last_seq, self.seq_errors, self.illegal_types, self.bad_msg_cnt
        );
        if self.edited_records > 0 {
            println!("\trewritten records: {}", self.edited_records);
        }
        if let Some(num_symbols) = num_subscr_symbols {
            if self.orders > 0 {
                let pct = |part: u64| (part as f64 * 100.0) / self.orders as f64;
                println!("\tsubscription symbols: {}", num_symbols);
                println!(
                    "\torders: {}, subscribed: {} ({:3.1}%), unsubscribed: {} ({:3.1}%)",
                    self.orders,
                    self.subscr_orders,
                    pct(self.subscr_orders),
                    self.unsubscr_orders,
                    pct(self.unsubscr_orders)
                );
                println!("\texecs: {}, subscribed: {}", self.execs, self.subscr_execs);
                println!("\tcancels: {}, subscribed: {}", self.cancels, self.subscr_cancels);
                println!("\treplaces: {}, subscribed: {}", self.replaces, self.subscr_replaces);
            }
        }
    }
}

fn print_dhash(dhash: &DHashStats, overflows: u32) {
    println!(
        "\thash table entries:{}, bucket all-times-max:{}, overflows:{}",
        dhash.entries, dhash.bucket_abs_max, overflows
    );
    print!("\tbucket ");
    for i in 0..=BUCKET_SLOTS {
        print!("num[{}]:{} ", i, dhash.bucket_num[i]);
    }
    println!("\n");
}
