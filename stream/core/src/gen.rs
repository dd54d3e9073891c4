//! Order-lifecycle event generation: for every arriving order the full
//! modify chain is scheduled into the time wheel up front, then the wheel is
//! drained up to the order itself and the burst handed to the writer thread
//! as one batch.

use crate::event::{EventBody, OrderEvent};
use crate::squeue::SyncQueue;
use crate::stats::GenStats;
use crate::symbol::TradeSymbol;
use crate::wheel::TimeWheel;
use crate::{GenError, GenResult};
use flow::dhash::{AddError, DHashStats, DHashTable, DEF_POLY, DEF_WIDTH};
use flow::logging::{self, Logger};
use flow::rand::{Rand, RandInterval};
use std::mem;
use std::sync::Arc;

/// Orders are sized in lots of ten shares, 1 to 250 lots.
const SHARE_LOT: u32 = 10;
const MAX_LOTS: u32 = 250;
/// An execution prints at up to this much below the displayed price.
const EXEC_DISCOUNT_MAX: u32 = 9;

const OUTCOME_EXEC: usize = 0;
const OUTCOME_CANCEL: usize = 1;
const OUTCOME_REPLACE: usize = 2;

/// How order reference numbers are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefMode {
    Random,
    Sequential { first: u32 },
}

#[derive(Debug, Clone)]
pub struct GenParams {
    /// Planned stream duration, seconds.
    pub run_time: u32,
    /// Order arrival rate, orders/second.
    pub rate: u32,
    /// Orders to generate; ties `run_time` and `rate` together.
    pub num_orders: u64,
    /// Mean delay between an order and its next modify, milliseconds.
    pub mean_time2update_ms: u32,
    /// Lower bound on that delay, milliseconds.
    pub min_time2update_ms: u32,
    pub prob_exec: u32,
    pub prob_cancel: u32,
    pub prob_replace: u32,
    pub ref_mode: RefMode,
    pub first_seq: u64,
    /// Keep every allocated reference in the hash for the whole run.
    pub no_hash_del: bool,
    /// Percentage of orders drawn from the subscription pool; 0 disables it.
    pub subscr_ratio: u32,
    /// Print every submitted event to stdout.
    pub verbose: bool,
}

/// Outcome of a finished generator run.
#[derive(Debug, Clone, Copy)]
pub struct GenReport {
    pub stats: GenStats,
    pub dhash: DHashStats,
    pub seed: u64,
}

struct RefAllocator {
    dhash: DHashTable,
    mode: RefMode,
    next_ref: u32,
    overflows: u32,
}

impl RefAllocator {
    fn new(mode: RefMode) -> RefAllocator {
        RefAllocator {
            dhash: DHashTable::new(DEF_WIDTH, &DEF_POLY),
            mode,
            next_ref: match mode {
                RefMode::Random => 0,
                RefMode::Sequential { first } => first,
            },
            overflows: 0,
        }
    }

    /// Draws candidates until one takes a hash slot. A collision or a bucket
    /// overflow just means another candidate; only a full table is fatal.
    fn alloc(&mut self, rand: &mut Rand) -> GenResult<u32> {
        loop {
            let candidate = match self.mode {
                RefMode::Random => rand.uint32(),
                RefMode::Sequential { .. } => {
                    let candidate = self.next_ref;
                    self.next_ref = self.next_ref.wrapping_add(1);
                    candidate
                }
            };
            match self.dhash.add(candidate) {
                Ok(()) => return Ok(candidate),
                Err(AddError::Exists) => {}
                Err(AddError::BucketOverflow) => self.overflows += 1,
                Err(AddError::TableFull) => return Err(GenError::RefSpaceExhausted),
            }
        }
    }

    #[inline]
    fn release(&mut self, ref_num: u32) {
        self.dhash.delete(ref_num);
    }
}

pub struct Generator {
    params: GenParams,
    symbols: Vec<Arc<TradeSymbol>>,
    subscription: Vec<Arc<TradeSymbol>>,
    rand: Rand,
    seed: u64,
    refs: RefAllocator,
    wheel: TimeWheel,
    outcome_dist: Vec<RandInterval>,
    subscr_dist: Option<Vec<RandInterval>>,
    stats: GenStats,
    seq_num: u64,
    match_num: u64,
    cur_time: f64,
    /// Next whole second still needing a timestamp event.
    num_seconds: u32,
    drained: Vec<Box<OrderEvent>>,
    accum: Vec<Box<OrderEvent>>,
    log: Logger,
}

impl Generator {
    pub fn new(
        params: GenParams,
        symbols: Vec<Arc<TradeSymbol>>,
        subscription: Vec<Arc<TradeSymbol>>,
        rand: Rand,
        seed: u64,
        log: &Logger,
    ) -> Generator {
        assert!(!symbols.is_empty(), "main symbol pool may not be empty");
        assert!(
            params.subscr_ratio == 0 || !subscription.is_empty(),
            "subscription ratio configured without a subscription pool"
        );

        let mut outcome_pcts = [0u32; 3];
        outcome_pcts[OUTCOME_EXEC] = params.prob_exec;
        outcome_pcts[OUTCOME_CANCEL] = params.prob_cancel;
        outcome_pcts[OUTCOME_REPLACE] = params.prob_replace;
        let outcome_dist = RandInterval::build(&outcome_pcts);
        let subscr_dist = if params.subscr_ratio > 0 {
            Some(RandInterval::build(&[
                params.subscr_ratio,
                100 - params.subscr_ratio,
            ]))
        } else {
            None
        };

        Generator {
            refs: RefAllocator::new(params.ref_mode),
            wheel: TimeWheel::with_run_time(params.run_time),
            outcome_dist,
            subscr_dist,
            stats: GenStats::default(),
            seq_num: params.first_seq,
            match_num: 0,
            cur_time: 0.0,
            num_seconds: 0,
            drained: Vec::new(),
            accum: Vec::new(),
            log: log.new(logging::o!()),
            params,
            symbols,
            subscription,
            rand,
            seed,
        }
    }

    /// Generates the whole stream, handing bursts to `queue`, and shuts the
    /// queue down when done (also on failure, so the consumer always exits).
    pub fn run(mut self, queue: &SyncQueue<Box<OrderEvent>>) -> GenResult<GenReport> {
        let result = self.run_inner(queue);
        queue.shutdown();
        result.map(|()| GenReport {
            stats: {
                let mut stats = self.stats;
                stats.bucket_overflows = self.refs.overflows;
                stats
            },
            dhash: self.refs.dhash.stats(),
            seed: self.seed,
        })
    }

    fn run_inner(&mut self, queue: &SyncQueue<Box<OrderEvent>>) -> GenResult<()> {
        logging::debug!(self.log, "generation started";
                        "orders" => self.params.num_orders,
                        "rate" => self.params.rate,
                        "run_time" => self.params.run_time);

        for _ in 0..self.params.num_orders {
            self.cur_time += self.rand.exp_by_rate(f64::from(self.params.rate));
            self.cover_seconds_through(self.cur_time);
            let order = self.make_order()?;
            self.flush_until(order, queue);
        }

        // Modify chains can outlive the last order; keep the second ticks
        // covering them before the final drain.
        if let Some(tail) = self.wheel.last_time() {
            self.cover_seconds_through(tail);
        }

        let mut drained = mem::replace(&mut self.drained, Vec::new());
        self.wheel.drain_all(&mut |ev| drained.push(ev));
        for mut event in drained.drain(..) {
            self.submit(&mut event);
            self.accum.push(event);
        }
        self.drained = drained;
        queue.push_list(&mut self.accum);

        logging::debug!(self.log, "generation finished"; "events" => self.stats.total_events());
        Ok(())
    }

    /// Inserts one timestamp event per whole second up to and including
    /// `trunc(time)`.
    fn cover_seconds_through(&mut self, time: f64) {
        while f64::from(self.num_seconds) <= time {
            self.wheel
                .insert(Box::new(OrderEvent::timestamp(self.num_seconds)));
            self.num_seconds += 1;
        }
    }

    /// Creates the next ADD order and schedules its entire modify chain.
    fn make_order(&mut self) -> GenResult<Box<OrderEvent>> {
        let symbol = self.pick_symbol();
        let ref_num = self.refs.alloc(&mut self.rand)?;
        let shares = SHARE_LOT * self.rand.int_range(1, MAX_LOTS);
        let price = self.rand.int_range(symbol.min_price, symbol.max_price);
        let buy = self.rand.int_range(0, 1) != 0;

        let order = Box::new(OrderEvent::new(
            self.cur_time,
            Some(symbol),
            u64::from(ref_num),
            shares,
            price,
            EventBody::Add { shares, price, buy },
        ));
        self.schedule_modify_chain(&order)?;
        Ok(order)
    }

    /// Walks an order to its close: replaces keep the chain alive under a
    /// fresh reference, an exec or cancel always takes the full remainder.
    fn schedule_modify_chain(&mut self, order: &OrderEvent) -> GenResult<()> {
        let symbol = order.symbol.clone();
        let mean = 0.001 * f64::from(self.params.mean_time2update_ms);
        let floor = 0.001 * f64::from(self.params.min_time2update_ms);

        let mut time = order.time;
        let mut ref_num = order.ref_num;
        let mut remain = order.remain_shares;
        let mut price = order.cur_price;

        while remain > 0 {
            time += floor.max(self.rand.exp_by_mean(mean - floor));

            let event = match self.rand.choose(&self.outcome_dist) {
                OUTCOME_EXEC => {
                    let exec_price = price - self.rand.int_range(0, EXEC_DISCOUNT_MAX);
                    self.match_num += 1;
                    let shares = remain;
                    remain = 0;
                    OrderEvent::new(
                        time,
                        symbol.clone(),
                        ref_num,
                        0,
                        exec_price,
                        EventBody::Exec {
                            shares,
                            price: exec_price,
                            match_num: self.match_num,
                        },
                    )
                }
                OUTCOME_CANCEL => {
                    let shares = remain;
                    remain = 0;
                    OrderEvent::new(
                        time,
                        symbol.clone(),
                        ref_num,
                        0,
                        price,
                        EventBody::Cancel { shares },
                    )
                }
                _ => {
                    let new_ref = u64::from(self.refs.alloc(&mut self.rand)?);
                    let new_shares = SHARE_LOT * self.rand.int_range(1, MAX_LOTS);
                    let new_price = match &symbol {
                        Some(sym) => self.rand.int_range(sym.min_price, sym.max_price),
                        None => price,
                    };
                    let orig_ref_num = ref_num;
                    ref_num = new_ref;
                    remain = new_shares;
                    price = new_price;
                    OrderEvent::new(
                        time,
                        symbol.clone(),
                        new_ref,
                        new_shares,
                        new_price,
                        EventBody::Replace {
                            shares: new_shares,
                            price: new_price,
                            orig_ref_num,
                        },
                    )
                }
            };
            self.wheel.insert(Box::new(event));
        }
        Ok(())
    }

    fn pick_symbol(&mut self) -> Arc<TradeSymbol> {
        if let Some(dist) = &self.subscr_dist {
            if self.rand.choose(dist) == 0 {
                self.stats.subscr_orders += 1;
                let idx = self
                    .rand
                    .int_range(0, (self.subscription.len() - 1) as u32);
                return self.subscription[idx as usize].clone();
            }
        }
        let idx = self.rand.int_range(0, (self.symbols.len() - 1) as u32);
        self.symbols[idx as usize].clone()
    }

    /// Drains the wheel through `order`, submits the burst and pushes it to
    /// the writer as one batch.
    fn flush_until(&mut self, order: Box<OrderEvent>, queue: &SyncQueue<Box<OrderEvent>>) {
        let mut drained = mem::replace(&mut self.drained, Vec::new());
        self.wheel.drain_until(order, &mut |ev| drained.push(ev));
        for mut event in drained.drain(..) {
            self.submit(&mut event);
            self.accum.push(event);
        }
        self.drained = drained;
        queue.push_list(&mut self.accum);
    }

    /// Stamps the sequence number, accounts the event and retires an ADD's
    /// reference. Only the ADD submit releases a reference, so the reference
    /// taken over by a replace stays in the hash for the rest of the run.
    fn submit(&mut self, event: &mut OrderEvent) {
        event.seq_num = self.seq_num;
        self.seq_num += 1;

        match event.body {
            EventBody::Add { .. } => {
                self.stats.orders += 1;
                if !self.params.no_hash_del {
                    self.refs.release(event.ref_num as u32);
                }
            }
            EventBody::Exec { .. } => self.stats.execs += 1,
            EventBody::Cancel { .. } => self.stats.cancels += 1,
            EventBody::Replace { .. } => self.stats.replaces += 1,
            EventBody::Timestamp { .. } => self.stats.timestamps += 1,
        }

        if self.params.verbose {
            println!("gen {} {}", event.seq_num, event);
        }
        logging::trace!(self.log, "submit";
                        "seq" => event.seq_num,
                        "type" => event.body.type_str(),
                        "ref" => event.ref_num);
    }
}
