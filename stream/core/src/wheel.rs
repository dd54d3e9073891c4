//! Time-wheel scheduler: one ordered slot per 2^23 ns "unit", giving O(1)
//! amortized insertion for events that mostly arrive near the tail, and an
//! in-order drain.

use crate::event::{OrderEvent, UNIT_SHIFT};
use std::collections::VecDeque;

/// Extra seconds of slots reserved beyond the planned run time, covering
/// modify chains that outlive it.
const MARGIN_SECS: usize = 2;

pub struct TimeWheel {
    slots: Vec<VecDeque<Box<OrderEvent>>>,
    first_unit: usize,
    last_unit: usize,
    len: usize,
}

impl TimeWheel {
    /// A wheel with slots pre-reserved for `run_time_secs` of traffic.
    pub fn with_run_time(run_time_secs: u32) -> TimeWheel {
        let units = (run_time_secs as usize + MARGIN_SECS) << UNIT_SHIFT;
        TimeWheel {
            slots: Vec::with_capacity(units),
            first_unit: 0,
            last_unit: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Schedules an event. Within a slot, events keep non-decreasing
    /// `unit_time` order; an event equal to the tail goes after it.
    pub fn insert(&mut self, event: Box<OrderEvent>) {
        let unit = event.unit_id as usize;
        if unit >= self.slots.len() {
            self.slots.resize_with(unit + 1, VecDeque::new);
        }

        let slot = &mut self.slots[unit];
        let mut idx = slot.len();
        while idx > 0 && slot[idx - 1].unit_time > event.unit_time {
            idx -= 1;
        }
        slot.insert(idx, event);

        if self.len == 0 {
            self.first_unit = unit;
            self.last_unit = unit;
        } else {
            if unit > self.last_unit {
                self.last_unit = unit;
            }
            if unit < self.first_unit {
                self.first_unit = unit;
            }
        }
        self.len += 1;
    }

    /// Submits every scheduled event up to and including the pivot's time,
    /// then the pivot itself, in non-decreasing `(unit_id, unit_time)` order.
    /// The drain cursor advances to the pivot's unit.
    pub fn drain_until<F>(&mut self, pivot: Box<OrderEvent>, submit: &mut F)
    where
        F: FnMut(Box<OrderEvent>),
    {
        let pivot_unit = pivot.unit_id as usize;

        if self.len > 0 {
            let mut unit = self.first_unit;
            while unit < pivot_unit && unit < self.slots.len() {
                while let Some(event) = self.slots[unit].pop_front() {
                    self.len -= 1;
                    submit(event);
                }
                unit += 1;
            }
            if pivot_unit < self.slots.len() {
                while let Some(front) = self.slots[pivot_unit].front() {
                    if front.unit_time > pivot.unit_time {
                        break;
                    }
                    let event = self.slots[pivot_unit].pop_front().expect("front checked");
                    self.len -= 1;
                    submit(event);
                }
            }
        }

        self.first_unit = pivot_unit;
        if self.last_unit < pivot_unit {
            self.last_unit = pivot_unit;
        }
        submit(pivot);
    }

    /// Submits everything still scheduled, in order.
    pub fn drain_all<F>(&mut self, submit: &mut F)
    where
        F: FnMut(Box<OrderEvent>),
    {
        if self.len == 0 {
            return;
        }
        let end = self.last_unit.min(self.slots.len() - 1);
        for unit in self.first_unit..=end {
            while let Some(event) = self.slots[unit].pop_front() {
                self.len -= 1;
                submit(event);
            }
        }
        self.first_unit = self.last_unit;
        debug_assert_eq!(self.len, 0);
    }

    /// Emission time of the latest scheduled event, if any.
    pub fn last_time(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let mut unit = self.last_unit.min(self.slots.len() - 1);
        loop {
            if let Some(event) = self.slots[unit].back() {
                return Some(event.time);
            }
            if unit == self.first_unit {
                return None;
            }
            unit -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventBody, OrderEvent};

    fn event(time: f64) -> Box<OrderEvent> {
        Box::new(OrderEvent::new(
            time,
            None,
            0,
            0,
            0,
            EventBody::Cancel { shares: 1 },
        ))
    }

    fn drain_times_all(wheel: &mut TimeWheel) -> Vec<f64> {
        let mut out = Vec::new();
        wheel.drain_all(&mut |ev| out.push(ev.time));
        out
    }

    #[test]
    fn drain_all_is_sorted() {
        let mut wheel = TimeWheel::with_run_time(10);
        let times = [5.2, 0.001, 3.7, 3.700001, 0.5, 9.99, 0.0004];
        for &t in &times {
            wheel.insert(event(t));
        }
        assert_eq!(wheel.len(), times.len());

        let drained = drain_times_all(&mut wheel);
        let mut sorted = times.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(drained, sorted);
        assert!(wheel.is_empty());
    }

    #[test]
    fn drain_until_splits_at_the_pivot() {
        let mut wheel = TimeWheel::with_run_time(10);
        for &t in &[0.1, 0.2, 0.3, 0.4, 0.5] {
            wheel.insert(event(t));
        }

        let mut burst = Vec::new();
        wheel.drain_until(event(0.3), &mut |ev| burst.push(ev.time));
        // everything at or before the pivot, pivot last
        assert_eq!(burst, vec![0.1, 0.2, 0.3, 0.3]);
        assert_eq!(wheel.len(), 2);

        let rest = drain_times_all(&mut wheel);
        assert_eq!(rest, vec![0.4, 0.5]);
    }

    #[test]
    fn pivot_with_empty_wheel_is_submitted_alone() {
        let mut wheel = TimeWheel::with_run_time(1);
        let mut burst = Vec::new();
        wheel.drain_until(event(0.25), &mut |ev| burst.push(ev.time));
        assert_eq!(burst, vec![0.25]);
        assert!(wheel.is_empty());
    }

    #[test]
    fn equal_unit_times_keep_arrival_order() {
        let mut wheel = TimeWheel::with_run_time(1);
        let mut first = event(0.25);
        first.ref_num = 1;
        let mut second = event(0.25);
        second.ref_num = 2;
        wheel.insert(first);
        wheel.insert(second);

        let mut refs = Vec::new();
        wheel.drain_all(&mut |ev| refs.push(ev.ref_num));
        assert_eq!(refs, vec![1, 2]);
    }

    #[test]
    fn insert_before_cursor_is_recovered() {
        let mut wheel = TimeWheel::with_run_time(10);
        wheel.insert(event(5.0));

        let mut burst = Vec::new();
        wheel.drain_until(event(5.5), &mut |ev| burst.push(ev.time));
        assert_eq!(burst, vec![5.0, 5.5]);

        // a later insert below the drain cursor retracts it
        wheel.insert(event(2.0));
        let drained = drain_times_all(&mut wheel);
        assert_eq!(drained, vec![2.0]);
    }

    #[test]
    fn pivot_beyond_the_tail_drains_everything() {
        let mut wheel = TimeWheel::with_run_time(10);
        for &t in &[0.5, 1.5, 2.5] {
            wheel.insert(event(t));
        }
        let mut burst = Vec::new();
        wheel.drain_until(event(9.0), &mut |ev| burst.push(ev.time));
        assert_eq!(burst, vec![0.5, 1.5, 2.5, 9.0]);
        assert!(wheel.is_empty());
        assert_eq!(wheel.last_time(), None);
    }

    #[test]
    fn last_time_tracks_the_tail() {
        let mut wheel = TimeWheel::with_run_time(10);
        assert_eq!(wheel.last_time(), None);
        wheel.insert(event(1.5));
        assert_eq!(wheel.last_time(), Some(1.5));
        wheel.insert(event(7.25));
        assert_eq!(wheel.last_time(), Some(7.25));
        wheel.insert(event(3.0));
        assert_eq!(wheel.last_time(), Some(7.25));

        let mut sink = Vec::new();
        wheel.drain_all(&mut |ev| sink.push(ev));
        assert_eq!(wheel.last_time(), None);
    }

    #[test]
    fn growth_beyond_reserved_capacity() {
        let mut wheel = TimeWheel::with_run_time(1);
        wheel.insert(event(30.75));
        wheel.insert(event(0.5));
        let drained = drain_times_all(&mut wheel);
        assert_eq!(drained, vec![0.5, 30.75]);
    }
}
