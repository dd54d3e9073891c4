//! Bucketed set of 32-bit keys addressed by multiple CRC polynomials.
//!
//! Every key hashes to one candidate bucket per polynomial; insertion goes to
//! the least occupied candidate, so the table stays usable at load factors a
//! single-hash scheme would not survive. Buckets hold a small fixed number of
//! inline slots and are scanned linearly.

use crate::crc::CrcPoly;

/// Inline slots per bucket.
pub const BUCKET_SLOTS: usize = 6;
/// Upper bound on the number of polynomials a table can be built with.
pub const MAX_POLY: usize = 3;
/// Default CRC width used by the stream tools.
pub const DEF_WIDTH: u32 = 20;
/// Default polynomial pair at [`DEF_WIDTH`].
pub const DEF_POLY: [u32; 2] = [0x0018_2671, 0x0011_522b];

/// Why an insertion did not take place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddError {
    /// The key is already present in one of its candidate buckets.
    Exists,
    /// All candidate buckets are at capacity.
    BucketOverflow,
    /// Every slot of the table is in use.
    ///
    /// Capacity is checked before the duplicate scan, so a full table
    /// reports `TableFull` even for a key that is already present.
    TableFull,
}

#[derive(Clone, Copy)]
struct Bucket {
    num: u32,
    vals: [u32; BUCKET_SLOTS],
}

impl Bucket {
    #[inline]
    fn slot_of(&self, val: u32) -> Option<usize> {
        self.vals[..self.num as usize].iter().position(|&v| v == val)
    }
}

/// Statistics snapshot of a [`DHashTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DHashStats {
    /// Keys currently stored.
    pub entries: u32,
    /// Highest bucket occupancy ever observed.
    pub bucket_abs_max: u32,
    /// `bucket_num[i]` counts buckets currently holding exactly `i` keys.
    pub bucket_num: [u32; BUCKET_SLOTS + 1],
}

pub struct DHashTable {
    polys: Vec<CrcPoly>,
    num_free: usize,
    bucket_abs_max: u32,
    buckets: Vec<Bucket>,
}

impl DHashTable {
    /// Builds an empty table of `2^width` buckets hashed by `polys`.
    pub fn new(width: u32, polys: &[u32]) -> DHashTable {
        assert!(
            !polys.is_empty() && polys.len() <= MAX_POLY,
            "between 1 and {} polynomials required",
            MAX_POLY
        );

        let polys: Vec<CrcPoly> = polys.iter().map(|&p| CrcPoly::new(p, width)).collect();
        let num_buckets = polys[0].num_values();

        DHashTable {
            polys,
            num_free: num_buckets * BUCKET_SLOTS,
            bucket_abs_max: 0,
            buckets: vec![
                Bucket {
                    num: 0,
                    vals: [0; BUCKET_SLOTS],
                };
                num_buckets
            ],
        }
    }

    /// Total slot capacity of the table.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len() * BUCKET_SLOTS
    }

    /// Keys currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.capacity() - self.num_free
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_free == self.capacity()
    }

    /// Inserts `val` into the least occupied of its candidate buckets.
    pub fn add(&mut self, val: u32) -> Result<(), AddError> {
        if self.num_free == 0 {
            return Err(AddError::TableFull);
        }

        let mut min_idx: Option<usize> = None;
        for poly in &self.polys {
            let idx = poly.calc_u32(val) as usize;
            let bucket = &self.buckets[idx];
            if bucket.slot_of(val).is_some() {
                return Err(AddError::Exists);
            }
            match min_idx {
                Some(m) if bucket.num >= self.buckets[m].num => {}
                _ => min_idx = Some(idx),
            }
        }

        let idx = min_idx.expect("at least one polynomial is configured");
        let bucket = &mut self.buckets[idx];
        if bucket.num as usize == BUCKET_SLOTS {
            return Err(AddError::BucketOverflow);
        }

        bucket.vals[bucket.num as usize] = val;
        bucket.num += 1;
        if bucket.num > self.bucket_abs_max {
            self.bucket_abs_max = bucket.num;
        }
        self.num_free -= 1;
        Ok(())
    }

    /// True when `val` is present in any candidate bucket.
    pub fn find(&self, val: u32) -> bool {
        self.polys
            .iter()
            .any(|poly| self.buckets[poly.calc_u32(val) as usize].slot_of(val).is_some())
    }

    /// Removes `val`, compacting its bucket. Returns false when absent.
    pub fn delete(&mut self, val: u32) -> bool {
        for p in 0..self.polys.len() {
            let idx = self.polys[p].calc_u32(val) as usize;
            let bucket = &mut self.buckets[idx];
            if let Some(slot) = bucket.slot_of(val) {
                let num = bucket.num as usize;
                bucket.vals.copy_within(slot + 1..num, slot);
                bucket.num -= 1;
                self.num_free += 1;
                return true;
            }
        }
        false
    }

    /// Clears every bucket without releasing storage. The all-time occupancy
    /// maximum is reset as well.
    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.num = 0;
        }
        self.num_free = self.capacity();
        self.bucket_abs_max = 0;
    }

    pub fn stats(&self) -> DHashStats {
        let mut bucket_num = [0u32; BUCKET_SLOTS + 1];
        for bucket in &self.buckets {
            bucket_num[bucket.num as usize] += 1;
        }
        DHashStats {
            entries: self.len() as u32,
            bucket_abs_max: self.bucket_abs_max,
            bucket_num,
        }
    }
}
