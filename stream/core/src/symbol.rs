//! Trade symbols: fixed 8-byte zero-padded names with a per-symbol price
//! band chosen once at startup.

use crate::{GenError, GenResult};
use flow::logging::{self, Logger};
use flow::rand::{Rand, RandInterval};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

pub const SYMBOL_LEN: usize = wireline::itch::SYMBOL_LEN;
/// Significant name characters; longer tickers are rejected.
pub const MAX_NAME_CHARS: usize = 4;

const MIN_PRICE_LOW: u32 = 10;
const MIN_PRICE_HIGH: u32 = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSymbol {
    name: [u8; SYMBOL_LEN],
    pub min_price: u32,
    pub max_price: u32,
    pub auto_gen: bool,
}

impl TradeSymbol {
    fn with_name(name: [u8; SYMBOL_LEN], auto_gen: bool, rand: &mut Rand) -> TradeSymbol {
        let min_price = rand.int_range(MIN_PRICE_LOW, MIN_PRICE_HIGH);
        TradeSymbol {
            name,
            min_price,
            max_price: 3 * min_price,
            auto_gen,
        }
    }

    /// Symbol loaded from a file entry. `src_name` must be at most
    /// [`MAX_NAME_CHARS`] characters.
    pub fn from_name(src_name: &str, rand: &mut Rand) -> TradeSymbol {
        let mut name = [0u8; SYMBOL_LEN];
        let bytes = src_name.as_bytes();
        name[..bytes.len()].copy_from_slice(bytes);
        TradeSymbol::with_name(name, false, rand)
    }

    /// Autogenerated symbol: 3 or 4 capital letters.
    pub fn generate(rand: &mut Rand, len_dist: &[RandInterval]) -> TradeSymbol {
        let len = 3 + rand.choose(len_dist);
        let mut name = [0u8; SYMBOL_LEN];
        for slot in name.iter_mut().take(len) {
            *slot = rand.capital_letter();
        }
        TradeSymbol::with_name(name, true, rand)
    }

    /// The zero-padded 8-byte name as it goes on the wire.
    #[inline]
    pub fn wire_name(&self) -> [u8; SYMBOL_LEN] {
        self.name
    }

    /// Printable name with the padding stripped.
    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(SYMBOL_LEN);
        std::str::from_utf8(&self.name[..end]).unwrap_or("????")
    }

    /// First four name bytes packed big-endian, the key of the name hash.
    #[inline]
    pub fn name_u32(&self) -> u32 {
        name_bytes_u32(&self.name)
    }
}

/// Packs the first four bytes of a wire stock field big-endian.
#[inline]
pub fn name_bytes_u32(name: &[u8; SYMBOL_LEN]) -> u32 {
    u32::from_be_bytes([name[0], name[1], name[2], name[3]])
}

/// The 80/20 split between 3- and 4-letter autogenerated names.
pub fn name_len_intervals() -> Vec<RandInterval> {
    RandInterval::build(&[80, 20])
}

/// A symbol list loaded from disk.
pub struct SymbolFile {
    pub symbols: Vec<Arc<TradeSymbol>>,
    pub num_lines: u32,
    pub num_warnings: u32,
}

/// Reads a symbol file: one symbol per line, ticker in the first
/// comma-separated field, everything after the first comma ignored.
/// Malformed or overlong entries are warned about and skipped.
pub fn read_symbol_file<P: AsRef<Path>>(
    path: P,
    rand: &mut Rand,
    log: &Logger,
) -> GenResult<SymbolFile> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut out = SymbolFile {
        symbols: Vec::new(),
        num_lines: 0,
        num_warnings: 0,
    };

    for line in reader.lines() {
        let line = line?;
        out.num_lines += 1;
        let line = line.trim_end_matches(|c| c == '\n' || c == '\r');

        let ticker = match line.find(',') {
            Some(comma) => &line[..comma],
            None => {
                logging::warn!(log, "unexpected symbol line format";
                               "file" => %path.display(),
                               "line" => out.num_lines,
                               "text" => line);
                out.num_warnings += 1;
                continue;
            }
        };

        if ticker.is_empty() || ticker.len() > MAX_NAME_CHARS {
            logging::warn!(log, "symbol name not between 1 and 4 chars, skipped";
                           "file" => %path.display(),
                           "line" => out.num_lines,
                           "name" => ticker);
            out.num_warnings += 1;
            continue;
        }

        out.symbols.push(Arc::new(TradeSymbol::from_name(ticker, rand)));
    }

    if out.symbols.is_empty() {
        return Err(GenError::InvalidArgument(format!(
            "{}: no usable symbols",
            path.display()
        )));
    }
    Ok(out)
}
