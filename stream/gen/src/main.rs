//! moldgen: synthesizes an ITCH order stream framed in MoldUDP64 over
//! Ethernet/IPv4/UDP and writes it as a pcap capture.

use clap::{App, Arg, ArgMatches};
use flow::logging;
use flow::rand::Rand;
use std::net::Ipv4Addr;
use std::process;
use std::sync::Arc;
use std::thread;
use streamcore::config::NetConfig;
use streamcore::gen::{GenParams, Generator, RefMode};
use streamcore::squeue::SyncQueue;
use streamcore::symbol::{read_symbol_file, TradeSymbol};
use streamcore::writer::run_writer;
use streamcore::{GenError, GenResult};
use wireline::ether::EndpointAddr;
use wireline::pcap::PcapWriter;

const DEFAULT_FILE: &str = "moldgen.pcap";
const DEFAULT_MIN_TIME2UPD: u32 = 10;
const PORT_MIN: u16 = 1024;

fn main() {
    let matches = parse_or_exit(cli());
    if let Err(err) = run(&matches) {
        eprintln!("moldgen: {}", err);
        process::exit(err.exit_code());
    }
}

/// Lets clap print help/version, but turns argument errors into the
/// errno-style exit code.
fn parse_or_exit<'a>(app: App<'a, '_>) -> ArgMatches<'a> {
    app.get_matches_safe().unwrap_or_else(|err| match err.kind {
        clap::ErrorKind::HelpDisplayed | clap::ErrorKind::VersionDisplayed => err.exit(),
        _ => {
            eprintln!("{}", err.message);
            process::exit(22);
        }
    })
}

fn cli<'a, 'b>() -> App<'a, 'b> {
    App::new("moldgen")
        .version(env!("CARGO_PKG_VERSION"))
        .about("ITCH/MoldUDP64 stream generator, output to a pcap capture")
        .arg(
            Arg::with_name("symbol-file")
                .long("symbol-file")
                .short("s")
                .takes_value(true)
                .required(true)
                .help("file with one trade symbol per line"),
        )
        .arg(
            Arg::with_name("run-time")
                .long("run-time")
                .short("t")
                .takes_value(true)
                .help("stream duration, seconds"),
        )
        .arg(
            Arg::with_name("orders-rate")
                .long("orders-rate")
                .short("r")
                .takes_value(true)
                .help("order arrival rate, orders/sec, suffixes [kKmM] supported"),
        )
        .arg(
            Arg::with_name("orders-num")
                .long("orders-num")
                .short("n")
                .takes_value(true)
                .help("total number of orders; any two of -t/-r/-n imply the third"),
        )
        .arg(
            Arg::with_name("time2update")
                .long("time2update")
                .short("u")
                .takes_value(true)
                .required(true)
                .help("mean delay until an order's next modify, msec"),
        )
        .arg(
            Arg::with_name("min-time2upd")
                .long("min-time2upd")
                .takes_value(true)
                .help("lower bound on the modify delay, msec (default 10)"),
        )
        .arg(
            Arg::with_name("list-file")
                .long("list-file")
                .short("L")
                .takes_value(true)
                .help("subscription symbol list"),
        )
        .arg(
            Arg::with_name("list-ratio")
                .long("list-ratio")
                .takes_value(true)
                .help("percent of orders drawn from the subscription list"),
        )
        .arg(
            Arg::with_name("prob-exec")
                .long("prob-exec")
                .short("E")
                .takes_value(true)
                .help("probability of execution, percent"),
        )
        .arg(
            Arg::with_name("prob-cancel")
                .long("prob-cancel")
                .short("C")
                .takes_value(true)
                .help("probability of cancel, percent"),
        )
        .arg(
            Arg::with_name("prob-replace")
                .long("prob-replace")
                .short("U")
                .takes_value(true)
                .help("probability of replace, percent; missing one of -E/-C/-U fills to 100"),
        )
        .arg(Arg::with_name("dst-mac").long("dst-mac").takes_value(true).help("destination MAC"))
        .arg(Arg::with_name("src-mac").long("src-mac").takes_value(true).help("source MAC"))
        .arg(Arg::with_name("dst-ip").long("dst-ip").takes_value(true).help("destination IPv4 address"))
        .arg(Arg::with_name("src-ip").long("src-ip").takes_value(true).help("source IPv4 address"))
        .arg(Arg::with_name("dst-port").long("dst-port").takes_value(true).help("destination UDP port (1024-65535)"))
        .arg(Arg::with_name("src-port").long("src-port").takes_value(true).help("source UDP port (1024-65535)"))
        .arg(
            Arg::with_name("net-config")
                .long("net-config")
                .takes_value(true)
                .help("TOML file supplying the six endpoint values; flags override it"),
        )
        .arg(
            Arg::with_name("file")
                .long("file")
                .short("f")
                .takes_value(true)
                .help("output capture file (default moldgen.pcap)"),
        )
        .arg(
            Arg::with_name("seq")
                .long("seq")
                .short("Q")
                .help("sequential reference numbers, default random"),
        )
        .arg(
            Arg::with_name("first-ref")
                .long("first-ref")
                .takes_value(true)
                .help("first sequential reference number"),
        )
        .arg(
            Arg::with_name("first-seq")
                .long("first-seq")
                .takes_value(true)
                .help("first MoldUDP64 sequence number"),
        )
        .arg(
            Arg::with_name("rand-seed")
                .long("rand-seed")
                .short("R")
                .takes_value(true)
                .help("random seed, default taken from the clock"),
        )
        .arg(
            Arg::with_name("no-hash-del")
                .long("no-hash-del")
                .help("keep reference numbers hashed for the whole run"),
        )
        .arg(Arg::with_name("debug").long("debug").short("d").help("produce debug information"))
        .arg(Arg::with_name("verbose").long("verbose").short("v").help("print every submitted event"))
}

fn run(matches: &ArgMatches<'_>) -> GenResult<()> {
    let severity = logging::severity_from_flags(
        matches.is_present("debug"),
        matches.is_present("verbose"),
    );
    let log = logging::init(severity);

    let seed_arg = opt_u64(matches, "rand-seed")?;
    let (mut rand, seed) = Rand::from_seed(seed_arg);

    let symbols = read_symbol_file(matches.value_of("symbol-file").unwrap(), &mut rand, &log)?;

    let (subscription, subscr_ratio) = resolve_subscription(matches, &mut rand, &log)?;

    let (run_time, rate, num_orders) = resolve_timing(
        opt_u64(matches, "run-time")?,
        opt_rate(matches)?,
        opt_u64(matches, "orders-num")?,
    )?;

    let (prob_exec, prob_cancel, prob_replace) = resolve_probs(
        opt_pct(matches, "prob-exec")?,
        opt_pct(matches, "prob-cancel")?,
        opt_pct(matches, "prob-replace")?,
    )?;

    let mean_time2update_ms = req_u32_gt(matches, "time2update", 0)?;
    let min_time2update_ms = match opt_u64(matches, "min-time2upd")? {
        Some(v) if v > 0 && v < u64::from(mean_time2update_ms) => v as u32,
        Some(v) => {
            return Err(GenError::InvalidArgument(format!(
                "--min-time2upd value '{}' must be positive and below --time2update",
                v
            )))
        }
        None => DEFAULT_MIN_TIME2UPD,
    };

    let (dst, src) = resolve_endpoints(matches)?;

    let ref_mode = if matches.is_present("seq") {
        let first = match opt_u64(matches, "first-ref")? {
            Some(v) if v <= u64::from(u32::max_value()) => v as u32,
            Some(v) => {
                return Err(GenError::InvalidArgument(format!(
                    "--first-ref value '{}' out of range",
                    v
                )))
            }
            None => 0,
        };
        RefMode::Sequential { first }
    } else {
        if matches.is_present("first-ref") {
            return Err(GenError::InvalidArgument(
                "--first-ref only makes sense with --seq".to_string(),
            ));
        }
        RefMode::Random
    };

    let params = GenParams {
        run_time,
        rate,
        num_orders,
        mean_time2update_ms,
        min_time2update_ms,
        prob_exec,
        prob_cancel,
        prob_replace,
        ref_mode,
        first_seq: opt_u64(matches, "first-seq")?.unwrap_or(0),
        no_hash_del: matches.is_present("no-hash-del"),
        subscr_ratio,
        verbose: matches.is_present("verbose"),
    };

    let file = matches.value_of("file").unwrap_or(DEFAULT_FILE).to_string();

    println!("moldgen args:");
    println!(
        "\tsymbols: {} main, {} subscription (ratio {}%)",
        symbols.symbols.len(),
        subscription.len(),
        subscr_ratio
    );
    println!(
        "\trun time: {} sec, rate: {} orders/sec, orders: {}",
        run_time, rate, num_orders
    );
    println!(
        "\ttime2update: mean {} msec, min {} msec",
        mean_time2update_ms, min_time2update_ms
    );
    println!(
        "\tprobability of exec: {}% cancel: {}% replace: {}%",
        prob_exec, prob_cancel, prob_replace
    );
    match params.ref_mode {
        RefMode::Random => println!("\trefs: random, first seq: {}", params.first_seq),
        RefMode::Sequential { first } => {
            println!("\trefs: sequential from {}, first seq: {}", first, params.first_seq)
        }
    }
    println!("\tseed: {}", seed);
    println!("\tfile: {}", file);

    let pcap = PcapWriter::create(&file, dst, src)?;
    let queue = Arc::new(SyncQueue::new());
    let writer_q = queue.clone();
    let writer_log = log.clone();
    let writer = thread::Builder::new()
        .name("writer".to_string())
        .spawn(move || run_writer(&writer_q, pcap, &writer_log))?;

    let generator = Generator::new(
        params,
        symbols.symbols,
        subscription,
        rand,
        seed,
        &log,
    );
    let gen_result = generator.run(&queue);
    let writer_result = writer.join().expect("writer thread panicked");

    let report = gen_result?;
    let wstats = writer_result?;

    report.stats.print(&report.dhash);
    println!(
        "\trecords written: {}, payload bytes: {}",
        wstats.records, wstats.payload_bytes
    );
    Ok(())
}

fn resolve_subscription(
    matches: &ArgMatches<'_>,
    rand: &mut Rand,
    log: &logging::Logger,
) -> GenResult<(Vec<Arc<TradeSymbol>>, u32)> {
    match (matches.value_of("list-file"), matches.value_of("list-ratio")) {
        (None, None) => Ok((Vec::new(), 0)),
        (Some(_), None) | (None, Some(_)) => Err(GenError::InvalidArgument(
            "--list-file and --list-ratio must be supplied together".to_string(),
        )),
        (Some(path), Some(ratio_text)) => {
            let ratio = parse_pct("list-ratio", ratio_text)?;
            if ratio == 0 {
                return Err(GenError::InvalidArgument(
                    "--list-ratio must be positive".to_string(),
                ));
            }
            let list = read_symbol_file(path, rand, log)?;
            Ok((list.symbols, ratio))
        }
    }
}

/// Any two of duration, rate and order count imply the third; all three must
/// agree when supplied.
fn resolve_timing(
    run_time: Option<u64>,
    rate: Option<u64>,
    num: Option<u64>,
) -> GenResult<(u32, u32, u64)> {
    let (t, r, n) = match (run_time, rate, num) {
        (Some(t), Some(r), Some(n)) => {
            if t * r != n {
                return Err(GenError::InvalidArgument(format!(
                    "--run-time {} * --orders-rate {} does not equal --orders-num {}",
                    t, r, n
                )));
            }
            (t, r, n)
        }
        (Some(t), Some(r), None) => (t, r, t * r),
        (Some(t), None, Some(n)) => {
            let r = n / t;
            if r == 0 {
                return Err(GenError::InvalidArgument(
                    "--orders-num divided by --run-time yields a zero rate".to_string(),
                ));
            }
            (t, r, n)
        }
        (None, Some(r), Some(n)) => ((n + r - 1) / r, r, n),
        _ => {
            return Err(GenError::InvalidArgument(
                "supply at least two of --run-time, --orders-rate, --orders-num".to_string(),
            ))
        }
    };

    if t == 0 || r == 0 || n == 0 {
        return Err(GenError::InvalidArgument(
            "--run-time, --orders-rate and --orders-num must be positive".to_string(),
        ));
    }
    if t > u64::from(u32::max_value()) || r > u64::from(u32::max_value()) {
        return Err(GenError::InvalidArgument(
            "--run-time or --orders-rate out of range".to_string(),
        ));
    }
    Ok((t.max(1) as u32, r as u32, n))
}

fn resolve_probs(
    exec: Option<u32>,
    cancel: Option<u32>,
    replace: Option<u32>,
) -> GenResult<(u32, u32, u32)> {
    let given = exec.is_some() as u32 + cancel.is_some() as u32 + replace.is_some() as u32;
    let (e, c, r) = match given {
        3 => {
            let (e, c, r) = (exec.unwrap(), cancel.unwrap(), replace.unwrap());
            if e + c + r != 100 {
                return Err(GenError::InvalidArgument(
                    "the three probability arguments do not sum up to 100%".to_string(),
                ));
            }
            (e, c, r)
        }
        2 => {
            let partial = exec.unwrap_or(0) + cancel.unwrap_or(0) + replace.unwrap_or(0);
            if partial > 100 {
                return Err(GenError::InvalidArgument(
                    "the two probability arguments exceed 100%".to_string(),
                ));
            }
            (
                exec.unwrap_or(100 - partial),
                cancel.unwrap_or(100 - partial),
                replace.unwrap_or(100 - partial),
            )
        }
        _ => {
            return Err(GenError::InvalidArgument(
                "supply at least 2 of 3 probability arguments (-E, -C, -U)".to_string(),
            ))
        }
    };

    if r == 100 {
        return Err(GenError::InvalidArgument(
            "replace probability of 100% never closes an order".to_string(),
        ));
    }
    Ok((e, c, r))
}

fn resolve_endpoints(matches: &ArgMatches<'_>) -> GenResult<(EndpointAddr, EndpointAddr)> {
    let config = match matches.value_of("net-config") {
        Some(path) => Some(NetConfig::load(path)?),
        None => None,
    };
    let config = config.as_ref();

    let text_field = |flag: &str, from_cfg: Option<&String>| -> GenResult<String> {
        matches
            .value_of(flag)
            .map(str::to_string)
            .or_else(|| from_cfg.cloned())
            .ok_or_else(|| {
                GenError::InvalidArgument(format!("--{} required (flag or --net-config)", flag))
            })
    };

    let dst_mac = parse_mac("dst-mac", &text_field("dst-mac", config.and_then(|c| c.dst_mac.as_ref()))?)?;
    let src_mac = parse_mac("src-mac", &text_field("src-mac", config.and_then(|c| c.src_mac.as_ref()))?)?;
    let dst_ip = parse_ipv4("dst-ip", &text_field("dst-ip", config.and_then(|c| c.dst_ip.as_ref()))?)?;
    let src_ip = parse_ipv4("src-ip", &text_field("src-ip", config.and_then(|c| c.src_ip.as_ref()))?)?;

    let port_field = |flag: &str, from_cfg: Option<u16>| -> GenResult<u16> {
        let port = match matches.value_of(flag) {
            Some(text) => text.parse::<u16>().map_err(|_| {
                GenError::InvalidArgument(format!("--{} value '{}' invalid", flag, text))
            })?,
            None => from_cfg.ok_or_else(|| {
                GenError::InvalidArgument(format!("--{} required (flag or --net-config)", flag))
            })?,
        };
        if port < PORT_MIN {
            return Err(GenError::InvalidArgument(format!(
                "--{} value {} below {}",
                flag, port, PORT_MIN
            )));
        }
        Ok(port)
    };
    let dst_port = port_field("dst-port", config.and_then(|c| c.dst_port))?;
    let src_port = port_field("src-port", config.and_then(|c| c.src_port))?;

    Ok((
        EndpointAddr {
            mac: dst_mac,
            ip: dst_ip,
            port: dst_port,
        },
        EndpointAddr {
            mac: src_mac,
            ip: src_ip,
            port: src_port,
        },
    ))
}

fn parse_mac(flag: &str, text: &str) -> GenResult<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = 0;
    for (i, part) in text.split(':').enumerate() {
        if i >= 6 {
            parts = 7;
            break;
        }
        mac[i] = u8::from_str_radix(part, 16).map_err(|_| {
            GenError::InvalidArgument(format!("--{} value '{}' invalid", flag, text))
        })?;
        parts = i + 1;
    }
    if parts != 6 {
        return Err(GenError::InvalidArgument(format!(
            "--{} value '{}' is not a aa:bb:cc:dd:ee:ff MAC",
            flag, text
        )));
    }
    Ok(mac)
}

fn parse_ipv4(flag: &str, text: &str) -> GenResult<Ipv4Addr> {
    text.parse::<Ipv4Addr>().map_err(|_| {
        GenError::InvalidArgument(format!("--{} value '{}' invalid", flag, text))
    })
}

fn parse_pct(flag: &str, text: &str) -> GenResult<u32> {
    match text.parse::<u32>() {
        Ok(v) if v <= 100 => Ok(v),
        _ => Err(GenError::InvalidArgument(format!(
            "--{} value '{}' is not a percentage",
            flag, text
        ))),
    }
}

fn opt_u64(matches: &ArgMatches<'_>, name: &str) -> GenResult<Option<u64>> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(text) => text.parse::<u64>().map(Some).map_err(|_| {
            GenError::InvalidArgument(format!("--{} value '{}' invalid", name, text))
        }),
    }
}

fn opt_pct(matches: &ArgMatches<'_>, name: &str) -> GenResult<Option<u32>> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(text) => parse_pct(name, text).map(Some),
    }
}

fn req_u32_gt(matches: &ArgMatches<'_>, name: &str, min: u32) -> GenResult<u32> {
    let text = matches.value_of(name).unwrap();
    match text.parse::<u32>() {
        Ok(v) if v > min => Ok(v),
        _ => Err(GenError::InvalidArgument(format!(
            "--{} value '{}' must be greater than {}",
            name, text, min
        ))),
    }
}

/// Order rate with the k/K and m/M multiplier suffixes of the original CLI.
fn opt_rate(matches: &ArgMatches<'_>) -> GenResult<Option<u64>> {
    let text = match matches.value_of("orders-rate") {
        Some(text) => text,
        None => return Ok(None),
    };
    let (digits, mult) = match text.chars().last() {
        Some('k') | Some('K') => (&text[..text.len() - 1], 1000u64),
        Some('m') | Some('M') => (&text[..text.len() - 1], 1_000_000u64),
        _ => (text, 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|v| v.checked_mul(mult))
        .filter(|&v| v > 0)
        .map(Some)
        .ok_or_else(|| {
            GenError::InvalidArgument(format!("--orders-rate value '{}' invalid", text))
        })
}
