//! moldparse: parses a capture produced by moldgen, validates MoldUDP64
//! sequence continuity and ITCH message types, classifies traffic against an
//! optional subscription list, and can renumber or restamp records in place.

use clap::{App, Arg, ArgMatches};
use flow::logging;
use flow::rand::Rand;
use std::path::PathBuf;
use std::process;
use streamcore::parse::{ParseParams, Parser};
use streamcore::symbol::read_symbol_file;
use streamcore::{GenError, GenResult};

fn main() {
    let matches = parse_or_exit(cli());
    if let Err(err) = run(&matches) {
        eprintln!("moldparse: {}", err);
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
    App::new("moldparse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("ITCH/MoldUDP64 pcap capture parser and in-place editor")
        .arg(
            Arg::with_name("file")
                .long("file")
                .short("f")
                .takes_value(true)
                .required(true)
                .help("pcap capture to parse"),
        )
        .arg(
            Arg::with_name("list-file")
                .long("list-file")
                .short("L")
                .takes_value(true)
                .help("file with the list of subscription symbols"),
        )
        .arg(
            Arg::with_name("expect")
                .long("expect")
                .short("x")
                .takes_value(true)
                .help("first sequence number to expect"),
        )
        .arg(
            Arg::with_name("edit-first")
                .long("edit-first")
                .short("1")
                .takes_value(true)
                .help("re-write sequence numbers as a gap-free run from here"),
        )
        .arg(
            Arg::with_name("edit-time")
                .long("edit-time")
                .short("T")
                .takes_value(true)
                .help("shift record timestamps so the capture starts at this second"),
        )
        .arg(
            Arg::with_name("no-hash-del")
                .long("no-hash-del")
                .help("reference numbers are never deleted from the hash"),
        )
        .arg(Arg::with_name("debug").long("debug").short("d").help("produce debug information"))
        .arg(Arg::with_name("verbose").long("verbose").short("v").help("print every parsed message"))
}

fn run(matches: &ArgMatches<'_>) -> GenResult<()> {
    let severity = logging::severity_from_flags(
        matches.is_present("debug"),
        matches.is_present("verbose"),
    );
    let log = logging::init(severity);

    // Subscription symbols get their price bands from the shared loader;
    // the parser only ever looks at the names.
    let (mut rand, _) = Rand::from_seed(None);
    let subscription = match matches.value_of("list-file") {
        Some(path) => Some(read_symbol_file(path, &mut rand, &log)?.symbols),
        None => None,
    };

    let params = ParseParams {
        file: PathBuf::from(matches.value_of("file").unwrap()),
        expect_first_seq: opt_u64(matches, "expect")?.unwrap_or(0),
        edit_first_seq: opt_u64(matches, "edit-first")?,
        edit_time_sec: match opt_u64(matches, "edit-time")? {
            Some(v) if v <= u64::from(u32::max_value()) => Some(v as u32),
            Some(v) => {
                return Err(GenError::InvalidArgument(format!(
                    "--edit-time value '{}' out of range",
                    v
                )))
            }
            None => None,
        },
        no_hash_del: matches.is_present("no-hash-del"),
        verbose: matches.is_present("verbose"),
    };

    let mut parser = Parser::new(params, subscription.as_deref(), &log);
    let stats = parser.run()?;
    stats.print(&parser.dhash_stats(), parser.num_subscr_symbols());
    Ok(())
}

fn opt_u64(matches: &ArgMatches<'_>, name: &str) -> GenResult<Option<u64>> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(text) => text.parse::<u64>().map(Some).map_err(|_| {
            GenError::InvalidArgument(format!("--{} value '{}' invalid", name, text))
        }),
    }
}
