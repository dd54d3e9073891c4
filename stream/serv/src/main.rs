//! moldserv: binds a UDP port, decodes incoming MoldUDP64/ITCH datagrams,
//! prints every message and reports per-session sequence gaps. Runs until
//! killed.

use clap::{App, Arg, ArgMatches};
use flow::logging::{self, Logger};
use hashbrown::HashMap;
use std::net::UdpSocket;
use std::process;
use wireline::itch::{self, ItchMessage};
use wireline::mold::{self, MoldHeader, SESSION_LEN};

fn main() {
    let matches = parse_or_exit(cli());
    if let Err(err) = run(&matches) {
        eprintln!("moldserv: {}", err);
        process::exit(err.raw_os_error().unwrap_or(5));
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
    App::new("moldserv")
        .version(env!("CARGO_PKG_VERSION"))
        .about("UDP listener printing and validating a live Mold/ITCH stream")
        .arg(
            Arg::with_name("port")
                .long("port")
                .short("p")
                .takes_value(true)
                .required(true)
                .help("UDP port to listen on"),
        )
        .arg(Arg::with_name("debug").long("debug").short("d").help("produce debug information"))
        .arg(Arg::with_name("verbose").long("verbose").short("v").help("more logging"))
}

fn run(matches: &ArgMatches<'_>) -> std::io::Result<()> {
    let log = logging::init(logging::severity_from_flags(
        matches.is_present("debug"),
        matches.is_present("verbose"),
    ));

    let port = match matches.value_of("port").unwrap().parse::<u16>() {
        Ok(port) if port > 0 => port,
        _ => {
            eprintln!("moldserv: --port value invalid");
            process::exit(22);
        }
    };

    let socket = UdpSocket::bind(("0.0.0.0", port))?;
    logging::info!(log, "listening"; "port" => port);

    let mut server = Server::new(log);
    let mut buf = [0u8; 2048];
    loop {
        let (len, peer) = socket.recv_from(&mut buf)?;
        server.handle_datagram(&buf[..len], &peer.to_string());
    }
}

struct Server {
    /// Next expected sequence number per Mold session.
    sessions: HashMap<[u8; SESSION_LEN], u64>,
    /// Latest timestamp seen, printed alongside each message.
    time_sec: u32,
    log: Logger,
}

impl Server {
    fn new(log: Logger) -> Server {
        Server {
            sessions: HashMap::new(),
            time_sec: 0,
            log,
        }
    }

    fn handle_datagram(&mut self, datagram: &[u8], peer: &str) {
        let mold = match MoldHeader::read(datagram) {
            Ok(mold) => mold,
            Err(err) => {
                logging::warn!(self.log, "undecodable datagram";
                               "peer" => peer, "len" => datagram.len(), "error" => %err);
                return;
            }
        };

        if let Some(&expected) = self.sessions.get(&mold.session) {
            if expected != mold.seq_num {
                println!(
                    "seq gap on session {}: expected {} received {}",
                    String::from_utf8_lossy(&mold.session),
                    expected,
                    mold.seq_num
                );
            }
        }
        self.sessions
            .insert(mold.session, mold.seq_num + u64::from(mold.msg_cnt));

        let mut off = mold::HEADER_LEN;
        for _ in 0..mold.msg_cnt {
            match ItchMessage::read(&datagram[off..]) {
                Ok(msg) => {
                    self.print_message(&msg);
                    off += msg.wire_len();
                }
                Err(err) => {
                    println!("unsupported message from {}: {}", peer, err);
                    break;
                }
            }
        }
    }

    fn print_message(&mut self, msg: &ItchMessage) {
        match *msg {
            ItchMessage::Timestamp { seconds } => {
                self.time_sec = seconds;
                println!("timestamp: {} sec", seconds);
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
                    "time: {}.{:09} ADD ref: {} {} shares: {} {} price: {}",
                    self.time_sec,
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
                price,
                ..
            } => {
                println!(
                    "time: {}.{:09} EXEC ref: {} shares: {} price: {}",
                    self.time_sec, timestamp_ns, ref_num, shares, price
                );
            }
            ItchMessage::OrderCancel {
                timestamp_ns,
                ref_num,
                shares,
            } => {
                println!(
                    "time: {}.{:09} CANCEL ref: {} shares: {}",
                    self.time_sec, timestamp_ns, ref_num, shares
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
                    "time: {}.{:09} REPLACE ref: {} -> {} shares: {} price: {}",
                    self.time_sec, timestamp_ns, orig_ref_num, new_ref_num, shares, price
                );
            }
            ItchMessage::OrderDelete {
                timestamp_ns,
                ref_num,
            } => {
                println!(
                    "time: {}.{:09} DELETE ref: {}",
                    self.time_sec, timestamp_ns, ref_num
                );
            }
            ref other => {
                println!("unsupported msg: {}", other.msg_type() as char);
            }
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
    use flow::logging;
    use wireline::mold::SESSION;

    fn datagram(seq: u64, msgs: &[ItchMessage]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut hdr = MoldHeader::new(seq);
        hdr.msg_cnt = msgs.len() as u16;
        hdr.write(&mut out).unwrap();
        for msg in msgs {
            msg.write(&mut out).unwrap();
        }
        out
    }

    #[test]
    fn session_sequence_tracking_advances_by_message_count() {
        let mut server = Server::new(logging::discard());
        let tick = ItchMessage::Timestamp { seconds: 0 };

        server.handle_datagram(&datagram(0, &[tick]), "peer");
        assert_eq!(server.sessions[&SESSION], 1);

        server.handle_datagram(&datagram(1, &[tick, tick]), "peer");
        assert_eq!(server.sessions[&SESSION], 3);

        // a gap resynchronizes to the received number
        server.handle_datagram(&datagram(10, &[tick]), "peer");
        assert_eq!(server.sessions[&SESSION], 11);
    }

    #[test]
    fn short_datagrams_are_ignored() {
        let mut server = Server::new(logging::discard());
        server.handle_datagram(&[0u8; 5], "peer");
        assert!(server.sessions.is_empty());
    }

    #[test]
    fn timestamp_message_updates_the_clock() {
        let mut server = Server::new(logging::discard());
        server.handle_datagram(
            &datagram(0, &[ItchMessage::Timestamp { seconds: 1234 }]),
            "peer",
        );
        assert_eq!(server.time_sec, 1234);
    }
}
