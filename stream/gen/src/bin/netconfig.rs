//! Writes a template network endpoint configuration for moldgen.

use std::env;
use std::process;
use streamcore::config::NetConfig;

fn main() {
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "net-config.toml".to_string());
    if let Err(err) = NetConfig::template().save(&path) {
        eprintln!("netconfig: {}", err);
        process::exit(err.exit_code());
    }
    println!("wrote {}", path);
}
