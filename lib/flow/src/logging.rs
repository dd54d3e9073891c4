pub use slog::{crit, debug, error, info, o, trace, warn, Discard, Drain, Logger};
pub use sloggers::types::Severity;

use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::Build;

/// Builds the root terminal logger. Diagnostics go to stderr so that program
/// output on stdout stays machine-readable.
pub fn init(severity: Severity) -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(severity);
    builder.destination(Destination::Stderr);
    builder.build().expect("failed to build terminal logger")
}

/// Maps the conventional debug/verbose flags to a severity.
pub fn severity_from_flags(debug: bool, verbose: bool) -> Severity {
    if debug {
        Severity::Trace
    } else if verbose {
        Severity::Debug
    } else {
        Severity::Info
    }
}

/// A logger that drops everything on the floor.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}
