use std::io;

use tracing::Level;

/// Install the global subscriber writing compact log lines to stderr.
pub fn init_logging(verbose: bool) {
    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_target(false)
        .compact();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .event_format(format)
        .init();
}
