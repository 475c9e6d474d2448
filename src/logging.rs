use std::io::{self, IsTerminal};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "warn,camp_enroll=info";
const VERBOSE_FILTER: &str = "warn,camp_enroll=debug";

/// `RUST_LOG` wins; otherwise the default or verbose directives apply.
pub fn make_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        })
    })
}

/// Installs the global subscriber. Output goes to stderr so tables and CSV
/// on stdout stay clean. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(verbose);

    // Already installed (tests, embedding binaries).
    let _ = tracing_subscriber::registry()
        .with(make_filter(verbose))
        .with(layer)
        .try_init();
}
