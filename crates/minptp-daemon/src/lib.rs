pub mod clock;
pub mod log;
pub mod net;
pub mod node;
pub mod transport;

use std::fmt;
use std::time::Instant;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

struct MillisecondUptime {
    start: Instant,
}

impl MillisecondUptime {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl FormatTime for MillisecondUptime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let elapsed = self.start.elapsed();
        write!(w, "minptp[{}.{:03}s]", elapsed.as_secs(), elapsed.subsec_millis())
    }
}

/// Install the daemon's default tracing subscriber.
///
/// Honors `RUST_LOG` with a default of `info`, writes to stdout, and ignores
/// the error if a subscriber is already installed (tests).
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_level(false)
        .with_timer(MillisecondUptime::new())
        .try_init();
}
