//! # dcp-logging
//!
//! Structured logging with `tracing` for the DCP engine.
//!
//! - [`init_subscriber`] installs the global stderr subscriber (no-op when
//!   one is already set)
//! - [`FileTransport`] is a `tracing_subscriber::Layer` that appends JSON
//!   lines to a debug log file when the `debug` setting is on
//!
//! Log context (session id, component) is carried as event fields rather
//! than a thread-local, so concurrent sessions interleave safely.

pub mod transport;

pub use transport::{FileTransport, TransportHandle};

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at plugin initialization. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - Minimum log level when `RUST_LOG` is unset (e.g. `"warn"`).
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init is a no-op if a subscriber is already installed
    let _ = subscriber.try_init();
}

/// Initialize the subscriber with the debug file transport attached.
///
/// Returns a handle for flushing pending writes; dropping the handle does
/// not disable the transport.
pub fn init_with_debug_file(level: &str, path: &std::path::Path) -> Option<TransportHandle> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let transport = FileTransport::open(path).ok()?;
    let handle = transport.handle();

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(transport)
        .try_init();

    result.is_ok().then_some(handle)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
