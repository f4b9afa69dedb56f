//! Opt-in tracing output for embedding shells.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MAX_FILTER_LEN: usize = 4096;

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Logging stays off unless `RUST_LOG` holds a usable filter. Returns `false`
/// when a global subscriber was already installed.
pub fn init() -> bool {
    let filter = filter_from(std::env::var("RUST_LOG").ok().as_deref());
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_ok()
}

// Invalid or huge filters fall back to "off" instead of failing startup.
fn filter_from(raw: Option<&str>) -> EnvFilter {
    raw.and_then(|raw| {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_FILTER_LEN {
            return None;
        }
        EnvFilter::try_new(raw).ok()
    })
    .unwrap_or_else(|| EnvFilter::new("off"))
}
