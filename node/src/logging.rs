//! # Logging
//!
//! One `tracing` subscriber per process, writing to stderr so that `settle`
//! and `sign` keep stdout for their own output. `RUST_LOG` overrides the
//! per-command default filter:
//!
//! | Command  | Default filter                                               |
//! |----------|--------------------------------------------------------------|
//! | `serve`  | [`SERVE_FILTER`]: node and protocol at info, HTTP traces on |
//! | `settle` | [`SETTLE_FILTER`]: node and protocol at info                |
//! | `sign`   | [`SIGN_FILTER`]: warnings only                              |

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const SERVE_FILTER: &str = "upacp_node=info,upacp_protocol=info,tower_http=debug";
pub const SETTLE_FILTER: &str = "upacp_node=info,upacp_protocol=info";
pub const SIGN_FILTER: &str = "upacp_node=warn,upacp_protocol=warn";

/// `--log-format` / `UPACP_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored lines with file and line numbers.
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects [`LogFormat::Json`]; anything else is
    /// [`LogFormat::Pretty`].
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber. Panics if one is already installed.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(filter(default_filter));
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    tracing::debug!(?format, default_filter, "logging initialized");
}
