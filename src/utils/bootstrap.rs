//! Bootstrap utilities for the dbfunc binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

/// Default filter for the requested verbosity.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Initialize tracing.
///
/// `DBFUNC_LOG` wins when set; otherwise the level follows `debug`. Called
/// once, before the environment is constructed, so every later phase logs at
/// the chosen level.
pub fn init_tracing(debug: bool) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| EnvFilter::new(default_filter(debug))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
