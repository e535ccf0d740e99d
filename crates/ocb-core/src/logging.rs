use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize logging/tracing for the chatbot.
///
/// `verbosity` raises the default level of our crates (0 = info, 1 = debug,
/// 2+ = trace). `RUST_LOG` always wins when set.
pub fn init(service_name: &str, verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Default: our crates at `level`, teloxide at warn, everything else info.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,teloxide=warn,ocb={level},ocb_core={level},ocb_telegram={level},ocb_ouranos={level},{service_name}={level}"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install tracing subscriber: {e}")))
}
