//! Process-wide structured logging.

pub mod logging;

pub use logging::{LogFormat, LogFormatError};

/// Install the global subscriber using `RUST_LOG` and `LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    let format = match std::env::var("LOG_FORMAT") {
        Ok(raw) => raw.parse().unwrap_or_else(|err: LogFormatError| {
            eprintln!("{err}; falling back to json logs");
            LogFormat::Json
        }),
        Err(_) => LogFormat::Json,
    };
    logging::init(format);
}
