use std::sync::Mutex;

use slog::Drain;
use slog::Fuse;
use slog_async::Async;
use slog_json::Json;

pub use slog::{crit, debug, error, info, o, trace, warn, Discard, Logger};

/// Creates the root logger: JSON lines on stderr, written from a
/// background thread.
pub fn initialize_logger() -> Logger {
    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);

    #[cfg(feature = "env_logging")]
    let drain = slog_envlogger::new(drain).fuse();

    let drain = Async::new(drain).build().fuse();

    let logger = Logger::root(
        drain,
        o!(
            "service" => info::NAME,
            "version" => info::VERSION,
            "revision" => info::REVISION,
            "build_timestamp" => info::BUILD_TIMESTAMP
        ),
    );

    #[cfg(feature = "env_logging")]
    {
        // keeps `slog_scope::logger()` usable for the rest of the process
        std::mem::forget(slog_scope::set_global_logger(logger.clone()));
    }

    logger
}

/// A logger that drops everything, for tests and helper programs.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}
