//! Build metadata reported in log lines and by the admin health check.

pub const NAME: &str = "experiences";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Set by the deployment pipeline; absent in local builds.
pub const REVISION: Option<&str> = option_env!("EXPERIENCES_REVISION");

pub const BUILD_TIMESTAMP: Option<&str> = option_env!("EXPERIENCES_BUILD_TIMESTAMP");
