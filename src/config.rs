use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use log::{info, warn, Logger};

/// Where the local snapshot goes unless `EXPERIENCES_LOCAL_STORE_DIR`
/// says otherwise.
pub const DEFAULT_LOCAL_STORE_DIR: &str = "data";

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the value of the named environment variable if it's set and
/// not blank.
pub fn get_optional_variable(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// Where the catalog is primarily kept.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// The remote database, with the local snapshot as a mirror.
    Remote,

    /// The local snapshot, seeded from bundled or file data.
    Json,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Remote => "remote",
            Mode::Json => "json",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" | "supabase" | "postgres" => Ok(Mode::Remote),
            "json" | "local" => Ok(Mode::Json),
            other => Err(format!("unknown data mode {:?}", other)),
        }
    }
}

/// Settings for the experience data store.
#[derive(Clone, Debug)]
pub struct DataConfig {
    pub mode: Mode,

    /// Only used in remote mode. Has no default.
    pub connection_string: Option<String>,

    /// Directory holding the local snapshot. Without one, JSON mode
    /// keeps changes in memory only.
    pub local_store_dir: Option<PathBuf>,

    /// A JSON catalog to seed from when nothing else has data.
    pub seed_path: Option<PathBuf>,

    /// Whether the catalog compiled into the binary is used as a seed.
    /// When it is, a seed file is never reached.
    pub bundled_seed: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            mode: Mode::Json,
            connection_string: None,
            local_store_dir: Some(PathBuf::from(DEFAULT_LOCAL_STORE_DIR)),
            seed_path: None,
            bundled_seed: true,
        }
    }
}

impl DataConfig {
    /// Reads the configuration from `EXPERIENCES_*` variables.
    ///
    /// Remote mode without a connection string falls back to JSON mode
    /// rather than guessing at credentials.
    pub fn from_env(logger: &Logger) -> Self {
        let mode = match get_optional_variable("EXPERIENCES_DATA_MODE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(logger, "Ignoring EXPERIENCES_DATA_MODE"; "error" => e);
                Mode::Json
            }),
            None => Mode::Json,
        };

        let config = DataConfig {
            mode,
            connection_string: get_optional_variable("EXPERIENCES_DB_CONNECTION_STRING"),
            local_store_dir: Some(local_store_dir(get_optional_variable(
                "EXPERIENCES_LOCAL_STORE_DIR",
            ))),
            seed_path: get_optional_variable("EXPERIENCES_SEED_PATH").map(PathBuf::from),
            bundled_seed: get_optional_variable("EXPERIENCES_BUNDLED_SEED")
                .map_or(true, |value| parse_flag(&value)),
        };

        config.resolve(logger)
    }

    /// Disables remote mode when there's nothing to connect to.
    pub fn resolve(mut self, logger: &Logger) -> Self {
        if self.mode == Mode::Remote && self.connection_string.is_none() {
            warn!(logger, "Remote mode selected without EXPERIENCES_DB_CONNECTION_STRING, using JSON mode");
            self.mode = Mode::Json;
        }

        if self.mode == Mode::Json && self.local_store_dir.is_none() {
            warn!(logger, "JSON mode without a local store directory, changes will not survive a restart");
        }

        info!(logger, "Data store configured";
            "mode" => ?self.mode,
            "local_store_dir" => ?self.local_store_dir,
            "seed_path" => ?self.seed_path,
            "bundled_seed" => self.bundled_seed);

        self
    }
}

fn local_store_dir(configured: Option<String>) -> PathBuf {
    PathBuf::from(configured.unwrap_or_else(|| DEFAULT_LOCAL_STORE_DIR.to_owned()))
}
