//! Server configuration loaded from environment variables.
//!
//! | Variable             | Default     | Description                              |
//! |----------------------|-------------|------------------------------------------|
//! | `ARBOR_HOST`         | `127.0.0.1` | Listen address                           |
//! | `ARBOR_PORT`         | `3000`      | Listen port                              |
//! | `ARBOR_LOG_LEVEL`    | `info`      | Tracing filter used when `RUST_LOG` is unset |
//! | `ARBOR_PRESETS_FILE` | unset       | JSON preset file replacing the built-ins |
//! | `ARBOR_INJECT_VARIATION` | `false` | Give deterministic presets organic ranges |
//! | `ARBOR_MAX_SEGMENTS` | `250000`    | Larger generations are rejected with 413 |

use std::net::SocketAddr;
use std::str::FromStr;

pub const DEFAULT_MAX_SEGMENTS: usize = 250_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub presets_file: Option<String>,
    pub inject_variation: bool,
    pub max_segments: usize,
}

impl Config {
    /// Reads the process environment, falling back to defaults for absent or
    /// unparseable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: env_str(&lookup, "ARBOR_HOST", "127.0.0.1"),
            port: env_parse(&lookup, "ARBOR_PORT", 3000),
            log_level: env_str(&lookup, "ARBOR_LOG_LEVEL", "info"),
            presets_file: lookup("ARBOR_PRESETS_FILE").filter(|path| !path.is_empty()),
            inject_variation: env_bool(&lookup, "ARBOR_INJECT_VARIATION"),
            max_segments: env_parse(&lookup, "ARBOR_MAX_SEGMENTS", DEFAULT_MAX_SEGMENTS),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

fn env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_str(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
