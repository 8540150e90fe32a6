//! Dispatcher configuration.
//!
//! A `Config` is handed to [`Router::config`](crate::Router::config) before
//! compilation and lives as long as the compiled [`Service`](crate::Service).
//! Nothing here is process-global: two services in the same binary can run
//! with different settings.

/// Environment variable read by [`Config::from_env`].
pub const DEBUG_ENV: &str = "CANOPY_DEBUG";

/// Settings shared by the dispatcher and every request [`Context`](crate::Context).
#[derive(Clone, Debug, Default)]
pub struct Config {
    debug: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `CANOPY_DEBUG`. `1` and `true` (any case) enable debug mode.
    pub fn from_env() -> Self {
        let debug = std::env::var(DEBUG_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self { debug }
    }

    /// Debug mode logs one `info` line per request and pretty-prints JSON
    /// written through [`Context::write_json`](crate::Context::write_json).
    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_off_by_default() {
        assert!(!Config::new().is_debug());
        assert!(Config::new().debug(true).is_debug());
    }
}
