use std::env;

use analysis_board_core::SessionConfig;

#[derive(Clone, Debug)]
pub struct Config {
    /// Path or name of the UCI engine binary
    pub engine_path: String,
    pub host: String,
    pub port: u16,
    pub session: SessionConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = SessionConfig::default();
        Self {
            engine_path: var("ENGINE_PATH").unwrap_or_else(|| "stockfish".to_string()),
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("PORT").and_then(|v| v.parse().ok()).unwrap_or(3000),
            session: SessionConfig {
                multipv: var("MULTIPV")
                    .and_then(|v| v.parse().ok())
                    .filter(|k| *k > 0)
                    .unwrap_or(defaults.multipv),
                use_nnue: var("USE_NNUE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.use_nnue),
            },
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = lookup(&[]);
        assert_eq!(config.engine_path, "stockfish");
        assert_eq!(config.addr(), "127.0.0.1:3000");
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = lookup(&[
            ("ENGINE_PATH", "/opt/sf/stockfish"),
            ("PORT", "8080"),
            ("MULTIPV", "0"),
            ("USE_NNUE", "false"),
        ]);
        assert_eq!(config.engine_path, "/opt/sf/stockfish");
        assert_eq!(config.port, 8080);
        assert_eq!(config.session.multipv, 5);
        assert!(!config.session.use_nnue);
    }
}
