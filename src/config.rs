use std::env;
use std::str::FromStr;

/// Runtime settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub p2p_port: u16,
    /// `ws://` URLs dialed at startup.
    pub peers: Vec<String>,
    pub wallet_private_key: Option<String>,
    /// Nonces tried per cooperative mining step.
    pub mining_batch: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to
    /// the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse(lookup("PORT")).unwrap_or(8080),
            p2p_port: parse(lookup("P2P_PORT")).unwrap_or(6001),
            peers: lookup("PEERS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            wallet_private_key: lookup("WALLET_PRIVATE_KEY").filter(|k| !k.trim().is_empty()),
            mining_batch: parse::<u64>(lookup("MINING_BATCH")).filter(|b| *b > 0).unwrap_or(1000),
        }
    }

    pub fn p2p_addr(&self) -> String {
        format!("{}:{}", self.host, self.p2p_port)
    }
}

fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.p2p_port, 6001);
        assert!(cfg.peers.is_empty());
        assert_eq!(cfg.wallet_private_key, None);
        assert_eq!(cfg.mining_batch, 1000);
    }

    #[test]
    fn reads_values() {
        let cfg = Config::from_lookup(lookup(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "3001"),
            ("P2P_PORT", "6002"),
            ("PEERS", "ws://a:6001, ws://b:6001,"),
            ("WALLET_PRIVATE_KEY", "abcd"),
            ("MINING_BATCH", "50"),
        ]));
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.p2p_addr(), "0.0.0.0:6002");
        assert_eq!(cfg.peers, vec!["ws://a:6001", "ws://b:6001"]);
        assert_eq!(cfg.wallet_private_key.as_deref(), Some("abcd"));
        assert_eq!(cfg.mining_batch, 50);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let cfg = Config::from_lookup(lookup(&[("PORT", "http"), ("MINING_BATCH", "0")]));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.mining_batch, 1000);
    }
}
