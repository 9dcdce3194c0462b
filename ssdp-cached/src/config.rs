use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use anyhow::{bail, Context, Result};
use shared::protocol::{
    DEFAULT_MAX_AGE_SECS, DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_TTL_SECS, SSDP_MULTICAST_ADDR,
    SSDP_PORT,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ssdp-cached/ssdp-cached.toml";

/// Upper bound for any configured duration, 100 years
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 3600;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_multicast_group")]
    pub multicast_group: Ipv4Addr,
    /// Interface addresses to join and announce on. Empty means all
    /// non-loopback IPv4 interfaces.
    #[serde(default)]
    pub interfaces: Vec<Ipv4Addr>,
    /// Keep devices that claim to go offline; some TVs send byebye while
    /// still running
    #[serde(default)]
    pub ignore_byebye: bool,
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Inspection API address; the API is off when unset
    #[serde(default)]
    pub listen: Option<SocketAddr>,
}

fn default_port() -> u16 {
    SSDP_PORT
}

fn default_multicast_group() -> Ipv4Addr {
    SSDP_MULTICAST_ADDR
}

fn default_recv_buffer() -> usize {
    2048
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_max_age() -> u64 {
    DEFAULT_MAX_AGE_SECS
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            multicast_group: default_multicast_group(),
            interfaces: Vec::new(),
            ignore_byebye: false,
            recv_buffer: default_recv_buffer(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            max_age_secs: default_max_age(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reject values the cache cannot turn into timestamps
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("cache.sweep_interval_secs", self.cache.sweep_interval_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                bail!("{} = {} exceeds the maximum of {}", name, secs, MAX_DURATION_SECS);
            }
        }
        if self.relay.recv_buffer == 0 {
            bail!("relay.recv_buffer must be greater than zero");
        }
        Ok(())
    }

    /// An explicit path must load. Without one, the default path is used if
    /// present, otherwise built-in defaults.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        match explicit {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Ok((Self::load(&path)?, Some(path)))
                } else {
                    Ok((Self::default(), None))
                }
            }
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache.ttl_secs as i64)
    }

    pub fn sweep_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache.sweep_interval_secs as i64)
    }

    pub fn multicast_destination(&self) -> SocketAddr {
        SocketAddr::from((self.relay.multicast_group, self.relay.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.relay.port, 1900);
        assert_eq!(config.relay.multicast_group, Ipv4Addr::new(239, 255, 255, 250));
        assert!(config.relay.interfaces.is_empty());
        assert!(!config.relay.ignore_byebye);
        assert_eq!(config.relay.recv_buffer, 2048);
        assert_eq!(config.cache.ttl_secs, 43200);
        assert_eq!(config.cache.sweep_interval_secs, 1800);
        assert_eq!(config.cache.max_age_secs, 1800);
        assert!(config.api.listen.is_none());
        assert_eq!(config.ttl(), chrono::Duration::hours(12));
        assert_eq!(config.sweep_interval(), chrono::Duration::minutes(30));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [relay]
            interfaces = ["192.168.1.1", "10.0.0.1"]
            ignore_byebye = true

            [cache]
            ttl_secs = 600

            [api]
            listen = "127.0.0.1:8054"
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(
            config.relay.interfaces,
            vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(10, 0, 0, 1)]
        );
        assert!(config.relay.ignore_byebye);
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.cache.sweep_interval_secs, 1800);
        assert_eq!(config.api.listen, Some("127.0.0.1:8054".parse().unwrap()));
        assert_eq!(
            config.multicast_destination(),
            "239.255.255.250:1900".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        assert!(Config::resolve(Some(missing)).is_err());
    }

    #[test]
    fn test_huge_ttl_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cache]\nttl_secs = 1000000000000000").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("cache.ttl_secs"));
    }

    #[test]
    fn test_huge_sweep_interval_is_rejected() {
        let mut config = Config::default();
        config.cache.sweep_interval_secs = u64::MAX;

        assert!(config.validate().is_err());

        config.cache.sweep_interval_secs = MAX_DURATION_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_interface_is_an_error() {
        let result: Result<Config, _> = toml::from_str("[relay]\ninterfaces = [\"eth0\"]\n");

        assert!(result.is_err());
    }
}
