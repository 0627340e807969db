use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use super::ProfilerArgs;

/// Everything that can go wrong while assembling the startup configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("No {0} pools specified. At least one CIDR block must be listed in `{0}_pools`")]
    MissingPools(&'static str),
    #[error("No configuration provided. Either use --config to specify a file or list pools via CLI args (see --help)")]
    Missing,
}

#[derive(clap::Parser)]
#[clap(author, version, about="Scoped IPv4 address pools for container networks", long_about = None)]
pub struct Args {
    #[command(flatten)]
    config_data: Option<Config>,

    /// Path to a config file to read
    #[clap(short = 'c', long = "config", conflicts_with = "Config")]
    config_file: Option<PathBuf>,

    /// Name the driver registers under
    #[clap(short = 'n', long, default_value_t = ("custom_ipam").to_string())]
    pub name: String,

    /// Address the plugin API listens on
    #[clap(long, default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Address written to the plugin spec file (defaults to the bind address)
    #[clap(long)]
    advertise: Option<SocketAddr>,

    /// Directory the plugin spec file is written to
    #[clap(long, default_value = ".")]
    pub spec_dir: PathBuf,

    /// Enable prometheus metrics on a given address
    #[clap(long = "prometheus")]
    pub prom_bind_addr: Option<SocketAddr>,

    #[command(flatten)]
    pub profiler_args: ProfilerArgs,

    /// Enable verbose logging
    #[clap(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Load the configuration from whichever source was chosen and validate it
    pub fn data(&self) -> Result<Config, ConfigError> {
        let data = match self.config_file {
            Some(ref path) => {
                // Read the data from the config file
                let file = std::fs::File::open(path).map_err(|error| match error.kind() {
                    std::io::ErrorKind::NotFound => ConfigError::NotFound(path.clone()),
                    _ => ConfigError::Io {
                        path: path.clone(),
                        source: error,
                    },
                })?;
                serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| {
                    ConfigError::Parse {
                        path: path.clone(),
                        source,
                    }
                })?
            }
            None => self.config_data.clone().ok_or(ConfigError::Missing)?,
        };

        data.validate()?;
        Ok(data)
    }

    /// The address other processes should use to reach the plugin API
    pub fn advertise_addr(&self) -> SocketAddr {
        self.advertise.unwrap_or_else(|| match self.bind.ip() {
            ip if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.bind.port())
            }
            _ => self.bind,
        })
    }
}

/// Program configuration. Specifiable via either CLI args or a config file
#[derive(Debug, clap::Args, serde::Deserialize, Clone)]
#[group()]
pub struct Config {
    /// CIDR blocks making up the global address space
    #[clap(long = "global-pool")]
    pub global_pools: Vec<String>,

    /// CIDR blocks making up the local address space
    #[clap(long = "local-pool")]
    pub local_pools: Vec<String>,

    /// Opaque key-value data returned with every pool
    #[clap(skip = default_pool_data())]
    #[serde(default = "default_pool_data")]
    pub pool_data: HashMap<String, String>,
}

impl Config {
    /// Both address spaces need at least one pool
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global_pools.is_empty() {
            return Err(ConfigError::MissingPools("global"));
        }
        if self.local_pools.is_empty() {
            return Err(ConfigError::MissingPools("local"));
        }
        Ok(())
    }
}

fn default_pool_data() -> HashMap<String, String> {
    HashMap::from([("DNS".to_string(), "8.8.8.8".to_string())])
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ipamd-{}-{}.json", name, std::process::id()));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn test_pools_from_cli() {
        let args = Args::parse_from([
            "ipamd",
            "--global-pool",
            "10.0.0.0/24",
            "--global-pool",
            "10.0.1.0/24",
            "--local-pool",
            "192.168.0.0/24",
        ]);
        let config = args.data().unwrap();
        assert_eq!(config.global_pools, vec!["10.0.0.0/24", "10.0.1.0/24"]);
        assert_eq!(config.local_pools, vec!["192.168.0.0/24"]);
        assert_eq!(config.pool_data.get("DNS").map(String::as_str), Some("8.8.8.8"));
        assert_eq!(args.name, "custom_ipam");
    }

    #[test]
    fn test_pools_from_file() {
        let path = write_config(
            "file",
            r#"{"global_pools": ["10.0.0.0/24"], "local_pools": ["192.168.0.0/24"], "pool_data": {"DNS": "1.1.1.1"}}"#,
        );
        let args = Args::parse_from(["ipamd", "-c", path.to_str().unwrap()]);
        let config = args.data().unwrap();
        assert_eq!(config.global_pools, vec!["10.0.0.0/24"]);
        assert_eq!(config.pool_data.get("DNS").map(String::as_str), Some("1.1.1.1"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_both_scopes_required() {
        let path = write_config("empty", r#"{"global_pools": ["10.0.0.0/24"], "local_pools": []}"#);
        let args = Args::parse_from(["ipamd", "-c", path.to_str().unwrap()]);
        assert!(matches!(args.data(), Err(ConfigError::MissingPools("local"))));
        std::fs::remove_file(path).unwrap();

        let args = Args::parse_from(["ipamd", "--local-pool", "192.168.0.0/24"]);
        assert!(matches!(args.data(), Err(ConfigError::MissingPools("global"))));
    }

    #[test]
    fn test_missing_sources() {
        let args = Args::parse_from(["ipamd"]);
        assert!(matches!(args.data(), Err(ConfigError::Missing)));

        let args = Args::parse_from(["ipamd", "-c", "/nonexistent/ipamd.json"]);
        assert!(matches!(args.data(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_advertise_addr() {
        let args = Args::parse_from(["ipamd"]);
        assert_eq!(args.advertise_addr(), "127.0.0.1:8080".parse().unwrap());

        let args = Args::parse_from(["ipamd", "--bind", "10.1.2.3:9000"]);
        assert_eq!(args.advertise_addr(), "10.1.2.3:9000".parse().unwrap());

        let args = Args::parse_from(["ipamd", "--advertise", "10.9.9.9:80"]);
        assert_eq!(args.advertise_addr(), "10.9.9.9:80".parse().unwrap());
    }
}
