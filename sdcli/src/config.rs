use crate::cli::Args;
use libsubdomain_storm::{Domain, DomainError, ScanConfig, DEFAULT_DNS_PORT};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid domain: {0}")]
    Domain(#[from] DomainError),
    #[error("Invalid resolver address: {0}")]
    Resolver(String),
    #[error("No resolvers given")]
    NoResolvers,
    #[error("Invalid {name}: {value} (must be a positive number of seconds)")]
    Timeout { name: &'static str, value: f64 },
    #[error("Concurrency must be at least 1")]
    Concurrency,
    #[error("Retries must be at least 1")]
    Retries,
    #[error("Failed to read config file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },
    #[error("Cannot write output file {}: {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ScanSection {
    pub resolvers: Option<Vec<String>>,
    pub timeout: Option<f64>,
    pub http_timeout: Option<f64>,
    pub retries: Option<u32>,
    pub retry_backoff: Option<f64>,
    pub user_agent: Option<String>,
    pub concurrency: Option<usize>,
    pub crtsh_url: Option<String>,
    pub wildcard_check: Option<bool>,
}

/// Everything a run needs, fixed before the first query goes out.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub domain: Domain,
    pub output: PathBuf,
    pub scan: ScanConfig,
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("subd").join("config.toml"))
}

pub fn load_config() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(Config::default()),
    }
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let file_error = |reason: String| ConfigError::File {
        path: path.to_path_buf(),
        reason,
    };
    let content = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    toml::from_str(&content).map_err(|e| file_error(e.to_string()))
}

pub fn get_default_config_toml() -> String {
    r#"# Subdomain discovery (subd) configuration
# Command-line flags override every value here.

[scan]
# DNS resolvers, IP or IP:port
# resolvers = ["8.8.8.8", "1.1.1.1"]
resolvers = ["8.8.8.8"]

# Per-query DNS timeout in seconds
timeout = 5.0

# Per-attempt crt.sh timeout in seconds
http_timeout = 10.0

# Total crt.sh attempts
retries = 3

# Base delay in seconds between crt.sh attempts, doubled after each failure
retry_backoff = 2.0

# Maximum simultaneous outbound queries
concurrency = 100

# crtsh_url = "https://crt.sh/"
# user_agent = "subd/0.1.0"

# Probe a random label's TXT record to detect wildcard DNS
wildcard_check = true
"#
    .to_string()
}

/// Layers built-in defaults, then the config file, then command-line flags.
pub fn resolve(args: &Args, file: &Config) -> Result<RunConfig, ConfigError> {
    let raw_domain = args.domain.as_deref().unwrap_or_default();
    let domain = Domain::parse(raw_domain)?;

    let defaults = ScanConfig::default();
    let section = &file.scan;

    let resolvers = match args.resolvers.as_ref().or(section.resolvers.as_ref()) {
        Some(list) => parse_resolvers(list)?,
        None => defaults.resolvers,
    };

    let dns_timeout = match args.timeout.or(section.timeout) {
        Some(secs) => seconds("timeout", secs)?,
        None => defaults.dns_timeout,
    };
    let http_timeout = match args.http_timeout.or(section.http_timeout) {
        Some(secs) => seconds("http timeout", secs)?,
        None => defaults.http_timeout,
    };
    let retry_backoff = match section.retry_backoff {
        Some(secs) if secs == 0.0 => Duration::ZERO,
        Some(secs) => seconds("retry backoff", secs)?,
        None => defaults.retry_backoff,
    };

    let retries = args.retries.or(section.retries).unwrap_or(defaults.retries);
    if retries == 0 {
        return Err(ConfigError::Retries);
    }
    let concurrency = args.concurrency.or(section.concurrency).unwrap_or(defaults.concurrency);
    if concurrency == 0 {
        return Err(ConfigError::Concurrency);
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.txt", domain)));

    let scan = ScanConfig {
        resolvers,
        dns_timeout,
        http_timeout,
        retries,
        retry_backoff,
        user_agent: args
            .user_agent
            .clone()
            .or_else(|| section.user_agent.clone())
            .unwrap_or(defaults.user_agent),
        concurrency,
        crtsh_url: args
            .crtsh_url
            .clone()
            .or_else(|| section.crtsh_url.clone())
            .unwrap_or(defaults.crtsh_url),
        wildcard_check: !args.no_wildcard_check && section.wildcard_check.unwrap_or(defaults.wildcard_check),
    };

    Ok(RunConfig { domain, output, scan })
}

pub fn parse_resolvers(list: &[String]) -> Result<Vec<SocketAddr>, ConfigError> {
    let resolvers = list
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(parse_resolver)
        .collect::<Result<Vec<_>, _>>()?;

    if resolvers.is_empty() {
        return Err(ConfigError::NoResolvers);
    }
    Ok(resolvers)
}

fn parse_resolver(entry: &str) -> Result<SocketAddr, ConfigError> {
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Ok(addr);
    }
    entry
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
        .map_err(|_| ConfigError::Resolver(entry.to_string()))
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Timeout { name, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::Timeout { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("subd").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_follow_the_domain() {
        let run = resolve(&args(&["Example.com"]), &Config::default()).unwrap();
        assert_eq!(run.domain.as_str(), "example.com");
        assert_eq!(run.output, PathBuf::from("example.com.txt"));
        assert_eq!(run.scan.resolvers, vec!["8.8.8.8:53".parse::<SocketAddr>().unwrap()]);
        assert_eq!(run.scan.dns_timeout, Duration::from_secs(5));
        assert_eq!(run.scan.http_timeout, Duration::from_secs(10));
        assert_eq!(run.scan.retries, 3);
        assert_eq!(run.scan.concurrency, 100);
        assert!(run.scan.wildcard_check);
    }

    #[test]
    fn flags_override_config_file() {
        let file: Config = toml::from_str(
            r#"
            [scan]
            resolvers = ["9.9.9.9"]
            timeout = 2.5
            retries = 5
            concurrency = 10
            wildcard_check = true
            "#,
        )
        .unwrap();

        let run = resolve(
            &args(&[
                "example.com",
                "-r",
                "1.1.1.1,8.8.4.4:5353",
                "--retries",
                "2",
                "--no-wildcard-check",
                "-o",
                "out/subs.txt",
            ]),
            &file,
        )
        .unwrap();

        assert_eq!(
            run.scan.resolvers,
            vec![
                "1.1.1.1:53".parse::<SocketAddr>().unwrap(),
                "8.8.4.4:5353".parse::<SocketAddr>().unwrap()
            ]
        );
        assert_eq!(run.scan.dns_timeout, Duration::from_millis(2500));
        assert_eq!(run.scan.retries, 2);
        assert_eq!(run.scan.concurrency, 10);
        assert!(!run.scan.wildcard_check);
        assert_eq!(run.output, PathBuf::from("out/subs.txt"));
    }

    #[test]
    fn invalid_input_is_rejected_before_scanning() {
        let file = Config::default();
        assert!(matches!(resolve(&args(&["not a domain"]), &file), Err(ConfigError::Domain(_))));
        assert!(matches!(
            resolve(&args(&["example.com", "-r", "8.8.8.300"]), &file),
            Err(ConfigError::Resolver(_))
        ));
        assert!(matches!(
            resolve(&args(&["example.com", "-t", "0"]), &file),
            Err(ConfigError::Timeout { .. })
        ));
        assert!(matches!(
            resolve(&args(&["example.com", "--concurrency", "0"]), &file),
            Err(ConfigError::Concurrency)
        ));
        assert!(matches!(
            resolve(&args(&["example.com", "--retries", "0"]), &file),
            Err(ConfigError::Retries)
        ));
    }

    #[test]
    fn non_numeric_timeout_is_a_usage_error() {
        assert!(Args::try_parse_from(["subd", "example.com", "-t", "soon"]).is_err());
    }

    #[test]
    fn default_config_parses() {
        let config: Config = toml::from_str(&get_default_config_toml()).unwrap();
        assert_eq!(config.scan.retries, Some(3));
        assert_eq!(config.scan.resolvers, Some(vec!["8.8.8.8".to_string()]));
    }
}
