use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "subd")]
#[command(about = "Subdomain discovery via DNS probing and certificate transparency logs", long_about = None)]
#[command(version)]
pub struct Args {
    /// Root domain to scan
    #[arg(required_unless_present_any = ["print_default_config", "write_default_config"])]
    pub domain: Option<String>,

    /// Output file path (default: <domain>.txt)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Comma-separated list of DNS resolvers, IP or IP:port (default: 8.8.8.8)
    #[arg(long, short = 'r', value_delimiter = ',')]
    pub resolvers: Option<Vec<String>>,

    /// Timeout in seconds for each DNS query (default: 5.0)
    #[arg(long, short = 't')]
    pub timeout: Option<f64>,

    /// Timeout in seconds for each crt.sh request attempt (default: 10.0)
    #[arg(long)]
    pub http_timeout: Option<f64>,

    /// Number of attempts for the crt.sh request (default: 3)
    #[arg(long)]
    pub retries: Option<u32>,

    /// User-Agent header for HTTP requests
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Maximum simultaneous outbound DNS/HTTP queries (default: 100)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Certificate transparency endpoint (default: https://crt.sh/)
    #[arg(long)]
    pub crtsh_url: Option<String>,

    /// Skip the wildcard TXT probe
    #[arg(long)]
    pub no_wildcard_check: bool,

    /// Print the aggregate result as JSON instead of the human summary
    #[arg(long, short = 'j')]
    pub json: bool,

    /// Verbose logging (debug level)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Print the default config to stdout and exit
    #[arg(long)]
    pub print_default_config: bool,

    /// Write the default config to the config path and exit
    #[arg(long)]
    pub write_default_config: bool,
}
