use crate::config::ConfigError;
use console::style;
use libsubdomain_storm::{AggregateResult, Source, SourceStatus};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Opens (and truncates) the output file up front so an unwritable path
/// fails before any network activity.
pub fn open_output(path: &Path) -> Result<File, ConfigError> {
    let output_error = |source: io::Error| ConfigError::Output {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(output_error)?;
    }
    File::create(path).map_err(output_error)
}

/// One name per line, in the order given, no header.
pub fn write_subdomains(file: File, subdomains: &[String]) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    for name in subdomains {
        writeln!(writer, "{}", name)?;
    }
    writer.flush()
}

pub fn display_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

pub fn summary_lines(result: &AggregateResult, output: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for source in [Source::Dns, Source::Crtsh] {
        let Some(summary) = result.sources.get(&source) else {
            continue;
        };
        let line = match &summary.status {
            SourceStatus::Ok | SourceStatus::Warning(_) => {
                format!("{}: {} found", source, summary.stats.accepted)
            }
            SourceStatus::Failed(reason) => format!("{}: {} found (failed: {})", source, summary.stats.accepted, reason),
            SourceStatus::Cancelled => format!("{}: {} found (cancelled)", source, summary.stats.accepted),
        };
        lines.push(line);
    }

    if result.wildcard_detected {
        lines.push("Wildcard DNS detected; some names may be wildcard artifacts".to_string());
    }
    lines.push(format!("Total unique: {}", result.total()));
    lines.push(format!("Results saved to: {}", output.display()));
    lines
}

pub fn print_summary(result: &AggregateResult, output: &Path) {
    println!();
    for line in summary_lines(result, output) {
        println!("{} {}", style("[*]").cyan().bold(), line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsubdomain_storm::{merge, DiscoveryResult, Domain};

    fn scenario() -> AggregateResult {
        let domain = Domain::parse("example.com").unwrap();
        let mut dns = DiscoveryResult::new(Source::Dns);
        dns.candidates = vec!["mail.example.com".into(), "api.example.com".into()];
        let mut ct = DiscoveryResult::new(Source::Crtsh);
        ct.candidates = ["api", "shop", "blog", "test", "dev"]
            .iter()
            .map(|l| format!("{}.example.com", l))
            .collect();
        merge(&domain, &[dns, ct])
    }

    #[test]
    fn summary_reports_counts_per_source() {
        let lines = summary_lines(&scenario(), Path::new("example.com.txt"));
        assert_eq!(
            lines,
            vec![
                "DNS: 2 found",
                "crt.sh: 5 found",
                "Total unique: 6",
                "Results saved to: example.com.txt",
            ]
        );
    }

    #[test]
    fn output_file_is_sorted_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("example.com.txt");

        let file = open_output(&path).unwrap();
        write_subdomains(file, &scenario().subdomains).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "api.example.com\nblog.example.com\ndev.example.com\nmail.example.com\nshop.example.com\ntest.example.com\n"
        );
    }

    #[test]
    fn existing_output_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "stale.example.com\nold.example.com\n").unwrap();

        let file = open_output(&path).unwrap();
        write_subdomains(file, &[]).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn unwritable_output_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let result = open_output(&blocker.join("out.txt"));
        assert!(matches!(result, Err(ConfigError::Output { .. })));
    }
}
