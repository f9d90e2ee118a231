use std::fmt;
use thiserror::Error;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Domain is empty")]
    Empty,
    #[error("Invalid domain format: {0}")]
    InvalidDomain(String),
    #[error("Domain needs at least two labels: {0}")]
    BareLabel(String),
}

/// The root name being scanned: lowercase, no surrounding dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Empty);
        }

        let name = trimmed.strip_suffix('.').unwrap_or(trimmed).to_lowercase();
        if !is_valid_hostname(&name) {
            return Err(DomainError::InvalidDomain(trimmed.to_string()));
        }
        if !name.contains('.') {
            return Err(DomainError::BareLabel(trimmed.to_string()));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `name` is this domain or one of its strict subdomains.
    /// `name` must already be normalized.
    pub fn contains(&self, name: &str) -> bool {
        name == self.0
            || name
                .strip_suffix(self.0.as_str())
                .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Turns an untrusted name from a DNS answer or a CT log entry into a
/// normalized subdomain of `domain`, or `None` if it is malformed or out of
/// scope.
pub fn normalize_candidate(raw: &str, domain: &Domain) -> Option<String> {
    let mut name = raw.trim().to_lowercase();

    while let Some(rest) = name.strip_prefix("*.") {
        name = rest.to_string();
    }
    if let Some(rest) = name.strip_suffix('.') {
        name = rest.to_string();
    }

    if !is_valid_hostname(&name) || !domain.contains(&name) {
        return None;
    }
    Some(name)
}

fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }

    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    })
}
