//! User input validation and base-domain normalization
//!
//! Users type whatever they copied from the address bar: bare domains, full
//! URLs, URLs with paths and ports. Both functions here parse the input as a
//! URL (adding `http://` when no scheme is given) and work on the hostname.
//!
//! # Examples
//!
//! ```
//! use sb_core::domain::{normalize, validate};
//!
//! assert!(validate("example.com"));
//! assert_eq!(normalize("https://sub.example.com/path").as_deref(), Some("example.com"));
//! ```
//!
//! # Limitations
//!
//! The base domain is simply the last two labels of the host. Multi-part
//! public suffixes are not special-cased, so `example.co.uk` normalizes to
//! `co.uk`.

use ::url::Url;

/// Scheme assumed when the user typed a bare domain.
pub const DEFAULT_SCHEME: &str = "http://";

const MIN_TLD_LEN: usize = 2;
const MAX_TLD_LEN: usize = 11;

/// Error returned by [`canonicalize`] for input that is not a usable domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid URL: {0:?}")]
pub struct InvalidUrl(pub String);

/// Parse raw input and return its lowercased hostname.
fn parse_hostname(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{DEFAULT_SCHEME}{raw}"))
    };

    // Hosts under non-special schemes come back with their original case
    parsed.ok()?.host_str().map(|host| host.to_ascii_lowercase())
}

/// Check a hostname against the accepted shape: one or more `label.`
/// segments followed by an alphabetic top-level label of 2 to 11 characters.
fn is_well_formed_host(host: &str) -> bool {
    let Some((labels, tld)) = host.rsplit_once('.') else {
        return false;
    };

    let tld_ok = (MIN_TLD_LEN..=MAX_TLD_LEN).contains(&tld.len())
        && tld.bytes().all(|b| b.is_ascii_alphabetic());

    tld_ok
        && labels.split('.').all(|label| {
            !label.is_empty() && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

/// Check whether raw user input names a blockable domain.
///
/// Fails closed: anything that does not parse is rejected.
pub fn validate(raw: &str) -> bool {
    parse_hostname(raw).is_some_and(|host| is_well_formed_host(&host))
}

/// Reduce raw user input to its base domain (the last two host labels).
///
/// Returns `None` only when no hostname can be parsed. No shape validation
/// is done here; use [`validate`] or [`canonicalize`] for that.
pub fn normalize(raw: &str) -> Option<String> {
    let host = parse_hostname(raw)?;
    let labels: Vec<&str> = host.split('.').collect();

    if labels.len() <= 2 {
        return Some(host);
    }

    Some(labels[labels.len() - 2..].join("."))
}

/// Validate then normalize.
pub fn canonicalize(raw: &str) -> Result<String, InvalidUrl> {
    if !validate(raw) {
        return Err(InvalidUrl(raw.to_string()));
    }
    normalize(raw).ok_or_else(|| InvalidUrl(raw.to_string()))
}
