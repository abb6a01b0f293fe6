//! Network match patterns
//!
//! Every blocked base domain `d` yields two patterns, written in browser
//! match-pattern syntax:
//!
//! - `*://d/*` matches host `d` under any scheme and path
//! - `*://*.d/*` matches any subdomain of `d` under any scheme and path

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::url::host_eq;

/// Error type for pattern parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported pattern: {0:?}")]
pub struct PatternError(pub String);

/// A single match pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pattern {
    /// Host is exactly the domain
    Exact(String),
    /// Host is a strict subdomain of the domain
    Subdomains(String),
}

impl Pattern {
    pub fn domain(&self) -> &str {
        match self {
            Self::Exact(d) | Self::Subdomains(d) => d,
        }
    }

    /// Check a request host against this pattern.
    #[inline]
    pub fn matches_host(&self, host: &str) -> bool {
        match self {
            Self::Exact(domain) => host_eq(host, domain),
            Self::Subdomains(domain) => {
                let host = host.strip_suffix('.').unwrap_or(host);
                let (host, domain) = (host.as_bytes(), domain.as_bytes());
                host.len() > domain.len() + 1
                    && host[host.len() - domain.len() - 1] == b'.'
                    && host[host.len() - domain.len()..].eq_ignore_ascii_case(domain)
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(d) => write!(f, "*://{}/*", d),
            Self::Subdomains(d) => write!(f, "*://*.{}/*", d),
        }
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let host = s
            .strip_prefix("*://")
            .and_then(|rest| rest.strip_suffix("/*"))
            .filter(|host| !host.is_empty() && !host.contains(['/', ':', '?', '#']))
            .ok_or_else(|| PatternError(s.to_string()))?;

        match host.strip_prefix("*.") {
            Some(domain) if !domain.is_empty() && !domain.contains('*') => Ok(Self::Subdomains(domain.to_string())),
            Some(_) => Err(PatternError(s.to_string())),
            None if !host.contains('*') => Ok(Self::Exact(host.to_string())),
            None => Err(PatternError(s.to_string())),
        }
    }
}

/// An ordered, deduplicated set of patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: BTreeSet<Pattern>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both patterns for a blocked base domain.
    pub fn insert_domain(&mut self, domain: &str) -> usize {
        let exact = self.patterns.insert(Pattern::Exact(domain.to_string()));
        let sub = self.patterns.insert(Pattern::Subdomains(domain.to_string()));
        exact as usize + sub as usize
    }

    pub fn insert(&mut self, pattern: Pattern) -> bool {
        self.patterns.insert(pattern)
    }

    pub fn contains(&self, pattern: &Pattern) -> bool {
        self.patterns.contains(pattern)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// First pattern matching `host`, if any.
    pub fn matching(&self, host: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.matches_host(host))
    }

    /// Rendered patterns, in set order.
    pub fn to_strings(&self) -> Vec<String> {
        self.patterns.iter().map(Pattern::to_string).collect()
    }
}

impl FromIterator<Pattern> for PatternSet {
    fn from_iter<I: IntoIterator<Item = Pattern>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type Item = &'a Pattern;
    type IntoIter = std::collections::btree_set::Iter<'a, Pattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

impl fmt::Display for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pattern) in self.patterns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", pattern)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_matches_only_domain() {
        let p = Pattern::Exact("reddit.com".to_string());
        assert!(p.matches_host("reddit.com"));
        assert!(p.matches_host("REDDIT.com."));
        assert!(!p.matches_host("old.reddit.com"));
        assert!(!p.matches_host("notreddit.com"));
    }

    #[test]
    fn test_subdomains_match_strict_subdomains() {
        let p = Pattern::Subdomains("reddit.com".to_string());
        assert!(p.matches_host("old.reddit.com"));
        assert!(p.matches_host("a.b.reddit.com"));
        assert!(p.matches_host("Old.Reddit.Com."));
        assert!(!p.matches_host("reddit.com"));
        assert!(!p.matches_host("notreddit.com"));
        assert!(!p.matches_host(".reddit.com"));
        assert!(!p.matches_host("reddit.com.evil.net"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Pattern::Exact("x.com".to_string()).to_string(), "*://x.com/*");
        assert_eq!(Pattern::Subdomains("x.com".to_string()).to_string(), "*://*.x.com/*");
    }

    #[test]
    fn test_parse() {
        assert_eq!("*://x.com/*".parse::<Pattern>(), Ok(Pattern::Exact("x.com".to_string())));
        assert_eq!("*://*.x.com/*".parse::<Pattern>(), Ok(Pattern::Subdomains("x.com".to_string())));
        assert!("https://x.com/*".parse::<Pattern>().is_err());
        assert!("*://x.com/path".parse::<Pattern>().is_err());
        assert!("*://*./*".parse::<Pattern>().is_err());
        assert!("*://*.*.x.com/*".parse::<Pattern>().is_err());
        assert!("*:///*".parse::<Pattern>().is_err());
    }

    #[test]
    fn test_set_dedupes_domains() {
        let mut set = PatternSet::new();
        assert_eq!(set.insert_domain("x.com"), 2);
        assert_eq!(set.insert_domain("x.com"), 0);
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_strings(), vec!["*://x.com/*", "*://*.x.com/*"]);
    }

    #[test]
    fn test_set_matching() {
        let set: PatternSet = ["a.com", "b.org"]
            .iter()
            .flat_map(|d| [Pattern::Exact(d.to_string()), Pattern::Subdomains(d.to_string())])
            .collect();
        assert_eq!(set.matching("www.b.org"), Some(&Pattern::Subdomains("b.org".to_string())));
        assert_eq!(set.matching("a.com"), Some(&Pattern::Exact("a.com".to_string())));
        assert_eq!(set.matching("c.net"), None);
    }
}
