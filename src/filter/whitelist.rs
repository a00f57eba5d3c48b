//! Whitelist of domains that bypass the portal.
//!
//! Entries are matched as plain substrings of the queried name, so
//! `"example.com"` lets through `"example.com."`, `"www.example.com."` and
//! anything else containing it.

/// An ordered set of approved domain substrings.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<String>,
}

impl Whitelist {
    /// Create a whitelist from the given entries, kept in order as given.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|entry| entry.as_ref().to_string())
            .collect();

        Self { entries }
    }

    /// Check if a domain is approved.
    ///
    /// An empty domain never matches.
    pub fn matches(&self, domain: &str) -> bool {
        self.matching_entry(domain).is_some()
    }

    /// First entry contained in `domain`, if any.
    pub fn matching_entry(&self, domain: &str) -> Option<&str> {
        if domain.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| domain.contains(entry.as_str()))
            .map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Returns the number of entries in the whitelist.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
