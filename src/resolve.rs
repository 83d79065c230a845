//! Host-to-platform resolution.
//!
//! Maps a combined host+path string (no scheme, no query) onto a rule
//! table entry and produces the ordered selector list for that page.
//! Matching is purely syntactic: one leading `www.` label is dropped,
//! hostnames match exactly or at a `.` label boundary, and path prefixes
//! only count when followed by a path separator or the end of the path.
//! The first matching rule in table order wins. Fallback selectors are
//! appended whether or not a rule matched; an unmatched host yields
//! `platform: None`, which withholds activation but still lets an
//! explicit insertion attempt report a precise failure.

use crate::rules::{self, PlatformRule};

/// Outcome of resolving a page location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Rule name when a platform rule matched.
    pub platform: Option<&'static str>,
    /// Selectors to probe, platform-specific first, fallbacks last.
    pub selectors: Vec<&'static str>,
}

/// Resolves against the built-in table.
pub fn resolve(host_path: &str) -> Resolution {
    resolve_in(rules::TABLE, host_path)
}

fn resolve_in(table: &[PlatformRule], host_path: &str) -> Resolution {
    let trimmed = host_path.strip_prefix("www.").unwrap_or(host_path);
    let (host, path) = split_host_path(trimmed);
    let hit = table.iter().find(|rule| rule_matches(rule, host, path));

    let mut selectors = Vec::new();
    if let Some(rule) = hit {
        selectors.extend_from_slice(rule.selectors);
    }
    selectors.extend_from_slice(rules::FALLBACK_SELECTORS);

    Resolution {
        platform: hit.map(|rule| rule.name),
        selectors,
    }
}

fn split_host_path(input: &str) -> (&str, &str) {
    match input.find('/') {
        Some(slash) => input.split_at(slash),
        None => (input, ""),
    }
}

fn rule_matches(rule: &PlatformRule, host: &str, path: &str) -> bool {
    if !rule.hostnames.iter().any(|h| host_matches(host, h)) {
        return false;
    }
    match rule.path_prefix {
        None => true,
        Some(prefix) => {
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    }
}

fn host_matches(host: &str, rule_host: &str) -> bool {
    host == rule_host
        || host
            .strip_suffix(rule_host)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
