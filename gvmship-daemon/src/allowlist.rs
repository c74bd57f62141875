//! Caller IP allow-list for the trigger endpoint.
//!
//! The allow-list file holds one address per line. Blank lines are
//! ignored and lines that do not parse as an IP address are skipped with a
//! warning. A missing, unreadable or effectively empty file falls back to
//! loopback only.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use tracing::{info, warn};

/// Address allowed when no usable allow-list is configured.
pub const DEFAULT_ALLOWED: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Set of caller addresses permitted to hit the trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    entries: BTreeSet<IpAddr>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::localhost_only()
    }
}

impl AllowList {
    /// Allow-list containing only `127.0.0.1`.
    pub fn localhost_only() -> Self {
        Self::from_addrs([DEFAULT_ALLOWED])
    }

    /// Build from explicit addresses. An empty input yields
    /// [`AllowList::localhost_only`].
    pub fn from_addrs(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        let entries: BTreeSet<IpAddr> = addrs.into_iter().map(canonical).collect();
        if entries.is_empty() {
            return Self {
                entries: BTreeSet::from([DEFAULT_ALLOWED]),
            };
        }
        Self { entries }
    }

    /// Parse allow-list file content.
    pub fn parse(content: &str) -> Self {
        let addrs = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match line.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    warn!(entry = line, "skipping invalid allow-list entry");
                    None
                }
            });
        Self::from_addrs(addrs)
    }

    /// Load the allow-list file, falling back to loopback only when the
    /// file cannot be read.
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let list = Self::parse(&content);
                info!(
                    path = %path.display(),
                    entries = list.len(),
                    "allow-list loaded"
                );
                list
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "cannot read allow-list, allowing 127.0.0.1 only"
                );
                Self::localhost_only()
            }
        }
    }

    /// Whether `ip` may trigger a run.
    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        self.entries.contains(&canonical(ip))
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; an allow-list holds at least the fallback entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &IpAddr> {
        self.entries.iter()
    }
}

/// IPv4-mapped IPv6 addresses compare as their IPv4 form.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn parse_skips_blank_and_invalid_lines() {
        let list = AllowList::parse("10.0.0.1\n\n  192.168.1.5  \nnot-an-ip\n::1\n");
        assert_eq!(list.len(), 3);
        assert!(list.is_allowed(ip("10.0.0.1")));
        assert!(list.is_allowed(ip("192.168.1.5")));
        assert!(list.is_allowed(ip("::1")));
        assert!(!list.is_allowed(ip("127.0.0.1")));
    }

    #[test]
    fn empty_content_falls_back_to_localhost() {
        let list = AllowList::parse("\n   \n");
        assert_eq!(list, AllowList::localhost_only());
        assert!(list.is_allowed(DEFAULT_ALLOWED));
    }

    #[test]
    fn only_invalid_entries_fall_back_to_localhost() {
        let list = AllowList::parse("garbage\n300.1.1.1\n");
        assert_eq!(list, AllowList::localhost_only());
    }

    #[test]
    fn mapped_ipv6_matches_ipv4_entry() {
        let list = AllowList::parse("10.1.2.3\n");
        let mapped = IpAddr::V6(Ipv4Addr::new(10, 1, 2, 3).to_ipv6_mapped());
        assert!(list.is_allowed(mapped));
    }

    #[test]
    fn mapped_ipv6_entry_matches_ipv4_peer() {
        let list = AllowList::parse("::ffff:10.1.2.3\n");
        assert!(list.is_allowed(ip("10.1.2.3")));
    }

    #[test]
    fn ipv6_loopback_is_not_ipv4_loopback() {
        let list = AllowList::localhost_only();
        assert!(!list.is_allowed(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn duplicates_collapse() {
        let list = AllowList::parse("10.0.0.1\n10.0.0.1\n");
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().count(), 1);
    }

    #[tokio::test]
    async fn load_missing_file_is_localhost_only() {
        let dir = tempfile::tempdir().unwrap();
        let list = AllowList::load(&dir.path().join("absent")).await;
        assert_eq!(list, AllowList::localhost_only());
    }

    #[tokio::test]
    async fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allowed_ips");
        std::fs::write(&path, "172.16.0.9\n").unwrap();
        let list = AllowList::load(&path).await;
        assert!(list.is_allowed(ip("172.16.0.9")));
        assert!(!list.is_allowed(DEFAULT_ALLOWED));
    }
}
