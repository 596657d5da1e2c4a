//! `NamedRestriction` — a whitelist/blacklist pair over service paths
//! (§4.10: "each account holds two `NamedRestriction` trees").
//!
//! Paths are POSIX-like (§6: "absolute form `/a/b/c`"); a restriction
//! entry matches its own path and everything nested under it, the way a
//! directory permission covers its children.

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}

fn is_under(path: &[&str], prefix: &[&str]) -> bool {
    prefix.len() <= path.len() && path[..prefix.len()] == prefix[..]
}

/// Gates access to a tree of service paths. With no whitelist, everything
/// not blacklisted is allowed; a whitelist makes the default deny.
#[derive(Debug, Clone, Default)]
pub struct NamedRestriction {
    whitelist: Option<Vec<String>>,
    blacklist: Vec<String>,
}

impl NamedRestriction {
    pub fn new() -> Self {
        NamedRestriction::default()
    }

    pub fn allow(mut self, path: impl Into<String>) -> Self {
        self.whitelist.get_or_insert_with(Vec::new).push(path.into());
        self
    }

    pub fn deny(mut self, path: impl Into<String>) -> Self {
        self.blacklist.push(path.into());
        self
    }

    /// §4.10: "`isAllowed(path)` is consulted on every remote method that
    /// references a service."
    pub fn is_allowed(&self, path: &str) -> bool {
        let target = segments(path);
        if self.blacklist.iter().any(|entry| is_under(&target, &segments(entry))) {
            return false;
        }
        match &self.whitelist {
            None => true,
            Some(entries) => entries.iter().any(|entry| is_under(&target, &segments(entry))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_restrictions_allows_everything() {
        let restriction = NamedRestriction::new();
        assert!(restriction.is_allowed("/a/b/c"));
    }

    #[test]
    fn blacklist_denies_path_and_children() {
        let restriction = NamedRestriction::new().deny("/secret");
        assert!(!restriction.is_allowed("/secret"));
        assert!(!restriction.is_allowed("/secret/nested"));
        assert!(restriction.is_allowed("/public"));
    }

    #[test]
    fn whitelist_makes_default_deny() {
        let restriction = NamedRestriction::new().allow("/editor");
        assert!(restriction.is_allowed("/editor/cursor"));
        assert!(!restriction.is_allowed("/other"));
    }

    #[test]
    fn blacklist_wins_over_overlapping_whitelist() {
        let restriction = NamedRestriction::new().allow("/editor").deny("/editor/admin");
        assert!(restriction.is_allowed("/editor/cursor"));
        assert!(!restriction.is_allowed("/editor/admin"));
    }
}
