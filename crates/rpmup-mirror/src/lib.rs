//! Mirror candidate collection and preference-ordered iteration, grounded
//! on `zif-repo-md-metalink.c`'s per-URL protocol/preference attributes and
//! `zif-release.c`'s plain-text mirrorlist usage.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ftp,
    Http,
    Rsync,
    Unknown,
}

impl Protocol {
    pub fn from_text(text: &str) -> Self {
        match text {
            "ftp" => Protocol::Ftp,
            "http" | "https" => Protocol::Http,
            "rsync" => Protocol::Rsync,
            _ => Protocol::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    pub uri: String,
    pub protocol: Protocol,
    pub preference: i32,
}

/// A set of candidate mirror URIs, sorted by descending preference.
#[derive(Debug, Default, Clone)]
pub struct MirrorSet {
    mirrors: Vec<Mirror>,
}

impl MirrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_metalink_entries(entries: Vec<Mirror>) -> Self {
        let mut set = Self { mirrors: entries };
        set.sort();
        set
    }

    /// Parse a plain mirrorlist: one URI per line, blank lines and lines
    /// starting with `#` are skipped. Preference is assigned by line order
    /// (earlier lines preferred), matching a mirrorlist's implicit
    /// ordering since it carries no explicit preference attribute. The
    /// protocol is taken from the URI's own scheme (a plain mirrorlist
    /// carries no separate `protocol=` attribute the way metalink does).
    pub fn from_mirrorlist_text(text: &str) -> Self {
        let mut mirrors = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let protocol = url::Url::parse(trimmed)
                .map(|u| Protocol::from_text(u.scheme()))
                .unwrap_or(Protocol::Unknown);
            mirrors.push(Mirror {
                uri: trimmed.to_string(),
                protocol,
                preference: -(index as i32),
            });
        }
        let mut set = Self { mirrors };
        set.sort();
        set
    }

    fn sort(&mut self) {
        self.mirrors.sort_by(|a, b| b.preference.cmp(&a.preference));
    }

    pub fn add(&mut self, mirror: Mirror) {
        self.mirrors.push(mirror);
        self.sort();
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    /// HTTP mirrors at or above `threshold` preference, highest first.
    /// Per spec §4.D, metalink mirror selection is restricted to the HTTP
    /// protocol regardless of what other protocols the metalink carries.
    pub fn get_mirrors(&self, threshold: i32) -> Vec<&Mirror> {
        self.mirrors
            .iter()
            .filter(|m| m.protocol == Protocol::Http && m.preference >= threshold)
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mirror> {
        self.mirrors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metalink_entries_sorted_by_preference_descending() {
        let set = MirrorSet::from_metalink_entries(vec![
            Mirror { uri: "a".into(), protocol: Protocol::Http, preference: 50 },
            Mirror { uri: "b".into(), protocol: Protocol::Http, preference: 100 },
            Mirror { uri: "c".into(), protocol: Protocol::Ftp, preference: 10 },
        ]);
        let uris: Vec<&str> = set.iter().map(|m| m.uri.as_str()).collect();
        assert_eq!(uris, vec!["b", "a", "c"]);
    }

    #[test]
    fn get_mirrors_filters_below_threshold() {
        let set = MirrorSet::from_metalink_entries(vec![
            Mirror { uri: "a".into(), protocol: Protocol::Http, preference: 50 },
            Mirror { uri: "b".into(), protocol: Protocol::Http, preference: 100 },
            Mirror { uri: "c".into(), protocol: Protocol::Ftp, preference: 10 },
        ]);
        let above = set.get_mirrors(50);
        let uris: Vec<&str> = above.iter().map(|m| m.uri.as_str()).collect();
        assert_eq!(uris, vec!["b", "a"]);
    }

    #[test]
    fn get_mirrors_excludes_non_http_even_above_threshold() {
        // a high-preference FTP entry must never satisfy an HTTP-only caller.
        let set = MirrorSet::from_metalink_entries(vec![
            Mirror { uri: "http-hit".into(), protocol: Protocol::Http, preference: 70 },
            Mirror { uri: "ftp-higher".into(), protocol: Protocol::Ftp, preference: 90 },
        ]);
        let above = set.get_mirrors(50);
        let uris: Vec<&str> = above.iter().map(|m| m.uri.as_str()).collect();
        assert_eq!(uris, vec!["http-hit"]);
    }

    #[test]
    fn mirrorlist_text_skips_comments_and_blanks() {
        let text = "# comment\nhttp://one\n\nhttp://two\n";
        let set = MirrorSet::from_mirrorlist_text(text);
        let uris: Vec<&str> = set.iter().map(|m| m.uri.as_str()).collect();
        assert_eq!(uris, vec!["http://one", "http://two"]);
    }

    #[test]
    fn mirrorlist_text_detects_protocol_from_scheme() {
        let text = "ftp://mirror.example/path\nhttp://mirror.example/path\n";
        let set = MirrorSet::from_mirrorlist_text(text);
        let protocols: Vec<Protocol> = set.iter().map(|m| m.protocol).collect();
        assert!(protocols.contains(&Protocol::Ftp));
        assert!(protocols.contains(&Protocol::Http));
    }

    #[test]
    fn protocol_from_text_maps_known_schemes() {
        assert_eq!(Protocol::from_text("http"), Protocol::Http);
        assert_eq!(Protocol::from_text("ftp"), Protocol::Ftp);
        assert_eq!(Protocol::from_text("rsync"), Protocol::Rsync);
        assert_eq!(Protocol::from_text("gopher"), Protocol::Unknown);
    }
}
