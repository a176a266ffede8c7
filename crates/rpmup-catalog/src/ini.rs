//! Minimal GKeyFile-style INI reader: `[group]` headers followed by
//! `key = value` (or `key=value`) lines, `#`/`;` comment lines, blank
//! lines skipped. `releases.txt` is this format, not TOML — TOML requires
//! quoted string values, which `releases.txt` in the wild does not use.

/// Parse `text` into an ordered list of `(group_name, key_values)`.
/// Keys/values outside any `[group]` header are ignored, matching
/// `g_key_file_get_groups`'s group-scoped model.
pub fn parse(text: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut groups: Vec<(String, Vec<(String, String)>)> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            groups.push((name.trim().to_string(), Vec::new()));
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        if let Some((_, entries)) = groups.last_mut() {
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    groups
}

pub fn lookup<'a>(entries: &'a [(String, String)], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
