//! GKeyFile-style parsing for `.treeinfo` and the system `i18n`/`keyboard`
//! defaults files, grounded on `zif_release_get_treeinfo`'s
//! `g_key_file_load_from_file` usage and `zif_release_get_keyfile_value`'s
//! hand-rolled shell-assignment scan.

use std::collections::HashMap;
use std::path::Path;

/// A GKeyFile-style document: named `[section]`s of `key = value` pairs.
#[derive(Debug, Default, Clone)]
pub struct KeyFile {
    sections: HashMap<String, HashMap<String, String>>,
}

impl KeyFile {
    pub fn parse(text: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            if let Some(section) = &current {
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Self { sections }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }
}

/// Read a `KEY="value"` shell-style assignment from `path`, matching
/// `zif_release_get_keyfile_value`: the first line starting with `key`
/// yields the text between the following `="` and the next `"`.
pub fn read_shell_assignment(path: &Path, key: &str) -> Option<String> {
    let data = std::fs::read_to_string(path).ok()?;
    for line in data.lines() {
        if let Some(rest) = line.strip_prefix(key) {
            let rest = rest.strip_prefix("=\"")?;
            let value = rest.split('"').next().unwrap_or(rest);
            return Some(value.to_string());
        }
    }
    None
}
