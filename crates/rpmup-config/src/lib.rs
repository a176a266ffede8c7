//! Typed key/value configuration with `$variable` template expansion, kept
//! behind a trait so collaborators depend on an interface rather than a
//! process-global singleton.

pub mod error;

use std::collections::HashMap;
use std::path::Path;

pub use error::ConfigError;

/// A scoped, restorable view over string/uint configuration values.
///
/// `rpmup-engine` uses `set_uint`/`unset` to temporarily override
/// `releasever` during a Complete-mode upgrade; callers are expected to
/// restore the prior value on every exit path (see
/// [`Configuration::scoped_override`]).
pub trait Configuration {
    fn get_string(&self, key: &str) -> Option<String>;
    fn get_uint(&self, key: &str) -> Result<Option<u64>, ConfigError>;
    fn set_uint(&mut self, key: &str, value: u64);
    fn set_string(&mut self, key: &str, value: String);
    fn unset(&mut self, key: &str);

    /// Expand `$variable` and `${variable}` references in `template` using
    /// this configuration's string values. Unknown variables are left
    /// untouched.
    fn expand(&self, template: &str) -> String {
        expand_variables(template, |name| self.get_string(name))
    }
}

/// Replace `$name` / `${name}` occurrences in `input` via `lookup`,
/// grounded on `soar_utils::path::resolve_path`'s environment-variable
/// expansion.
pub fn expand_variables(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'{' {
                if let Some(end) = input[i + 2..].find('}') {
                    let name = &input[i + 2..i + 2 + end];
                    match lookup(name) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push_str("${");
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    i += 2 + end + 1;
                    continue;
                }
            } else if bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_' {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let name = &input[start..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('$');
                        out.push_str(name);
                    }
                }
                i = end;
                continue;
            }
        }
        let ch_len = input[i..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
        out.push_str(&input[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// A `HashMap`-backed [`Configuration`] implementation, the default
/// concrete type used by `rpmup-cli`.
#[derive(Debug, Default, Clone)]
pub struct MapConfiguration {
    strings: HashMap<String, String>,
}

impl MapConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_toml(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table: toml::Table = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let mut strings = HashMap::new();
        for (key, value) in table {
            let as_string = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            strings.insert(key, as_string);
        }
        Ok(Self { strings })
    }
}

impl Configuration for MapConfiguration {
    fn get_string(&self, key: &str) -> Option<String> {
        self.strings.get(key).cloned()
    }

    fn get_uint(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        match self.strings.get(key) {
            None => Ok(None),
            Some(value) => value
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ConfigError::NotAUint {
                    key: key.to_string(),
                    value: value.clone(),
                }),
        }
    }

    fn set_uint(&mut self, key: &str, value: u64) {
        self.strings.insert(key.to_string(), value.to_string());
    }

    fn set_string(&mut self, key: &str, value: String) {
        self.strings.insert(key.to_string(), value);
    }

    fn unset(&mut self, key: &str) {
        self.strings.remove(key);
    }
}

/// RAII guard that restores a uint key to its prior value (or unsets it if
/// it had none) when dropped, modeling the releasever scope guard spec
/// requires around Complete-mode upgrades.
pub struct UintOverrideGuard<'a> {
    config: &'a mut dyn Configuration,
    key: String,
    previous: Option<u64>,
}

impl<'a> UintOverrideGuard<'a> {
    pub fn new(config: &'a mut dyn Configuration, key: &str, value: u64) -> Self {
        let previous = config.get_uint(key).ok().flatten();
        config.set_uint(key, value);
        Self {
            config,
            key: key.to_string(),
            previous,
        }
    }
}

impl Drop for UintOverrideGuard<'_> {
    fn drop(&mut self) {
        match self.previous {
            Some(value) => self.config.set_uint(&self.key, value),
            None => self.config.unset(&self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_dollar_brace_variable() {
        let expanded = expand_variables("repo is $name at ${place}!", |name| match name {
            "name" => Some("fedora".to_string()),
            "place" => Some("mirror".to_string()),
            _ => None,
        });
        assert_eq!(expanded, "repo is fedora at mirror!");
    }

    #[test]
    fn unknown_variable_left_untouched() {
        let expanded = expand_variables("value $unknown here", |_| None);
        assert_eq!(expanded, "value $unknown here");
    }

    #[test]
    fn map_configuration_roundtrip() {
        let mut cfg = MapConfiguration::new();
        cfg.set_uint("releasever", 38);
        assert_eq!(cfg.get_uint("releasever").unwrap(), Some(38));
        cfg.unset("releasever");
        assert_eq!(cfg.get_uint("releasever").unwrap(), None);
    }

    #[test]
    fn override_guard_restores_previous_value_on_drop() {
        let mut cfg = MapConfiguration::new();
        cfg.set_uint("releasever", 38);
        {
            let _guard = UintOverrideGuard::new(&mut cfg, "releasever", 39);
            assert_eq!(cfg.get_uint("releasever").unwrap(), Some(39));
        }
        assert_eq!(cfg.get_uint("releasever").unwrap(), Some(38));
    }

    #[test]
    fn override_guard_unsets_when_no_previous_value() {
        let mut cfg = MapConfiguration::new();
        {
            let _guard = UintOverrideGuard::new(&mut cfg, "releasever", 39);
            assert_eq!(cfg.get_uint("releasever").unwrap(), Some(39));
        }
        assert_eq!(cfg.get_uint("releasever").unwrap(), None);
    }

    #[test]
    fn load_toml_reads_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "basearch = \"x86_64\"\nreleasever = \"38\"\n").unwrap();
        let cfg = MapConfiguration::load_toml(&path).unwrap();
        assert_eq!(cfg.get_string("basearch").unwrap(), "x86_64");
        assert_eq!(cfg.get_uint("releasever").unwrap(), Some(38));
    }
}
