//! `repomd.xml` parser: the Yum-classic master metadata manifest.
//!
//! Grounded on `zif-repo-md-master.c`'s `start_element`/`end_element`/`text`
//! SAX callbacks, re-expressed over `quick_xml`'s pull-based `Reader`.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::RepomdError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoDataKind {
    Primary,
    Filelists,
    Other,
    Comps,
}

impl RepoDataKind {
    fn from_type_attr(value: &str) -> Option<Self> {
        match value {
            "primary_db" => Some(Self::Primary),
            "filelists_db" => Some(Self::Filelists),
            "other_db" => Some(Self::Other),
            "group_gz" => Some(Self::Comps),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgo {
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumAlgo {
    fn from_type_attr(value: &str) -> Self {
        match value {
            "sha256" => Self::Sha256,
            "sha" | "sha1" => Self::Sha1,
            _ => Self::Md5,
        }
    }
}

/// One `<data type="...">` block of `repomd.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoDataEntry {
    pub location: Option<String>,
    pub checksum: Option<String>,
    pub checksum_open: Option<String>,
    pub checksum_algo: Option<ChecksumAlgo>,
    pub timestamp: u64,
}

/// Parsed `repomd.xml`: one [`RepoDataEntry`] per recognized kind.
#[derive(Debug, Clone, Default)]
pub struct RepoMetadata {
    entries: HashMap<RepoDataKind, RepoDataEntry>,
}

impl RepoMetadata {
    pub fn entry(&self, kind: RepoDataKind) -> Option<&RepoDataEntry> {
        self.entries.get(&kind)
    }

    pub fn has_kind(&self, kind: RepoDataKind) -> bool {
        self.entries.contains_key(&kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Checksum,
    ChecksumOpen,
    Timestamp,
    Unknown,
}

/// Parse `repomd.xml` content. Unknown `<data>` kinds are ignored per spec;
/// any recognized kind whose `location` is present but lacks a checksum or
/// has a zero timestamp fails with [`RepomdError::InvalidMetadata`].
pub fn parse_repomd(xml: &str) -> Result<RepoMetadata, RepomdError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries: HashMap<RepoDataKind, RepoDataEntry> = HashMap::new();
    let mut current_kind: Option<RepoDataKind> = None;
    let mut section = Section::Unknown;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                let local = name.as_ref();
                if local == b"data" {
                    current_kind = None;
                    section = Section::Unknown;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"type" {
                            let value = attr.unescape_value()?;
                            current_kind = RepoDataKind::from_type_attr(&value);
                        }
                    }
                } else if current_kind.is_some() {
                    match local {
                        b"location" => {
                            section = Section::Unknown;
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() == b"href" {
                                    let value = attr.unescape_value()?.into_owned();
                                    entries.entry(current_kind.unwrap()).or_default().location =
                                        Some(value);
                                }
                            }
                        }
                        b"checksum" => {
                            section = Section::Checksum;
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() == b"type" {
                                    let value = attr.unescape_value()?;
                                    entries.entry(current_kind.unwrap()).or_default().checksum_algo =
                                        Some(ChecksumAlgo::from_type_attr(&value));
                                }
                            }
                        }
                        b"open-checksum" => section = Section::ChecksumOpen,
                        b"timestamp" => section = Section::Timestamp,
                        _ => {}
                    }
                }
            }
            Event::Text(e) => {
                if let Some(kind) = current_kind {
                    let text = e.unescape()?;
                    let entry = entries.entry(kind).or_default();
                    match section {
                        Section::Checksum => entry.checksum = Some(text.into_owned()),
                        Section::ChecksumOpen => entry.checksum_open = Some(text.into_owned()),
                        Section::Timestamp => entry.timestamp = text.trim().parse().unwrap_or(0),
                        Section::Unknown => {}
                    }
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"data" {
                    current_kind = None;
                }
                section = Section::Unknown;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    for (kind, entry) in entries.iter() {
        if entry.location.is_some() && (entry.checksum.is_none() || entry.timestamp == 0) {
            return Err(RepomdError::InvalidMetadata(format!(
                "{kind:?}: location present but checksum/timestamp missing (checksum={:?}, timestamp={})",
                entry.checksum, entry.timestamp
            )));
        }
    }

    Ok(RepoMetadata { entries })
}

/// Delete `path` if present; absence is not an error.
pub fn clean_file(path: &std::path::Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <data type="primary_db">
    <checksum type="sha256">abc123</checksum>
    <open-checksum type="sha256">def456</open-checksum>
    <location href="repodata/primary.sqlite.bz2"/>
    <timestamp>1700000000</timestamp>
  </data>
  <data type="group_gz">
    <checksum type="sha256">group123</checksum>
    <location href="repodata/comps.xml.gz"/>
    <timestamp>1700000000</timestamp>
  </data>
  <data type="unknown_weird_future_kind">
    <location href="repodata/future.xml"/>
  </data>
</repomd>
"#;

    #[test]
    fn parses_known_kinds_and_ignores_unknown() {
        let parsed = parse_repomd(SAMPLE).unwrap();
        let primary = parsed.entry(RepoDataKind::Primary).unwrap();
        assert_eq!(primary.location.as_deref(), Some("repodata/primary.sqlite.bz2"));
        assert_eq!(primary.checksum.as_deref(), Some("abc123"));
        assert_eq!(primary.checksum_open.as_deref(), Some("def456"));
        assert_eq!(primary.checksum_algo, Some(ChecksumAlgo::Sha256));
        assert_eq!(primary.timestamp, 1700000000);

        assert!(parsed.has_kind(RepoDataKind::Comps));
        assert!(!parsed.has_kind(RepoDataKind::Filelists));
        assert!(!parsed.has_kind(RepoDataKind::Other));
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_repomd(SAMPLE).unwrap();
        let second = parse_repomd(SAMPLE).unwrap();
        assert_eq!(
            first.entry(RepoDataKind::Primary),
            second.entry(RepoDataKind::Primary)
        );
    }

    #[test]
    fn location_without_checksum_is_invalid() {
        let xml = r#"<repomd>
          <data type="primary_db">
            <location href="repodata/primary.sqlite.bz2"/>
          </data>
        </repomd>"#;
        let err = parse_repomd(xml).unwrap_err();
        assert!(matches!(err, RepomdError::InvalidMetadata(_)));
    }

    #[test]
    fn location_with_zero_timestamp_is_invalid() {
        let xml = r#"<repomd>
          <data type="primary_db">
            <checksum type="sha256">abc</checksum>
            <location href="repodata/primary.sqlite.bz2"/>
            <timestamp>0</timestamp>
          </data>
        </repomd>"#;
        let err = parse_repomd(xml).unwrap_err();
        assert!(matches!(err, RepomdError::InvalidMetadata(_)));
    }
}
