//! Metalink XML parser: `<url protocol= preference=>uri</url>` entries.
//!
//! Grounded on `zif-repo-md-metalink.c`'s SAX callbacks; unlike the C
//! original (which stores a private protocol/preference/uri struct per
//! entry) this returns [`rpmup_mirror::Mirror`] values directly so callers
//! feed them straight into a `MirrorSet`.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use rpmup_mirror::{Mirror, Protocol};

use crate::error::RepomdError;

/// Parse a metalink document into its `<url>` entries. Non-`url` elements
/// are ignored; a `preference` attribute defaults to `0` when absent or
/// unparseable, matching `atoi`'s zero-on-failure behavior in the original.
pub fn parse_metalink(xml: &str) -> Result<Vec<Mirror>, RepomdError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut mirrors = Vec::new();
    let mut current: Option<(Protocol, i32)> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.name().as_ref() == b"url" {
                    let mut protocol = Protocol::Unknown;
                    let mut preference = 0i32;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"protocol" => {
                                let value = attr.unescape_value()?;
                                protocol = Protocol::from_text(&value);
                            }
                            b"preference" => {
                                let value = attr.unescape_value()?;
                                preference = value.trim().parse().unwrap_or(0);
                            }
                            _ => {}
                        }
                    }
                    current = Some((protocol, preference));
                } else {
                    current = None;
                }
            }
            Event::Text(e) => {
                if let Some((protocol, preference)) = current {
                    let uri = e.unescape()?.trim().to_string();
                    if !uri.is_empty() {
                        mirrors.push(Mirror {
                            uri,
                            protocol,
                            preference,
                        });
                    }
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"url" {
                    current = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(mirrors)
}
