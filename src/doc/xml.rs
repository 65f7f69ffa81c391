//! Structured-XML document family (spec §4.3), used by LaunchBox and ES-DE.
//! Stream-based read/write via `quick-xml`, grounded on the event-loop shape
//! in `examples/other_examples/.../rommbuddy_.../launchbox.rs` and the
//! `AberrantWolf-retro-junk` DAT reader. The writer always emits a single
//! fixed root element; the reader checks it and surfaces `DocInvalidType`
//! when it doesn't match. Every child element under a record becomes a
//! `(tag, text)` pair; callers lift the tags they recognize into typed
//! fields and fold the rest into `other_fields`.

use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::doc::DocId;
use crate::error::{DocHandlingError, DocHandlingErrorKind};

/// One `<Tag>text</Tag>`-shaped record: every direct child element of a
/// record element, in encounter order, with its text content.
#[derive(Clone, Debug, Default)]
pub struct FlatRecord {
    pub fields: Vec<(String, String)>,
}

impl FlatRecord {
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == tag).map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.fields.push((tag.into(), value.into()));
    }

    /// Drops recognized tags, returning what's left as an `other_fields`
    /// map, preserving the round-trip invariant in spec §8.
    pub fn into_other_fields(self, recognized: &[&str]) -> BTreeMap<String, String> {
        self.fields
            .into_iter()
            .filter(|(tag, _)| !recognized.contains(&tag.as_str()))
            .collect()
    }
}

/// A record element (e.g. `<Game>`) together with its tag name, so readers
/// of documents mixing several element kinds (LaunchBox's `<Game>` and
/// `<AdditionalApplication>` siblings) can dispatch by tag.
pub struct TaggedRecord {
    pub tag: String,
    pub record: FlatRecord,
}

/// Parses `content` as an XML document whose root element must be
/// `expected_root`; every direct child of the root becomes a
/// [`TaggedRecord`] of its own tag and flattened children.
pub fn read_records(content: &str, doc_id: &DocId, expected_root: &str) -> Result<Vec<TaggedRecord>, DocHandlingError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut depth = 0u32;
    let mut root_checked = false;

    let mut current_tag: Option<String> = None;
    let mut current_record = FlatRecord::default();
    let mut field_tag: Option<String> = None;
    let mut field_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = tag_name(&e);
                depth += 1;
                if depth == 1 {
                    if name != expected_root {
                        return Err(DocHandlingError::with_specific(
                            doc_id.clone(),
                            DocHandlingErrorKind::DocInvalidType,
                            format!("expected root element '{expected_root}', found '{name}'"),
                        ));
                    }
                    root_checked = true;
                } else if depth == 2 {
                    current_tag = Some(name);
                    current_record = FlatRecord::default();
                } else if depth == 3 {
                    field_tag = Some(name);
                    field_text.clear();
                }
            }
            Ok(Event::Text(t)) => {
                if depth == 3 {
                    field_text.push_str(&t.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(_)) => {
                if depth == 3 {
                    if let Some(tag) = field_tag.take() {
                        current_record.insert(tag, std::mem::take(&mut field_text));
                    }
                } else if depth == 2 {
                    if let Some(tag) = current_tag.take() {
                        records.push(TaggedRecord {
                            tag,
                            record: std::mem::take(&mut current_record),
                        });
                    }
                }
                depth = depth.saturating_sub(1);
            }
            // quick-xml emits self-closing tags (`<Notes/>`) as `Empty`
            // rather than a `Start`+`End` pair; handle it the same way both
            // would, back to back, so empty fields/records aren't dropped.
            Ok(Event::Empty(e)) => {
                let name = tag_name(&e);
                depth += 1;
                if depth == 1 {
                    if name != expected_root {
                        return Err(DocHandlingError::with_specific(
                            doc_id.clone(),
                            DocHandlingErrorKind::DocInvalidType,
                            format!("expected root element '{expected_root}', found '{name}'"),
                        ));
                    }
                    root_checked = true;
                } else if depth == 2 {
                    records.push(TaggedRecord {
                        tag: name,
                        record: FlatRecord::default(),
                    });
                } else if depth == 3 {
                    current_record.insert(name, String::new());
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DocHandlingError::with_specific(
                    doc_id.clone(),
                    DocHandlingErrorKind::DocReadFailed,
                    e.to_string(),
                ))
            }
        }
    }

    if !root_checked {
        return Err(DocHandlingError::with_specific(
            doc_id.clone(),
            DocHandlingErrorKind::DocInvalidType,
            "document has no root element",
        ));
    }

    Ok(records)
}

/// Serializes `root` with one child element per `(tag, record)` pair, each
/// record's fields emitted as its own nested elements, in the order given.
pub fn write_records(root: &str, records: &[(String, FlatRecord)]) -> Result<String, std::io::Error> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Start(BytesStart::new(root)))
        .map_err(to_io_error)?;

    for (tag, record) in records {
        writer
            .write_event(Event::Start(BytesStart::new(tag.as_str())))
            .map_err(to_io_error)?;
        for (field_tag, value) in &record.fields {
            writer
                .write_event(Event::Start(BytesStart::new(field_tag.as_str())))
                .map_err(to_io_error)?;
            if !value.is_empty() {
                writer
                    .write_event(Event::Text(BytesText::new(value)))
                    .map_err(to_io_error)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(field_tag.as_str())))
                .map_err(to_io_error)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(tag.as_str())))
            .map_err(to_io_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(root)))
        .map_err(to_io_error)?;

    let bytes = writer.into_inner().into_inner();
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n{}\n",
        String::from_utf8_lossy(&bytes)
    ))
}

fn tag_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).to_string()
}

fn to_io_error(e: quick_xml::Error) -> std::io::Error {
    std::io::Error::other(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::DocType;

    #[test]
    fn round_trips_a_simple_record() {
        let mut rec = FlatRecord::default();
        rec.insert("Title", "A;B");
        rec.insert("Custom", "unrecognized");

        let xml = write_records("LaunchBox", &[("Game".to_string(), rec)]).unwrap();

        let doc_id = DocId::new(DocType::Platform, "Flash");
        let parsed = read_records(&xml, &doc_id, "LaunchBox").unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].tag, "Game");
        assert_eq!(parsed[0].record.get("Title"), Some("A;B"));
        assert_eq!(parsed[0].record.get("Custom"), Some("unrecognized"));
    }

    #[test]
    fn wrong_root_surfaces_doc_invalid_type() {
        let doc_id = DocId::new(DocType::Platform, "Flash");
        let err = read_records("<Other></Other>", &doc_id, "LaunchBox").unwrap_err();
        assert_eq!(err.kind, DocHandlingErrorKind::DocInvalidType);
    }
}
