//! Line-oriented document family (spec §4.3, §6), used by AttractMode:
//! `#`-comment key/value files, the semicolon-delimited romlist table, and
//! tab-indented nested config. All three ignore blank and `#`-prefixed
//! lines; nothing here is launcher-agnostic beyond that, so the AttractMode
//! adapter owns the field-name mapping.

/// The romlist table's fixed column order (spec §6: "21 fixed fields").
pub const ROMLIST_COLUMNS: [&str; 21] = [
    "Name",
    "Title",
    "Emulator",
    "CloneOf",
    "Year",
    "Manufacturer",
    "Category",
    "Players",
    "Rotation",
    "Control",
    "Status",
    "DisplayCount",
    "DisplayType",
    "AltRomname",
    "AltTitle",
    "Extra",
    "Buttons",
    "Favourite",
    "Tags",
    "PlayedCount",
    "PlayedTime",
];

/// Escapes a field value so a literal `;` can't be mistaken for the column
/// delimiter (spec §9 open question, resolved: lossless backslash escape).
pub fn escape_field(value: &str) -> String {
    value.replace('\\', "\\\\").replace(';', "\\;")
}

pub fn unescape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(';') => out.push(';'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits a romlist line on unescaped `;`, then unescapes each field.
pub fn split_romlist_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push('\\');
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == ';' {
            fields.push(unescape_field(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    fields.push(unescape_field(&current));
    fields
}

/// One romlist row, positionally mapped to [`ROMLIST_COLUMNS`].
#[derive(Clone, Debug, Default)]
pub struct RomlistRecord {
    pub fields: Vec<String>,
}

impl RomlistRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        ROMLIST_COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.fields.get(i))
            .map(|s| s.as_str())
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        if self.fields.len() < ROMLIST_COLUMNS.len() {
            self.fields.resize(ROMLIST_COLUMNS.len(), String::new());
        }
        if let Some(i) = ROMLIST_COLUMNS.iter().position(|c| *c == column) {
            self.fields[i] = value.into();
        }
    }

    fn to_line(&self) -> String {
        self.fields.iter().map(|f| escape_field(f)).collect::<Vec<_>>().join(";")
    }
}

/// Parses a romlist file: the header comment line is discarded, every other
/// non-comment, non-blank line becomes a [`RomlistRecord`].
pub fn parse_romlist(content: &str) -> Vec<RomlistRecord> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .map(|l| RomlistRecord {
            fields: split_romlist_line(l),
        })
        .collect()
}

/// Writes a romlist file with the fixed header comment followed by one
/// escaped, semicolon-joined line per record.
pub fn write_romlist(records: &[RomlistRecord]) -> String {
    let mut out = format!("#{}\n", ROMLIST_COLUMNS.join(";"));
    for record in records {
        out.push_str(&record.to_line());
        out.push('\n');
    }
    out
}

/// Parses a flat `key value` config file, ignoring `#` comments and blank
/// lines. The key is the first whitespace-delimited token; everything after
/// the following run of whitespace is the value (possibly empty/absent).
pub fn parse_key_value(content: &str) -> Vec<(String, Option<String>)> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim_end();
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                return None;
            }
            let trimmed = line.trim_start();
            match trimmed.split_once(char::is_whitespace) {
                Some((key, rest)) => Some((key.to_string(), Some(rest.trim().to_string()).filter(|s| !s.is_empty()))),
                None => Some((trimmed.to_string(), None)),
            }
        })
        .collect()
}

pub fn write_key_value(pairs: &[(String, Option<String>)]) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        match value {
            Some(v) if !v.is_empty() => out.push_str(&format!("{key} {v}\n")),
            _ => out.push_str(&format!("{key}\n")),
        }
    }
    out
}

/// One line of a tab-indented nested config (`attract.cfg`): indentation
/// depth plus the same `key [value]` shape as a flat key/value file.
#[derive(Clone, Debug)]
pub struct NestedEntry {
    pub depth: usize,
    pub key: String,
    pub value: Option<String>,
}

pub fn parse_nested(content: &str) -> Vec<NestedEntry> {
    content
        .lines()
        .filter_map(|line| {
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                return None;
            }
            let depth = line.chars().take_while(|c| *c == '\t').count();
            let trimmed = line.trim();
            let (key, value) = match trimmed.split_once(char::is_whitespace) {
                Some((k, v)) => (k.to_string(), Some(v.trim().to_string()).filter(|s| !s.is_empty())),
                None => (trimmed.to_string(), None),
            };
            Some(NestedEntry { depth, key, value })
        })
        .collect()
}

pub fn write_nested(entries: &[NestedEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&"\t".repeat(entry.depth));
        match &entry.value {
            Some(v) if !v.is_empty() => out.push_str(&format!("{} {}\n", entry.key, v)),
            _ => out.push_str(&format!("{}\n", entry.key)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn romlist_round_trips_title_with_embedded_delimiter() {
        let mut record = RomlistRecord::default();
        record.set("Name", "a");
        record.set("Title", "A;B");

        let content = write_romlist(&[record]);
        let parsed = parse_romlist(&content);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("Title"), Some("A;B"));
    }

    #[test]
    fn romlist_header_line_is_ignored_when_reading() {
        let content = "#Name;Title\nflash;My Game\n";
        let parsed = parse_romlist(content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].fields[0], "flash");
    }

    #[test]
    fn key_value_ignores_comments_and_blank_lines() {
        let content = "# comment\n\nartwork flyer\nrom_path\n";
        let pairs = parse_key_value(content);
        assert_eq!(pairs, vec![
            ("artwork".to_string(), Some("flyer".to_string())),
            ("rom_path".to_string(), None),
        ]);
    }

    #[test]
    fn nested_config_tracks_tab_depth() {
        let content = "emulator\n\texecutable foo\n\targs bar\n";
        let entries = parse_nested(content);
        assert_eq!(entries[0].depth, 0);
        assert_eq!(entries[1].depth, 1);
        assert_eq!(entries[1].key, "executable");
        assert_eq!(entries[1].value.as_deref(), Some("foo"));
    }
}
