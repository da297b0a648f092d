//! Minimal `.ini`-style parser for table, complex-type and column text
//! definitions.
//!
//! Handles sections `[section::id]`, `=` assignment, `#` comments, and
//! UNIX line continuation. Grounded on `schema.cpp`'s `from_config_load_*`
//! family, which drives an `advgetopt::conf_file` the same shape: one flat
//! key/value map per section, section names split on `::` into a kind and
//! an id.

use crate::error::{CoreError, Result};
use std::collections::HashMap;

/// One `[kind]` or `[kind::id]` section and its `key=value` entries.
#[derive(Debug, Clone, Default)]
pub struct IniSection {
    pub kind: String,
    pub id: Option<String>,
    pub entries: HashMap<String, String>,
}

impl IniSection {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| CoreError::MissingParameter(key.to_string()))
    }
}

/// A parsed `.ini` file: an ordered list of sections.
#[derive(Debug, Clone, Default)]
pub struct IniFile {
    pub sections: Vec<IniSection>,
}

impl IniFile {
    pub fn sections_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a IniSection> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }
}

/// Join UNIX line continuations (`\` at end of line), strip `#` comments
/// and blank lines, and split into logical lines.
fn logical_lines(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending = String::new();
    for raw in text.lines() {
        let line = strip_comment(raw);
        let trimmed = line.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            pending.push_str(stripped.trim_start());
            pending.push(' ');
            continue;
        }
        pending.push_str(trimmed.trim_start());
        let finished = std::mem::take(&mut pending);
        if !finished.trim().is_empty() {
            out.push(finished);
        }
    }
    if !pending.trim().is_empty() {
        out.push(pending);
    }
    out
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Parse a complete `.ini`-style text definition into its sections.
pub fn parse(text: &str) -> Result<IniFile> {
    let mut sections = Vec::new();
    let mut current: Option<IniSection> = None;

    for line in logical_lines(text) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('[') {
            let header = header
                .strip_suffix(']')
                .ok_or_else(|| CoreError::InvalidParameter(format!("unterminated section header: {line}")))?;
            if let Some(finished) = current.take() {
                sections.push(finished);
            }
            let (kind, id) = match header.split_once("::") {
                Some((k, i)) => (k.trim().to_string(), Some(i.trim().to_string())),
                None => (header.trim().to_string(), None),
            };
            current = Some(IniSection {
                kind,
                id,
                entries: HashMap::new(),
            });
            continue;
        }
        if line == "{" || line == "}" {
            // C++-style section braces are accepted but carry no meaning here.
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            CoreError::InvalidParameter(format!("expected key=value, found: {line}"))
        })?;
        let section = current.as_mut().ok_or_else(|| {
            CoreError::InvalidParameter(format!("key=value outside of any section: {line}"))
        })?;
        section
            .entries
            .insert(key.trim().to_string(), value.trim().to_string());
    }
    if let Some(finished) = current.take() {
        sections.push(finished);
    }
    Ok(IniFile { sections })
}

/// Split a comma-separated list, trimming whitespace and dropping empty
/// entries (an empty `flags=` should parse as no flags, not one blank one).
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sectioned_key_values() {
        let text = "[table]\nname=users\nversion=3\n\n[column::1]\nname=login\ntype=P8STRING\n";
        let ini = parse(text).unwrap();
        assert_eq!(ini.sections.len(), 2);
        assert_eq!(ini.sections[0].kind, "table");
        assert_eq!(ini.sections[0].get("name"), Some("users"));
        assert_eq!(ini.sections[1].kind, "column");
        assert_eq!(ini.sections[1].id.as_deref(), Some("1"));
    }

    #[test]
    fn strips_comments_and_joins_continuations() {
        let text = "[table]\nname=users # a comment\ndescription=long \\\n  line\n";
        let ini = parse(text).unwrap();
        assert_eq!(ini.sections[0].get("name"), Some("users"));
        assert_eq!(ini.sections[0].get("description"), Some("long line"));
    }

    #[test]
    fn rejects_key_value_outside_section() {
        assert!(parse("name=users\n").is_err());
    }
}
