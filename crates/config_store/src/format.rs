//! Reading and writing the INI-like settings file.
//!
//! ```text
//! ## Settings file was created by plugin Example
//!
//! [General]
//!
//! ## How fast things move
//! # Setting type: i32
//! # Default value: 10
//! # Acceptable value range: From 0 to 100
//! Speed = 10
//! ```

use crate::definition::ConfigDefinition;
use crate::entry::ErasedEntry;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::warn;

/// Parses `key = value` pairs grouped under `[section]` headers.
///
/// Lines that cannot be understood are skipped with a warning so one bad
/// line never prevents the rest of the file from loading.
pub(crate) fn parse(text: &str) -> BTreeMap<ConfigDefinition, String> {
    let mut values = BTreeMap::new();
    let mut section: Option<String> = None;

    for (number, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = Some(line[1..line.len() - 1].trim().to_string());
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            warn!("Skipping line {}: expected 'key = value', found '{}'", number + 1, line);
            continue;
        };

        let Some(section) = section.as_deref() else {
            warn!("Skipping line {}: setting '{}' is outside of any section", number + 1, key.trim());
            continue;
        };

        match ConfigDefinition::new(section, key.trim()) {
            Ok(definition) => {
                values.insert(definition, value.trim().to_string());
            }
            Err(e) => warn!("Skipping line {}: {}", number + 1, e),
        }
    }

    values
}

enum Line<'a> {
    Bound(&'a dyn ErasedEntry),
    Orphan(&'a str),
}

/// Renders bound entries and orphans into the file layout shown above.
/// Orphans that share a definition with a bound entry are not written.
pub(crate) fn render(
    owner: Option<&str>,
    entries: &BTreeMap<ConfigDefinition, Arc<dyn ErasedEntry>>,
    orphans: &BTreeMap<ConfigDefinition, String>,
) -> String {
    let mut lines: BTreeMap<&ConfigDefinition, Line<'_>> = orphans
        .iter()
        .map(|(definition, value)| (definition, Line::Orphan(value.as_str())))
        .collect();
    for (definition, entry) in entries {
        lines.insert(definition, Line::Bound(entry.as_ref()));
    }

    let mut out = String::new();
    if let Some(owner) = owner {
        let _ = writeln!(out, "## Settings file was created by plugin {owner}");
        out.push('\n');
    }

    let mut current_section: Option<&str> = None;
    for (definition, line) in lines {
        if current_section != Some(definition.section.as_str()) {
            if current_section.is_some() {
                out.push('\n');
            }
            let _ = writeln!(out, "[{}]", definition.section);
            current_section = Some(definition.section.as_str());
        }

        out.push('\n');
        match line {
            Line::Bound(entry) => {
                write_description(&mut out, entry);
                let _ = writeln!(out, "{} = {}", definition.key, entry.serialized_value());
            }
            Line::Orphan(value) => {
                let _ = writeln!(out, "{} = {}", definition.key, value);
            }
        }
    }

    out
}

fn write_description(out: &mut String, entry: &dyn ErasedEntry) {
    if !entry.description().is_empty() {
        let _ = writeln!(out, "## {}", entry.description().replace('\n', "\n## "));
    }
    let _ = writeln!(out, "# Setting type: {}", entry.setting_type());
    let _ = writeln!(out, "# Default value: {}", entry.default_text());
    if let Some(acceptable) = entry.acceptable_text() {
        let _ = writeln!(out, "# {acceptable}");
    }
}
