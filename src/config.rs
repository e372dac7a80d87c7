//! Configuration schema and CSV import boundary.
//!
//! The host owns the persistent store and the editor UI; this module only
//! defines the shapes the engine consumes. All fields are defaulted so a
//! partially-populated store snapshot hydrates cleanly, and collections are
//! deduplicated at the boundary so the compiler never sees duplicates.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;

// =============================================================================
// Defaults
// =============================================================================

/// Surface forms generated for a `(first, last)` pair. `{f}` is the first
/// initial; placeholder recognition is case-insensitive.
pub const DEFAULT_VARIANT_TEMPLATES: &[&str] = &[
    "{first} {last}",
    "{f} {last}",
    "{f}. {last}",
    "{last}, {first}",
    "{last}, {f}",
];

const DEFAULT_COLOR_LAST: &str = "#fff59d";
const DEFAULT_COLOR_FULL: &str = "#90caf9";
const DEFAULT_COLOR_KEYWORD: &str = "#ffcc80";
const DEFAULT_TEXT_COLOR: &str = "#000000";

fn default_true() -> bool {
    true
}

fn default_variant_templates() -> Vec<String> {
    DEFAULT_VARIANT_TEMPLATES.iter().map(|s| s.to_string()).collect()
}

fn default_color_last() -> String {
    DEFAULT_COLOR_LAST.to_string()
}

fn default_color_full() -> String {
    DEFAULT_COLOR_FULL.to_string()
}

fn default_color_keyword() -> String {
    DEFAULT_COLOR_KEYWORD.to_string()
}

fn default_text_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

// =============================================================================
// Types
// =============================================================================

/// One configured person name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    #[serde(default)]
    pub first: String,
    #[serde(default)]
    pub last: String,
}

impl NameEntry {
    pub fn new(first: &str, last: &str) -> Self {
        Self {
            first: first.trim().to_string(),
            last: last.trim().to_string(),
        }
    }

    /// Identity key used for deduplication: lowercase `first|last`.
    pub fn identity_key(&self) -> String {
        format!(
            "{}|{}",
            self.first.trim().to_lowercase(),
            self.last.trim().to_lowercase()
        )
    }
}

/// A named collection of people, with separate styling for full-name and
/// last-name-only annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entries: Vec<NameEntry>,
    #[serde(default = "default_color_full")]
    pub color_full: String,
    #[serde(default = "default_text_color")]
    pub text_color_full: String,
    #[serde(default = "default_color_last")]
    pub color_last: String,
    #[serde(default = "default_text_color")]
    pub text_color_last: String,
}

impl NameGroup {
    pub fn new(name: &str, entries: Vec<NameEntry>) -> Self {
        Self {
            name: name.to_string(),
            entries: dedupe_name_entries(entries),
            color_full: default_color_full(),
            text_color_full: default_text_color(),
            color_last: default_color_last(),
            text_color_last: default_text_color(),
        }
    }
}

/// A named collection of standalone keywords with one style.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_color_keyword")]
    pub color: String,
    #[serde(default = "default_text_color")]
    pub text_color: String,
}

impl KeywordGroup {
    pub fn new(name: &str, keywords: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            keywords: dedupe_keywords(keywords),
            color: default_color_keyword(),
            text_color: default_text_color(),
        }
    }
}

/// Engine configuration snapshot, as stored by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub name_groups: Vec<NameGroup>,
    #[serde(default)]
    pub keyword_groups: Vec<KeywordGroup>,
    #[serde(default = "default_variant_templates")]
    pub variant_templates: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name_groups: Vec::new(),
            keyword_groups: Vec::new(),
            variant_templates: default_variant_templates(),
            enabled: true,
        }
    }
}

impl Config {
    /// Hydrate a snapshot from the host's JSON store value. Missing fields
    /// fall back to defaults; unknown fields are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Store keys the engine reacts to. Change notifications for any other key
/// are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    NameGroups,
    KeywordGroups,
    VariantTemplates,
    Enabled,
}

impl ConfigKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "nameGroups" => Some(Self::NameGroups),
            "keywordGroups" => Some(Self::KeywordGroups),
            "variantTemplates" => Some(Self::VariantTemplates),
            "enabled" => Some(Self::Enabled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameGroups => "nameGroups",
            Self::KeywordGroups => "keywordGroups",
            Self::VariantTemplates => "variantTemplates",
            Self::Enabled => "enabled",
        }
    }
}

// =============================================================================
// Deduplication
// =============================================================================

/// Dedupe entries by identity key, keeping first occurrence order.
pub fn dedupe_name_entries(entries: Vec<NameEntry>) -> Vec<NameEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .map(|e| NameEntry::new(&e.first, &e.last))
        .filter(|e| seen.insert(e.identity_key()))
        .collect()
}

/// Dedupe keywords case-insensitively, keeping first occurrence order.
pub fn dedupe_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
        .collect()
}

// =============================================================================
// CSV import boundary
// =============================================================================

/// How an imported list combines with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Append,
    Replace,
}

/// Parse bulk name rows: one `first,last[,extra...]` per line. Lines with
/// fewer than two fields are dropped silently; extra fields are ignored;
/// rows where both fields are empty are dropped. Output is deduplicated.
pub fn parse_name_rows(text: &str) -> Vec<NameEntry> {
    let entries = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split(',');
            let first = parts.next()?.trim();
            let last = parts.next()?.trim();
            if first.is_empty() && last.is_empty() {
                return None;
            }
            Some(NameEntry::new(first, last))
        })
        .collect();
    dedupe_name_entries(entries)
}

/// Merge imported entries into an existing list according to `mode`.
pub fn merge_name_entries(
    existing: &[NameEntry],
    imported: Vec<NameEntry>,
    mode: ImportMode,
) -> Vec<NameEntry> {
    match mode {
        ImportMode::Replace => dedupe_name_entries(imported),
        ImportMode::Append => {
            let mut combined = existing.to_vec();
            combined.extend(imported);
            dedupe_name_entries(combined)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_gets_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert!(config.enabled);
        assert!(config.name_groups.is_empty());
        assert!(config.keyword_groups.is_empty());
        assert_eq!(config.variant_templates, default_variant_templates());
    }

    #[test]
    fn test_camel_case_store_keys() {
        let json = r##"{
            "nameGroups": [{
                "name": "A",
                "entries": [{"first": "John", "last": "Smith"}],
                "colorFull": "#112233"
            }],
            "keywordGroups": [{"name": "K", "keywords": ["urgent"]}],
            "enabled": false
        }"##;
        let config = Config::from_json(json).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.name_groups[0].color_full, "#112233");
        // Unspecified colors fall back to defaults
        assert_eq!(config.name_groups[0].color_last, DEFAULT_COLOR_LAST);
        assert_eq!(config.keyword_groups[0].keywords, vec!["urgent"]);
    }

    #[test]
    fn test_identity_key_dedup() {
        let entries = vec![
            NameEntry::new("John", "Smith"),
            NameEntry::new("JOHN", "smith"),
            NameEntry::new("Jane", "Smith"),
        ];
        let deduped = dedupe_name_entries(entries);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].first, "John");
    }

    #[test]
    fn test_keyword_dedup_case_insensitive() {
        let kws = vec!["Urgent".into(), "urgent".into(), "".into(), "todo".into()];
        assert_eq!(dedupe_keywords(kws), vec!["Urgent", "todo"]);
    }

    #[test]
    fn test_csv_short_line_dropped() {
        let entries = parse_name_rows("OnlyOneField\nJane,Doe");
        assert_eq!(entries, vec![NameEntry::new("Jane", "Doe")]);
    }

    #[test]
    fn test_csv_extra_fields_ignored() {
        let entries = parse_name_rows("Jane,Doe,extra,more");
        assert_eq!(entries, vec![NameEntry::new("Jane", "Doe")]);
    }

    #[test]
    fn test_csv_blank_and_empty_rows() {
        let entries = parse_name_rows("\n  \n,\nJohn,Smith\r\nJohn,Smith\n");
        assert_eq!(entries, vec![NameEntry::new("John", "Smith")]);
    }

    #[test]
    fn test_csv_one_sided_rows_kept() {
        let entries = parse_name_rows(",Smith\nJohn,");
        assert_eq!(
            entries,
            vec![NameEntry::new("", "Smith"), NameEntry::new("John", "")]
        );
    }

    #[test]
    fn test_merge_append_dedupes_against_existing() {
        let existing = vec![NameEntry::new("John", "Smith")];
        let imported = vec![NameEntry::new("john", "smith"), NameEntry::new("Jane", "Doe")];
        let merged = merge_name_entries(&existing, imported, ImportMode::Append);
        assert_eq!(merged.len(), 2);

        let replaced = merge_name_entries(
            &existing,
            vec![NameEntry::new("Jane", "Doe")],
            ImportMode::Replace,
        );
        assert_eq!(replaced, vec![NameEntry::new("Jane", "Doe")]);
    }

    #[test]
    fn test_config_key_parse() {
        assert_eq!(ConfigKey::parse("nameGroups"), Some(ConfigKey::NameGroups));
        assert_eq!(ConfigKey::parse("enabled"), Some(ConfigKey::Enabled));
        assert_eq!(ConfigKey::parse("theme"), None);
    }
}
