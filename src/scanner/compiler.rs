//! Pattern compiler: configuration snapshot → searchable term sets.
//!
//! Each annotation class (full-name, last-name-only, keyword) compiles to an
//! independent matcher. Classes whose terms are all ASCII literals get a
//! Double-Array-friendly Aho-Corasick automaton with LeftmostLongest
//! semantics; a class containing any wildcard or non-ASCII term falls back to
//! a single `(?i)` regex alternation, which case-folds beyond ASCII. In both
//! engines alternatives are ordered by descending length, so the longest term
//! wins at a given start position.
//!
//! Compilation is deterministic: the same snapshot always yields the same
//! ordered term sets, and therefore the same matches.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use std::collections::HashSet;

use crate::config::Config;
use crate::error::Result;

// =============================================================================
// Types
// =============================================================================

/// Annotation class of a compiled term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermClass {
    Full,
    Last,
    Keyword,
}

impl TermClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermClass::Full => "full",
            TermClass::Last => "last",
            TermClass::Keyword => "keyword",
        }
    }
}

/// One searchable term. Immutable once compiled for a snapshot.
#[derive(Debug, Clone)]
pub struct CompiledTerm {
    /// Lowercased surface form (may contain `*`/`?` when wildcard-enabled).
    pub text: String,
    pub class: TermClass,
    /// Index into the owning group list (name groups for full/last terms,
    /// keyword groups for keyword terms).
    pub group: usize,
    pub allows_wildcard: bool,
}

/// Presentation attributes resolved per group at compile time.
#[derive(Debug, Clone)]
pub struct GroupStyle {
    pub label: String,
    pub color: String,
    pub text_color: String,
}

/// A candidate hit produced by a class matcher, before word-boundary and
/// cross-class reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct RawHit {
    pub start: usize,
    pub end: usize,
    /// Index into the owning `TermSet::terms`.
    pub term: usize,
}

enum ClassMatcher {
    /// Fast path: every term an ASCII literal.
    Automaton(AhoCorasick),
    /// Regex path, for wildcard or non-ASCII terms.
    Pattern {
        /// One alternation, one capture group per term.
        alternation: Regex,
        /// Per-term patterns anchored at the slice start, indexed like
        /// `terms`. Used to back off to a shorter term at the same position.
        anchored: Vec<Regex>,
    },
}

/// All terms of one class plus their compiled matcher.
pub struct TermSet {
    pub class: TermClass,
    /// Sorted by descending length, ties lexicographic.
    pub terms: Vec<CompiledTerm>,
    /// Indexed by group index; unreferenced slots exist for dropped groups.
    pub styles: Vec<GroupStyle>,
    matcher: Option<ClassMatcher>,
}

/// Compiled output for a configuration snapshot.
pub struct CompiledTerms {
    pub full: TermSet,
    pub last: TermSet,
    pub keyword: TermSet,
}

// =============================================================================
// Compilation
// =============================================================================

/// Compile a configuration snapshot into the three class term sets.
///
/// Error policy: a group with an empty name is dropped entirely; an entry
/// with an empty last name contributes nothing; a template without
/// recognized placeholders is applied literally.
pub fn compile(config: &Config) -> Result<CompiledTerms> {
    let mut full_terms: Vec<CompiledTerm> = Vec::new();
    let mut last_terms: Vec<CompiledTerm> = Vec::new();
    let mut keyword_terms: Vec<CompiledTerm> = Vec::new();

    for (gi, group) in config.name_groups.iter().enumerate() {
        if group.name.trim().is_empty() {
            continue;
        }
        for entry in &group.entries {
            let first = entry.first.trim();
            let last = entry.last.trim();
            if last.is_empty() {
                continue;
            }
            last_terms.push(term(last, TermClass::Last, gi));
            if !first.is_empty() {
                for template in &config.variant_templates {
                    let surface = apply_template(template, first, last);
                    let surface = surface.trim();
                    if !surface.is_empty() {
                        full_terms.push(term(surface, TermClass::Full, gi));
                    }
                }
            }
        }
    }

    for (gi, group) in config.keyword_groups.iter().enumerate() {
        if group.name.trim().is_empty() {
            continue;
        }
        for kw in &group.keywords {
            let kw = kw.trim();
            if !kw.is_empty() {
                keyword_terms.push(term(kw, TermClass::Keyword, gi));
            }
        }
    }

    let name_styles_full: Vec<GroupStyle> = config
        .name_groups
        .iter()
        .map(|g| GroupStyle {
            label: g.name.clone(),
            color: g.color_full.clone(),
            text_color: g.text_color_full.clone(),
        })
        .collect();
    let name_styles_last: Vec<GroupStyle> = config
        .name_groups
        .iter()
        .map(|g| GroupStyle {
            label: g.name.clone(),
            color: g.color_last.clone(),
            text_color: g.text_color_last.clone(),
        })
        .collect();
    let keyword_styles: Vec<GroupStyle> = config
        .keyword_groups
        .iter()
        .map(|g| GroupStyle {
            label: g.name.clone(),
            color: g.color.clone(),
            text_color: g.text_color.clone(),
        })
        .collect();

    Ok(CompiledTerms {
        full: TermSet::build(TermClass::Full, full_terms, name_styles_full)?,
        last: TermSet::build(TermClass::Last, last_terms, name_styles_last)?,
        keyword: TermSet::build(TermClass::Keyword, keyword_terms, keyword_styles)?,
    })
}

fn term(text: &str, class: TermClass, group: usize) -> CompiledTerm {
    let text = text.to_lowercase();
    let allows_wildcard = text.contains(['*', '?']);
    CompiledTerm {
        text,
        class,
        group,
        allows_wildcard,
    }
}

/// Substitute `{first}`, `{f}` (first initial), `{last}` into a variant
/// template. Placeholder names are matched case-insensitively; anything else
/// in braces is kept literally.
fn apply_template(template: &str, first: &str, last: &str) -> String {
    let initial: String = first.chars().take(1).collect();
    let mut out = String::with_capacity(template.len() + first.len() + last.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match name.to_lowercase().as_str() {
                    "first" => out.push_str(first),
                    "f" => out.push_str(&initial),
                    "last" => out.push_str(last),
                    _ => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

// =============================================================================
// TermSet
// =============================================================================

impl TermSet {
    fn build(class: TermClass, terms: Vec<CompiledTerm>, styles: Vec<GroupStyle>) -> Result<Self> {
        // Dedupe by surface form; first occurrence keeps its group.
        let mut seen: HashSet<String> = HashSet::new();
        let mut terms: Vec<CompiledTerm> = terms
            .into_iter()
            .filter(|t| seen.insert(t.text.clone()))
            .collect();

        // Longest first so the longest alternative wins at any start position.
        terms.sort_by(|a, b| {
            b.text
                .len()
                .cmp(&a.text.len())
                .then_with(|| a.text.cmp(&b.text))
        });

        let matcher = if terms.is_empty() {
            None
        } else if terms.iter().any(|t| t.allows_wildcard || !t.text.is_ascii()) {
            let alternation = terms
                .iter()
                .map(|t| format!("({})", term_to_pattern(t)))
                .collect::<Vec<_>>()
                .join("|");
            let alternation = Regex::new(&format!("(?i){alternation}"))?;
            let anchored = terms
                .iter()
                .map(|t| Regex::new(&format!("(?i)^(?:{})", term_to_pattern(t))))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Some(ClassMatcher::Pattern {
                alternation,
                anchored,
            })
        } else {
            let patterns: Vec<&str> = terms.iter().map(|t| t.text.as_str()).collect();
            Some(ClassMatcher::Automaton(
                AhoCorasickBuilder::new()
                    .match_kind(MatchKind::LeftmostLongest)
                    .ascii_case_insensitive(true)
                    .build(&patterns)?,
            ))
        };

        Ok(Self {
            class,
            terms,
            styles,
            matcher,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Find the next candidate hit at or after byte offset `at`. Word
    /// boundaries are NOT checked here; the resolver owns that rule.
    pub fn find_at(&self, buffer: &str, at: usize) -> Option<RawHit> {
        match self.matcher.as_ref()? {
            ClassMatcher::Automaton(pma) => pma.find(&buffer[at..]).map(|m| RawHit {
                start: at + m.start(),
                end: at + m.end(),
                term: m.pattern().as_usize(),
            }),
            ClassMatcher::Pattern { alternation, .. } => {
                let caps = alternation.captures_at(buffer, at)?;
                let overall = caps.get(0)?;
                // One capture group per alternative identifies the term.
                let term = (1..caps.len()).find(|&i| caps.get(i).is_some())? - 1;
                Some(RawHit {
                    start: overall.start(),
                    end: overall.end(),
                    term,
                })
            }
        }
    }

    /// Byte length matched by term `idx` at exactly offset `start`, if it
    /// matches there. Boundary rules are not checked.
    pub fn match_len_at(&self, buffer: &str, start: usize, idx: usize) -> Option<usize> {
        match self.matcher.as_ref()? {
            ClassMatcher::Automaton(_) => {
                // Automaton terms are ASCII literals; folding preserves length.
                let text = &self.terms.get(idx)?.text;
                let candidate = buffer.get(start..start + text.len())?;
                candidate.eq_ignore_ascii_case(text).then(|| text.len())
            }
            ClassMatcher::Pattern { anchored, .. } => {
                anchored.get(idx)?.find(&buffer[start..]).map(|m| m.end())
            }
        }
    }

    pub fn style(&self, group: usize) -> Option<&GroupStyle> {
        self.styles.get(group)
    }
}

/// Translate one term into regex source: literals escaped, `*` matching any
/// run of non-space characters, `?` exactly one.
fn term_to_pattern(term: &CompiledTerm) -> String {
    if !term.allows_wildcard {
        return regex::escape(&term.text);
    }
    let mut out = String::with_capacity(term.text.len() * 2);
    for ch in term.text.chars() {
        match ch {
            '*' => out.push_str(r"[^\s]*"),
            '?' => out.push_str(r"[^\s]"),
            _ => out.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
