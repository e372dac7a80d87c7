//! Match resolver: compiled terms + logical buffer → conflict-free matches.
//!
//! Three phases over the same buffer:
//! 1. full-name scan — every hit reserves its span
//! 2. last-name scan — hits overlapping a reserved span are suppressed
//! 3. keyword scan — independent layer, dropped only where it would collide
//!    structurally with a kept name match
//!
//! The scan cursor is an explicit value threaded through `scan_class`, so
//! repeated scans cannot interfere with each other. Word boundaries are
//! enforced here, uniformly for both matcher engines: the characters
//! immediately before and after a hit, when present, must not be word
//! characters. When the longest candidate at a position fails that check,
//! shorter terms anchored at the same position are tried before the cursor
//! advances.

use crate::scanner::compiler::{CompiledTerms, RawHit, TermClass, TermSet};

/// One resolved, word-bounded match in buffer space.
#[derive(Debug, Clone, Copy)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub class: TermClass,
    /// Index into the owning class's `TermSet::terms`.
    pub term: usize,
    /// Index into the owning group list.
    pub group: usize,
}

impl Match {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Resolve the final match list for a buffer. Output is sorted by start
/// offset; spans are pairwise disjoint.
pub fn resolve(terms: &CompiledTerms, buffer: &str) -> Vec<Match> {
    let full = scan_class(&terms.full, buffer);
    let last: Vec<Match> = scan_class(&terms.last, buffer)
        .into_iter()
        .filter(|m| !full.iter().any(|f| f.overlaps(m.start, m.end)))
        .collect();

    let mut names: Vec<Match> = full;
    names.extend(last);

    let keyword: Vec<Match> = scan_class(&terms.keyword, buffer)
        .into_iter()
        .filter(|m| !names.iter().any(|n| n.overlaps(m.start, m.end)))
        .collect();

    let mut merged = names;
    merged.extend(keyword);
    merged.sort_by_key(|m| m.start);
    merged
}

/// Greedy left-to-right scan of one class. After an accepted hit the cursor
/// resumes at the hit's end. A boundary rejection first retries the other
/// terms anchored at the hit's start, longest first; only when none of them
/// is word-bounded does the cursor resume one character past the start, so a
/// later overlapping candidate is not lost.
fn scan_class(set: &TermSet, buffer: &str) -> Vec<Match> {
    let mut out = Vec::new();
    if set.is_empty() {
        return out;
    }
    let mut cursor = 0;
    while cursor < buffer.len() {
        let Some(hit) = set.find_at(buffer, cursor) else {
            break;
        };
        let accepted = if word_bounded(buffer, hit.start, hit.end) {
            Some(Match {
                start: hit.start,
                end: hit.end,
                class: set.class,
                term: hit.term,
                group: set.terms[hit.term].group,
            })
        } else {
            backoff_at(set, buffer, &hit)
        };
        match accepted {
            Some(m) => {
                log::trace!(
                    "{} match {:?} at {}..{}",
                    set.class.as_str(),
                    &buffer[m.start..m.end],
                    m.start,
                    m.end
                );
                cursor = m.end;
                out.push(m);
            }
            None => cursor = next_char_boundary(buffer, hit.start),
        }
    }
    out
}

/// Try the remaining terms anchored at a rejected hit's start. `terms` is
/// sorted longest first, so the first word-bounded candidate is the longest
/// one.
fn backoff_at(set: &TermSet, buffer: &str, hit: &RawHit) -> Option<Match> {
    // A word character immediately before the start dooms every term.
    if buffer[..hit.start]
        .chars()
        .next_back()
        .is_some_and(is_word_char)
    {
        return None;
    }
    for idx in 0..set.terms.len() {
        if idx == hit.term {
            continue;
        }
        let Some(len) = set.match_len_at(buffer, hit.start, idx) else {
            continue;
        };
        let end = hit.start + len;
        if end == hit.end || !word_bounded(buffer, hit.start, end) {
            continue;
        }
        return Some(Match {
            start: hit.start,
            end,
            class: set.class,
            term: idx,
            group: set.terms[idx].group,
        });
    }
    None
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A hit abutting the buffer boundaries is valid: there is no adjacent
/// character to violate the rule.
fn word_bounded(buffer: &str, start: usize, end: usize) -> bool {
    let before_ok = buffer[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !is_word_char(c));
    let after_ok = buffer[end..]
        .chars()
        .next()
        .map_or(true, |c| !is_word_char(c));
    before_ok && after_ok
}

fn next_char_boundary(buffer: &str, at: usize) -> usize {
    buffer[at..]
        .chars()
        .next()
        .map_or(buffer.len(), |c| at + c.len_utf8())
}

// =============================================================================
// Tests
// =============================================================================
