//! Annotation applier: resolved matches → structural document edits.
//!
//! Matches are applied rightmost-first so edits never invalidate the
//! still-unprocessed offsets of leftward matches; a split text node keeps its
//! identity for the prefix, which is where any leftward offsets point.
//!
//! A match inside one text node splits the node around a new marker element.
//! A match crossing node boundaries hoists both ends to children of the
//! nearest common ancestor and moves the covered sibling range under one
//! marker; a boundary that falls strictly inside a non-text child, or a span
//! that would swallow an excluded container, is a per-match mutation error:
//! the match is skipped and the pass continues.
//!
//! Clearing is the structural inverse: each marker collapses to one text
//! node holding its text content, and adjacent text siblings coalesce.

use serde::Serialize;

use crate::dom::{Document, NodeId, ANNOTATION_CLASS};
use crate::scanner::compiler::{CompiledTerms, GroupStyle, TermClass, TermSet};
use crate::scanner::fragments::FragmentTable;
use crate::scanner::resolver::Match;

/// Outcome of one apply pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub skipped: usize,
}

/// Materialize matches as annotation markers. `matches` must be sorted by
/// start offset with pairwise disjoint spans (the resolver guarantees both).
pub fn apply(
    doc: &mut Document,
    table: &FragmentTable,
    matches: &[Match],
    terms: &CompiledTerms,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();
    for m in matches.iter().rev() {
        match wrap_match(doc, table, m, terms) {
            Some(()) => outcome.applied += 1,
            None => {
                log::warn!(
                    "skipping {} annotation at {}..{}: span not cleanly wrappable",
                    m.class.as_str(),
                    m.start,
                    m.end
                );
                outcome.skipped += 1;
            }
        }
    }
    outcome
}

/// Remove every annotation marker, replacing it with its plain text content.
/// Best-effort: detached markers are left alone. Returns the number of
/// markers removed.
pub fn clear(doc: &mut Document) -> usize {
    let markers: Vec<NodeId> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|&n| doc.is_annotation(n))
        .collect();

    let mut removed = 0;
    let mut touched_parents: Vec<NodeId> = Vec::new();
    for marker in markers {
        // A marker nested under an already-flattened one is gone from the
        // tree by the time we reach it.
        if !doc.is_attached(marker) {
            continue;
        }
        let Some(parent) = doc.parent(marker) else {
            log::warn!("annotation marker has no parent; leaving it in place");
            continue;
        };
        let Some(idx) = doc.child_index(parent, marker) else {
            log::warn!("annotation marker missing from parent; leaving it in place");
            continue;
        };
        let text = doc.text_content(marker);
        doc.remove_child(parent, idx);
        let replacement = doc.create_text(&text);
        doc.insert_child(parent, idx, replacement);
        removed += 1;
        if !touched_parents.contains(&parent) {
            touched_parents.push(parent);
        }
    }

    for parent in touched_parents {
        if doc.is_attached(parent) {
            doc.normalize(parent);
        }
    }
    removed
}

// =============================================================================
// Wrapping
// =============================================================================

fn class_set(terms: &CompiledTerms, class: TermClass) -> &TermSet {
    match class {
        TermClass::Full => &terms.full,
        TermClass::Last => &terms.last,
        TermClass::Keyword => &terms.keyword,
    }
}

fn new_marker(doc: &mut Document, class: TermClass, style: Option<&GroupStyle>) -> NodeId {
    let marker = doc.create_element("span");
    doc.set_attr(marker, "class", ANNOTATION_CLASS);
    doc.set_attr(marker, "data-class", class.as_str());
    if let Some(style) = style {
        doc.set_attr(marker, "data-group", &style.label);
        doc.set_attr(
            marker,
            "style",
            &format!(
                "background-color: {}; color: {};",
                style.color, style.text_color
            ),
        );
    }
    marker
}

fn wrap_match(
    doc: &mut Document,
    table: &FragmentTable,
    m: &Match,
    terms: &CompiledTerms,
) -> Option<()> {
    let sfrag = *table.fragment_at(m.start)?;
    let efrag = *table.fragment_at(m.end - 1)?;
    let s_local = m.start - sfrag.start;
    let e_local = m.end - efrag.start;
    let style = class_set(terms, m.class).style(m.group).cloned();

    if sfrag.node == efrag.node {
        wrap_single(doc, sfrag.node, s_local, e_local, m.class, style.as_ref())
    } else {
        wrap_across(
            doc,
            table,
            m,
            sfrag.node,
            s_local,
            efrag.node,
            e_local,
            style.as_ref(),
        )
    }
}

/// Match contained in one text node: split the node around a marker. The
/// original node keeps the prefix text so leftward offsets stay valid.
fn wrap_single(
    doc: &mut Document,
    node: NodeId,
    start: usize,
    end: usize,
    class: TermClass,
    style: Option<&GroupStyle>,
) -> Option<()> {
    let parent = doc.parent(node)?;
    let idx = doc.child_index(parent, node)?;
    let text = doc.text(node)?.to_string();
    if end > text.len() {
        return None;
    }

    let marker = new_marker(doc, class, style);
    let body = doc.create_text(&text[start..end]);
    doc.append_child(marker, body);

    let mut insert_at = idx;
    if start > 0 {
        doc.set_text(node, &text[..start]);
        insert_at = idx + 1;
    } else {
        doc.remove_child(parent, idx);
    }
    doc.insert_child(parent, insert_at, marker);
    if end < text.len() {
        let after = doc.create_text(&text[end..]);
        doc.insert_child(parent, insert_at + 1, after);
    }
    Some(())
}

/// Match spanning multiple nodes: hoist both ends to children of the nearest
/// common ancestor and move the covered sibling range under one marker.
#[allow(clippy::too_many_arguments)]
fn wrap_across(
    doc: &mut Document,
    table: &FragmentTable,
    m: &Match,
    snode: NodeId,
    s_local: usize,
    enode: NodeId,
    e_local: usize,
    style: Option<&GroupStyle>,
) -> Option<()> {
    let (ca, s_top, e_top) = common_ancestor(doc, snode, enode)?;
    let mut first = doc.child_index(ca, s_top)?;
    let mut last = doc.child_index(ca, e_top)?;
    if first > last {
        return None;
    }

    // Alignment guards before any mutation. A boundary inside a non-text
    // child must coincide with that child's full text extent.
    if snode != s_top {
        let (lo, _) = table.subtree_range(doc, s_top)?;
        if lo != m.start {
            return None;
        }
    }
    if enode != e_top {
        let (_, hi) = table.subtree_range(doc, e_top)?;
        if hi != m.end {
            return None;
        }
    }
    for i in first..=last {
        if subtree_contains_excluded(doc, doc.children(ca)[i]) {
            return None;
        }
    }

    // End split first: it does not disturb indices at or below `last`.
    if enode == e_top {
        let text = doc.text(enode)?.to_string();
        if e_local > text.len() {
            return None;
        }
        if e_local < text.len() {
            doc.set_text(enode, &text[..e_local]);
            let rest = doc.create_text(&text[e_local..]);
            doc.insert_child(ca, last + 1, rest);
        }
    }
    if snode == s_top && s_local > 0 {
        let text = doc.text(snode)?.to_string();
        doc.set_text(snode, &text[..s_local]);
        let covered = doc.create_text(&text[s_local..]);
        doc.insert_child(ca, first + 1, covered);
        first += 1;
        last += 1;
    }

    let marker = new_marker(doc, m.class, style);
    let moved: Vec<NodeId> = (first..=last).map(|_| doc.remove_child(ca, first)).collect();
    doc.insert_child(ca, first, marker);
    for node in moved {
        doc.append_child(marker, node);
    }
    Some(())
}

/// Nearest common ancestor of two nodes, plus the child of that ancestor on
/// each node's path (the node itself when it is a direct child).
fn common_ancestor(doc: &Document, a: NodeId, b: NodeId) -> Option<(NodeId, NodeId, NodeId)> {
    let mut a_path = vec![a];
    let mut cursor = a;
    while let Some(p) = doc.parent(cursor) {
        a_path.push(p);
        cursor = p;
    }

    let mut b_top = b;
    loop {
        let p = doc.parent(b_top)?;
        if let Some(pos) = a_path.iter().position(|&n| n == p) {
            let a_top = *a_path.get(pos.checked_sub(1)?)?;
            return Some((p, a_top, b_top));
        }
        b_top = p;
    }
}

fn subtree_contains_excluded(doc: &Document, node: NodeId) -> bool {
    doc.descendants(node)
        .into_iter()
        .any(|n| doc.is_excluded_container(n))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, NameEntry, NameGroup};
    use crate::scanner::compiler::compile;
    use crate::scanner::resolver::resolve;

    fn smith_config() -> Config {
        Config {
            name_groups: vec![NameGroup::new(
                "Team",
                vec![NameEntry::new("John", "Smith")],
            )],
            ..Config::default()
        }
    }

    fn run_pass(doc: &mut Document, config: &Config) -> ApplyOutcome {
        let terms = compile(config).unwrap();
        let table = FragmentTable::build(doc);
        let matches = resolve(&terms, table.buffer());
        apply(doc, &table, &matches, &terms)
    }

    #[test]
    fn test_single_node_wrap_preserves_text() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "see John Smith here");

        let before = doc.text_content(doc.root());
        let outcome = run_pass(&mut doc, &smith_config());

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(doc.text_content(doc.root()), before);
        let html = doc.to_html(doc.root());
        assert!(html.contains(&format!("class=\"{ANNOTATION_CLASS}\"")));
        assert!(html.contains("data-class=\"full\""));
        assert!(html.contains("data-group=\"Team\""));
        assert!(html.contains(">John Smith</span>"));
    }

    #[test]
    fn test_marker_carries_group_colors() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "Smith");

        let mut config = smith_config();
        config.name_groups[0].color_last = "#aabbcc".into();
        config.name_groups[0].text_color_last = "#112233".into();
        run_pass(&mut doc, &config);

        let html = doc.to_html(doc.root());
        assert!(html.contains("background-color: #aabbcc; color: #112233;"));
        assert!(html.contains("data-class=\"last\""));
    }

    #[test]
    fn test_multiple_matches_in_one_text_node() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "Smith met Smith and Smith");

        let outcome = run_pass(&mut doc, &smith_config());
        assert_eq!(outcome.applied, 3);
        assert_eq!(doc.text_content(doc.root()), "Smith met Smith and Smith");
        assert_eq!(
            doc.to_html(doc.root()).matches("data-class=\"last\"").count(),
            3
        );
    }

    #[test]
    fn test_match_at_node_edges() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "Smith");

        let outcome = run_pass(&mut doc, &smith_config());
        assert_eq!(outcome.applied, 1);
        // No empty text nodes around the marker
        assert_eq!(doc.children(p).len(), 1);
    }

    #[test]
    fn test_cross_node_wrap() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "John ");
        let b = doc.append_element(p, "b");
        doc.append_text(b, "Smith");
        doc.append_text(p, " waved");

        let outcome = run_pass(&mut doc, &smith_config());
        assert_eq!(outcome.applied, 1);
        assert_eq!(doc.text_content(doc.root()), "John Smith waved");

        // Marker now owns both the text and the <b> element
        let marker = doc.children(p)[0];
        assert!(doc.is_annotation(marker));
        assert_eq!(doc.text_content(marker), "John Smith");
        assert_eq!(doc.to_html(p).matches("<b>").count(), 1);
    }

    #[test]
    fn test_cross_node_wrap_with_prefix_split() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "by John ");
        let b = doc.append_element(p, "b");
        doc.append_text(b, "Smith");

        let outcome = run_pass(&mut doc, &smith_config());
        assert_eq!(outcome.applied, 1);
        assert_eq!(doc.text_content(doc.root()), "by John Smith");
        // Prefix text survives outside the marker
        assert_eq!(doc.text(doc.children(p)[0]), Some("by "));
    }

    #[test]
    fn test_partial_element_overlap_skipped() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "John ");
        let b = doc.append_element(p, "b");
        doc.append_text(b, "Smith extra");

        let before = doc.to_html(doc.root());
        let outcome = run_pass(&mut doc, &smith_config());
        // "John Smith" ends mid-way through <b>'s text: not cleanly wrappable
        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(doc.to_html(doc.root()), before);
    }

    #[test]
    fn test_span_over_excluded_container_skipped() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "John ");
        let code = doc.append_element(p, "code");
        doc.append_text(code, "x");
        doc.append_text(p, "Smith");

        let outcome = run_pass(&mut doc, &smith_config());
        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.skipped, 1);
        // The excluded container was not touched
        assert_eq!(doc.text_content(code), "x");
    }

    #[test]
    fn test_clear_restores_original_markup() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "Smith, John arrived. Later, Smith left.");

        let before = doc.to_html(doc.root());
        let outcome = run_pass(&mut doc, &smith_config());
        assert_eq!(outcome.applied, 2);
        assert_ne!(doc.to_html(doc.root()), before);

        let removed = clear(&mut doc);
        assert_eq!(removed, 2);
        assert_eq!(doc.to_html(doc.root()), before);
    }

    #[test]
    fn test_clear_counts_only_attached_markers() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "Smith");
        run_pass(&mut doc, &smith_config());

        // A detached marker somewhere in the arena must not be counted
        let stray = doc.create_element("span");
        doc.set_attr(stray, "class", ANNOTATION_CLASS);

        assert_eq!(clear(&mut doc), 1);
        assert_eq!(doc.to_html(p), "<p>Smith</p>");
    }

    #[test]
    fn test_clear_on_clean_document_is_noop() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "nothing annotated");
        let before = doc.to_html(doc.root());
        assert_eq!(clear(&mut doc), 0);
        assert_eq!(doc.to_html(doc.root()), before);
    }
}
