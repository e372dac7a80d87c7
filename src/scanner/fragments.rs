//! Document text model: tree → logical buffer + fragment table.
//!
//! The walk captures a flat, position-indexed snapshot of the document so
//! matching runs over plain text with no live tree references; only the
//! applier later re-associates buffer offsets with nodes. Excluded subtrees
//! are never read; whitespace-only text nodes are skipped. Fragments are
//! ordered, non-overlapping, and contiguous in buffer space.

use crate::dom::{Document, NodeId};

/// One contiguous run of buffer offsets mapped to a single text node.
/// `end - start` equals the node's text length in bytes.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

/// The scan-ready view of a document.
pub struct FragmentTable {
    buffer: String,
    fragments: Vec<Fragment>,
}

impl FragmentTable {
    /// Walk all text-bearing nodes in document order, depth-first, skipping
    /// excluded subtrees.
    pub fn build(doc: &Document) -> Self {
        let mut buffer = String::new();
        let mut fragments = Vec::new();
        let mut stack = vec![doc.root()];

        while let Some(node) = stack.pop() {
            if let Some(text) = doc.text(node) {
                if !text.trim().is_empty() {
                    let start = buffer.len();
                    buffer.push_str(text);
                    fragments.push(Fragment {
                        node,
                        start,
                        end: buffer.len(),
                    });
                }
                continue;
            }
            if node != doc.root() && doc.is_excluded_container(node) {
                continue;
            }
            for &child in doc.children(node).iter().rev() {
                stack.push(child);
            }
        }

        Self { buffer, fragments }
    }

    /// The logical text the resolver scans: all fragment texts concatenated
    /// in document order.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragment containing the given byte offset.
    pub fn fragment_at(&self, offset: usize) -> Option<&Fragment> {
        if offset >= self.buffer.len() {
            return None;
        }
        // First fragment starting after `offset`, minus one.
        let idx = self.fragments.partition_point(|f| f.start <= offset);
        self.fragments.get(idx.checked_sub(1)?)
    }

    /// Resolve a buffer offset to `(node, offset-within-node)`.
    pub fn locate(&self, offset: usize) -> Option<(NodeId, usize)> {
        let frag = self.fragment_at(offset)?;
        Some((frag.node, offset - frag.start))
    }

    /// Buffer range covered by the subtree rooted at `node`, if any of its
    /// text was captured. Used to check that a structural edit's boundary
    /// aligns with an element's full extent.
    pub fn subtree_range(&self, doc: &Document, node: NodeId) -> Option<(usize, usize)> {
        let mut lo = None;
        let mut hi = None;
        for &d in doc.descendants(node).iter() {
            for frag in &self.fragments {
                if frag.node == d {
                    lo = Some(lo.map_or(frag.start, |v: usize| v.min(frag.start)));
                    hi = Some(hi.map_or(frag.end, |v: usize| v.max(frag.end)));
                }
            }
        }
        Some((lo?, hi?))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_concatenates_in_document_order() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "John ");
        let b = doc.append_element(p, "b");
        doc.append_text(b, "Smith");
        doc.append_text(p, " left");

        let table = FragmentTable::build(&doc);
        assert_eq!(table.buffer(), "John Smith left");
        assert_eq!(table.fragments().len(), 3);
        assert_eq!(table.fragments()[1].start, 5);
        assert_eq!(table.fragments()[1].end, 10);
    }

    #[test]
    fn test_excluded_subtrees_not_read() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "visible");
        let code = doc.append_element(doc.root(), "code");
        doc.append_text(code, "hidden");
        let nested = doc.append_element(code, "span");
        doc.append_text(nested, "also hidden");

        let table = FragmentTable::build(&doc);
        assert_eq!(table.buffer(), "visible");
    }

    #[test]
    fn test_whitespace_only_nodes_skipped() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "a");
        doc.append_text(p, "  \n ");
        doc.append_text(p, "b");

        let table = FragmentTable::build(&doc);
        assert_eq!(table.buffer(), "ab");
        assert_eq!(table.fragments().len(), 2);
    }

    #[test]
    fn test_locate_maps_back_to_nodes() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        let t1 = doc.append_text(p, "abc");
        let t2 = doc.append_text(p, "def");

        let table = FragmentTable::build(&doc);
        assert_eq!(table.locate(0), Some((t1, 0)));
        assert_eq!(table.locate(2), Some((t1, 2)));
        assert_eq!(table.locate(3), Some((t2, 0)));
        assert_eq!(table.locate(5), Some((t2, 2)));
        assert_eq!(table.locate(6), None);
    }

    #[test]
    fn test_subtree_range() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "John ");
        let b = doc.append_element(p, "b");
        doc.append_text(b, "Smith");
        doc.append_text(p, " left");

        let table = FragmentTable::build(&doc);
        assert_eq!(table.subtree_range(&doc, b), Some((5, 10)));
        assert_eq!(table.subtree_range(&doc, p), Some((0, 15)));
        let empty = doc.append_element(doc.root(), "div");
        assert_eq!(table.subtree_range(&doc, empty), None);
    }

    #[test]
    fn test_annotation_markers_not_rescanned() {
        use crate::dom::ANNOTATION_CLASS;
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        let marker = doc.append_element(p, "span");
        doc.set_attr(marker, "class", ANNOTATION_CLASS);
        doc.append_text(marker, "John Smith");
        doc.append_text(p, " waved");

        let table = FragmentTable::build(&doc);
        assert_eq!(table.buffer(), " waved");
    }
}
