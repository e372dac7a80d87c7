//! Arena-indexed document tree.
//!
//! The host hands the engine a live, hierarchical text document; this module
//! models it as a flat arena of element and text nodes addressed by `NodeId`.
//! The tree supports the structural edits the annotator needs (child
//! insertion/removal by index, text splitting, adjacent-text coalescing) and
//! nothing else. Removed nodes stay in the arena as detached tombstones;
//! liveness is "reachable from the root".

// =============================================================================
// Constants
// =============================================================================

/// Class carried by every annotation marker element. Subtrees under a marker
/// are never re-scanned.
pub const ANNOTATION_CLASS: &str = "markcore-highlight";

/// Containers whose subtrees are never scanned or mutated.
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "code", "pre", "textarea", "input", "select", "button",
];

// =============================================================================
// Types
// =============================================================================

/// Handle into the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// A mutable document tree with a fixed root element.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Construction
// =============================================================================

impl Document {
    /// Create an empty document rooted at a `body` element.
    pub fn new() -> Self {
        let root_node = Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
            },
        };
        Self {
            nodes: vec![root_node],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element node.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    /// Create an element and append it to `parent`. Builder convenience.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_element(tag);
        self.append_child(parent, id);
        id
    }

    /// Create a text node and append it to `parent`. Builder convenience.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }
}

// =============================================================================
// Accessors
// =============================================================================

impl Document {
    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Element { .. })
    }

    /// Tag name, for element nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    /// Text payload, for text nodes.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => Some(t),
            NodeData::Element { .. } => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    /// Position of `child` within `parent`'s child list.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.nodes[parent.0].children.iter().position(|&c| c == child)
    }

    /// A node is attached if walking parents reaches the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = id;
        loop {
            if cursor == self.root {
                return true;
            }
            match self.nodes[cursor.0].parent {
                Some(p) => cursor = p,
                None => return false,
            }
        }
    }

    /// Concatenated text of the subtree rooted at `id`, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => out.push_str(t),
            NodeData::Element { .. } => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Preorder traversal of the subtree rooted at `id` (inclusive).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            for &child in self.nodes[n.0].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

// =============================================================================
// Mutation
// =============================================================================

impl Document {
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            if let Some(slot) = attrs.iter_mut().find(|(n, _)| n == name) {
                slot.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let NodeData::Text(t) = &mut self.nodes[id.0].data {
            *t = text.to_string();
        }
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `child` at `index` within `parent`'s child list.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Remove and return the child at `index`. The node stays in the arena,
    /// detached.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> NodeId {
        let child = self.nodes[parent.0].children.remove(index);
        self.nodes[child.0].parent = None;
        child
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(p) = self.nodes[id.0].parent {
            if let Some(idx) = self.child_index(p, id) {
                self.nodes[p.0].children.remove(idx);
            }
            self.nodes[id.0].parent = None;
        }
    }

    /// Coalesce adjacent text children of `parent` and drop empty text
    /// children. Structural inverse of text-node splitting.
    pub fn normalize(&mut self, parent: NodeId) {
        let children = self.nodes[parent.0].children.clone();
        let mut rebuilt: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            match &self.nodes[child.0].data {
                NodeData::Text(t) if t.is_empty() => {
                    self.nodes[child.0].parent = None;
                }
                NodeData::Text(t) => {
                    let t = t.clone();
                    match rebuilt.last().copied() {
                        Some(prev) if self.is_text(prev) => {
                            if let NodeData::Text(pt) = &mut self.nodes[prev.0].data {
                                pt.push_str(&t);
                            }
                            self.nodes[child.0].parent = None;
                        }
                        _ => rebuilt.push(child),
                    }
                }
                NodeData::Element { .. } => rebuilt.push(child),
            }
        }
        self.nodes[parent.0].children = rebuilt;
    }
}

// =============================================================================
// Scan exclusion
// =============================================================================

impl Document {
    /// Whether the element's `class` attribute contains `token`.
    pub fn has_class(&self, id: NodeId, token: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == token))
            .unwrap_or(false)
    }

    /// True for annotation marker elements created by this engine.
    pub fn is_annotation(&self, id: NodeId) -> bool {
        self.is_element(id) && self.has_class(id, ANNOTATION_CLASS)
    }

    /// Whether this element's subtree is off-limits to scanning and mutation:
    /// code/script/style containers, form inputs, editable regions, and
    /// previously-created annotation markers.
    pub fn is_excluded_container(&self, id: NodeId) -> bool {
        let Some(tag) = self.tag(id) else {
            return false;
        };
        if EXCLUDED_TAGS.contains(&tag) {
            return true;
        }
        if let Some(editable) = self.attr(id, "contenteditable") {
            if editable != "false" {
                return true;
            }
        }
        self.is_annotation(id)
    }
}

// =============================================================================
// Rendering (tests, demos, host debugging)
// =============================================================================

impl Document {
    /// Serialize the subtree rooted at `id` as HTML-ish markup. Attribute
    /// order is insertion order; no escaping is performed.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render(id, &mut out);
        out
    }

    fn render(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => out.push_str(t),
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(value);
                    out.push('"');
                }
                out.push('>');
                for &child in &self.nodes[id.0].children {
                    self.render(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
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
    fn test_build_and_render() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "Hello ");
        let b = doc.append_element(p, "b");
        doc.append_text(b, "world");
        assert_eq!(doc.to_html(doc.root()), "<body><p>Hello <b>world</b></p></body>");
        assert_eq!(doc.text_content(doc.root()), "Hello world");
    }

    #[test]
    fn test_insert_remove_child() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        let a = doc.append_text(p, "a");
        doc.append_text(p, "c");
        let b = doc.create_text("b");
        doc.insert_child(p, 1, b);
        assert_eq!(doc.text_content(p), "abc");

        let removed = doc.remove_child(p, 1);
        assert_eq!(removed, b);
        assert_eq!(doc.text_content(p), "ac");
        assert!(!doc.is_attached(b));
        assert!(doc.is_attached(a));
    }

    #[test]
    fn test_normalize_merges_and_drops_empty() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "a");
        doc.append_text(p, "");
        doc.append_text(p, "b");
        doc.append_element(p, "br");
        doc.append_text(p, "c");
        doc.append_text(p, "d");
        doc.normalize(p);
        assert_eq!(doc.children(p).len(), 3);
        assert_eq!(doc.to_html(p), "<p>ab<br></br>cd</p>");
    }

    #[test]
    fn test_excluded_containers() {
        let mut doc = Document::new();
        let code = doc.append_element(doc.root(), "code");
        let div = doc.append_element(doc.root(), "div");
        let editable = doc.append_element(doc.root(), "div");
        doc.set_attr(editable, "contenteditable", "true");
        let not_editable = doc.append_element(doc.root(), "div");
        doc.set_attr(not_editable, "contenteditable", "false");
        let marker = doc.append_element(doc.root(), "span");
        doc.set_attr(marker, "class", format!("x {}", ANNOTATION_CLASS).as_str());

        assert!(doc.is_excluded_container(code));
        assert!(!doc.is_excluded_container(div));
        assert!(doc.is_excluded_container(editable));
        assert!(!doc.is_excluded_container(not_editable));
        assert!(doc.is_excluded_container(marker));
        assert!(doc.is_annotation(marker));
    }

    #[test]
    fn test_append_reparents() {
        let mut doc = Document::new();
        let p1 = doc.append_element(doc.root(), "p");
        let p2 = doc.append_element(doc.root(), "p");
        let t = doc.append_text(p1, "x");
        doc.append_child(p2, t);
        assert!(doc.children(p1).is_empty());
        assert_eq!(doc.parent(t), Some(p2));
    }
}
