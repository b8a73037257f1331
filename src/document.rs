//! The immutable in-memory tree queries run against.
//!
//! Nodes live in one arena and are numbered in document order, with an
//! element's attributes numbered directly after the element. Comparing two
//! [`NodeId`]s therefore compares document positions.

use confpath_xpath1::{DataSourceNode, QName};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

pub use confpath_xpath1::NodeType as NodeKind;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A node's position in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    /// Qualified name as written; the target for processing instructions.
    name: Option<String>,
    /// Own text for text, comment, processing-instruction and attribute nodes.
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: Vec<NodeId>,
}

/// A parsed XML document. Never changes once built.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Document {
    /// A document holding only its root.
    pub(crate) fn new() -> Self {
        Document {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                name: None,
                value: String::new(),
                parent: None,
                children: Vec::new(),
                attributes: Vec::new(),
            }],
        }
    }

    /// Appends a node under `parent`. Attributes must be pushed right after
    /// their element so ids stay in document order.
    pub(crate) fn push(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: Option<String>,
        value: String,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            name,
            value,
            parent: Some(parent),
            children: Vec::new(),
            attributes: Vec::new(),
        });
        let parent = &mut self.nodes[parent.0];
        match kind {
            NodeKind::Attribute => parent.attributes.push(id),
            _ => parent.children.push(id),
        }
        id
    }

    pub(crate) fn append_text(&mut self, id: NodeId, text: &str) {
        self.nodes[id.0].value.push_str(text);
    }

    /// Adopts a tree parsed by roxmltree as it is, comments included.
    /// Prefixes are written back from the namespace declarations in scope.
    pub fn from_roxmltree(tree: &roxmltree::Document<'_>) -> Self {
        let mut document = Document::new();
        let mut stack = vec![(tree.root(), document.root())];

        while let Some((node, parent)) = stack.pop() {
            let text = || node.text().unwrap_or_default().to_string();
            let id = match node.node_type() {
                roxmltree::NodeType::Root => parent,
                roxmltree::NodeType::Element => {
                    let id = document.push(
                        parent,
                        NodeKind::Element,
                        Some(element_name(node)),
                        String::new(),
                    );
                    for (name, value) in element_attributes(node) {
                        document.push(id, NodeKind::Attribute, Some(name), value);
                    }
                    id
                }
                roxmltree::NodeType::Text => document.push(parent, NodeKind::Text, None, text()),
                roxmltree::NodeType::Comment => {
                    document.push(parent, NodeKind::Comment, None, text())
                }
                roxmltree::NodeType::PI => {
                    let pi = node.pi();
                    document.push(
                        parent,
                        NodeKind::ProcessingInstruction,
                        pi.as_ref().map(|pi| pi.target.to_string()),
                        pi.as_ref().and_then(|pi| pi.value).unwrap_or_default().to_string(),
                    )
                }
            };

            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, id)));
        }

        document
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The document element.
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&child| self.kind(child) == NodeKind::Element)
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { doc: self, id }
    }

    /// True when `id` was handed out by this document.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.data(id).kind
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.data(id).name.as_deref()
    }

    /// The node's own text. Empty for elements and the root.
    pub fn value(&self, id: NodeId) -> &str {
        &self.data(id).value
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).attributes
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|&&attr| self.name(attr) == Some(name))
            .map(|&attr| self.value(attr))
    }

    /// The XPath string value: descendant text for elements and the root,
    /// the node's own text otherwise.
    pub fn string_value(&self, id: NodeId) -> String {
        if !matches!(self.kind(id), NodeKind::Root | NodeKind::Element) {
            return self.value(id).to_string();
        }
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let data = self.data(current);
            match data.kind {
                NodeKind::Text => out.push_str(&data.value),
                NodeKind::Root | NodeKind::Element => {
                    stack.extend(data.children.iter().rev().copied())
                }
                _ => {}
            }
        }
        out
    }

    /// Element names from the document element down to `id`, joined by `/`.
    /// Non-element nodes use their nearest element ancestor.
    pub fn path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if self.kind(node) == NodeKind::Element {
                names.push(self.name(node).unwrap_or_default());
            }
            current = self.parent(node);
        }
        names.reverse();
        names.join("/")
    }

    /// A short human-readable description of a node for error messages.
    pub fn describe(&self, id: NodeId) -> String {
        if !self.contains(id) {
            return format!("foreign node #{}", id.0);
        }
        let name = self.name(id).unwrap_or_default();
        match self.kind(id) {
            NodeKind::Root => "the document root".to_string(),
            NodeKind::Element => format!("element <{}> at /{}", name, self.path(id)),
            NodeKind::Attribute => format!("attribute @{} at /{}", name, self.path(id)),
            NodeKind::Text => format!("text node at /{}", self.path(id)),
            NodeKind::Comment => format!("comment at /{}", self.path(id)),
            NodeKind::ProcessingInstruction => {
                format!("processing instruction '{}' at /{}", name, self.path(id))
            }
        }
    }

    /// Writes the subtree rooted at `id` as XML.
    pub fn write_xml(&self, id: NodeId, out: &mut impl fmt::Write) -> fmt::Result {
        let data = self.data(id);
        let name = data.name.as_deref().unwrap_or_default();
        match data.kind {
            NodeKind::Root => {
                for &child in &data.children {
                    self.write_xml(child, out)?;
                }
                Ok(())
            }
            NodeKind::Element => {
                write!(out, "<{}", name)?;
                for &attr in &data.attributes {
                    out.write_char(' ')?;
                    self.write_xml(attr, out)?;
                }
                if data.children.is_empty() {
                    return out.write_str("/>");
                }
                out.write_char('>')?;
                for &child in &data.children {
                    self.write_xml(child, out)?;
                }
                write!(out, "</{}>", name)
            }
            NodeKind::Attribute => {
                write!(out, "{}=\"{}\"", name, quick_xml::escape::escape(data.value.as_str()))
            }
            NodeKind::Text => out.write_str(&quick_xml::escape::escape(data.value.as_str())),
            NodeKind::Comment => write!(out, "<!--{}-->", data.value),
            NodeKind::ProcessingInstruction if data.value.is_empty() => write!(out, "<?{}?>", name),
            NodeKind::ProcessingInstruction => write!(out, "<?{} {}?>", name, data.value),
        }
    }
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
        _ => local.to_string(),
    }
}

fn element_name(node: roxmltree::Node<'_, '_>) -> String {
    let tag = node.tag_name();
    let prefix = tag.namespace().and_then(|uri| node.lookup_prefix(uri));
    qualified(prefix, tag.name())
}

/// The element's attributes as written, namespace declarations first.
fn element_attributes(node: roxmltree::Node<'_, '_>) -> Vec<(String, String)> {
    let mut attrs = Vec::new();

    let parent = node.parent_element();
    for ns in node.namespaces() {
        let inherited = parent.is_some_and(|p| {
            p.namespaces()
                .any(|outer| outer.name() == ns.name() && outer.uri() == ns.uri())
        });
        if inherited || ns.name() == Some("xml") {
            continue;
        }
        let name = match ns.name() {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        attrs.push((name, ns.uri().to_string()));
    }

    for attr in node.attributes() {
        let prefix = match attr.namespace() {
            Some(XML_NAMESPACE) => Some("xml"),
            Some(uri) => node.lookup_prefix(uri),
            None => None,
        };
        attrs.push((qualified(prefix, attr.name()), attr.value().to_string()));
    }
    attrs
}

/// A node of a [`Document`], as the XPath evaluator sees it.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    fn data(&self) -> &'a NodeData {
        &self.doc.nodes[self.id.0]
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id.0)
            .field("kind", &self.data().kind)
            .field("name", &self.data().name)
            .finish()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl PartialOrd for NodeRef<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeRef<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for NodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<'a> DataSourceNode<'a> for NodeRef<'a> {
    fn node_type(&self) -> NodeKind {
        self.data().kind
    }

    fn name(&self) -> Option<QName<'a>> {
        self.data().name.as_deref().map(QName::parse)
    }

    fn string_value(&self) -> String {
        self.doc.string_value(self.id)
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        let doc = self.doc;
        Box::new(self.data().attributes.iter().map(move |&id| NodeRef { doc, id }))
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        let doc = self.doc;
        Box::new(self.data().children.iter().map(move |&id| NodeRef { doc, id }))
    }

    fn parent(&self) -> Option<Self> {
        self.data().parent.map(|id| NodeRef { doc: self.doc, id })
    }
}
