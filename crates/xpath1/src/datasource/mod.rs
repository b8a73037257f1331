//! The read-only node abstraction the evaluator is written against.
use std::fmt;
use std::hash::Hash;

/// A qualified name, consisting of an optional prefix and a local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
}

impl<'a> QName<'a> {
    /// Splits a name as written (`xsi:type`) into prefix and local part.
    pub fn parse(name: &'a str) -> Self {
        match name.split_once(':') {
            Some((prefix, local_part)) if !prefix.is_empty() && !local_part.is_empty() => QName {
                prefix: Some(prefix),
                local_part,
            },
            _ => QName {
                prefix: None,
                local_part: name,
            },
        }
    }

    /// Compares against a name test as written in an expression. Prefixes are
    /// compared literally; no namespace resolution takes place.
    pub fn matches(&self, test: &str) -> bool {
        match (self.prefix, test.split_once(':')) {
            (None, None) => self.local_part == test,
            (Some(prefix), Some((test_prefix, test_local))) => {
                prefix == test_prefix && self.local_part == test_local
            }
            _ => false,
        }
    }
}

impl fmt::Display for QName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local_part),
            None => f.write_str(self.local_part),
        }
    }
}

/// The type of a node, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// The contract for a node in a read-only, hierarchical document.
///
/// The evaluator only ever sees nodes through this trait. `Ord` must follow
/// document order: a node sorts after its ancestors, an element's attributes
/// sort after the element and before its children.
///
/// `'a` is the lifetime of the underlying document.
pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    fn node_type(&self) -> NodeType;

    /// The qualified name of the node. `None` for text, comment and root
    /// nodes. For a processing-instruction, this is its target.
    fn name(&self) -> Option<QName<'a>>;

    /// The string value of the node, as defined by the XPath 1.0 `string()` function.
    /// - For a text node, this is its content.
    /// - For an element or the root, the concatenation of all descendant text nodes.
    /// - For an attribute, this is its value.
    /// - For a comment or processing instruction, this is its content.
    fn string_value(&self) -> String;

    /// Attribute nodes of this node; empty for anything but elements.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// Child nodes in document order. Attributes are not children.
    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// The parent node; for an attribute this is its owner element.
    fn parent(&self) -> Option<Self>;
}
