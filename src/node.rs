//! [`TypedNode`], a queryable handle on one node of a parsed document.

use crate::document::{Document, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::evaluator::QueryEvaluator;
use crate::extract::{Scope, parse_integer};
use confpath_vars::{SharedVariables, Variables};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A node together with the engine and variables it was produced with.
///
/// Expressions evaluated through a `TypedNode` use the node as their context,
/// and nodes they return carry the same engine and variables. Replacing the
/// variables on the owning [`QueryParser`](crate::QueryParser) is visible here.
#[derive(Clone)]
pub struct TypedNode {
    id: NodeId,
    engine: Arc<QueryEvaluator>,
    variables: SharedVariables,
}

impl TypedNode {
    pub(crate) fn new(id: NodeId, engine: Arc<QueryEvaluator>, variables: SharedVariables) -> Self {
        Self {
            id,
            engine,
            variables,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &Document {
        self.engine.document()
    }

    fn scope(&self) -> Scope<'_> {
        Scope {
            engine: &self.engine,
            variables: &self.variables,
            context: Some(self.id),
        }
    }

    pub fn eval_string(&self, expression: &str) -> Result<String> {
        self.scope().string(expression)
    }

    pub fn eval_bool(&self, expression: &str) -> Result<bool> {
        self.scope().boolean(expression)
    }

    pub fn eval_short(&self, expression: &str) -> Result<i16> {
        self.scope().short(expression)
    }

    pub fn eval_int(&self, expression: &str) -> Result<i32> {
        self.scope().int(expression)
    }

    pub fn eval_long(&self, expression: &str) -> Result<i64> {
        self.scope().long(expression)
    }

    pub fn eval_float(&self, expression: &str) -> Result<f32> {
        self.scope().float(expression)
    }

    /// The XPath number value. Never substituted.
    pub fn eval_double(&self, expression: &str) -> Result<f64> {
        self.scope().double(expression)
    }

    /// The first selected node, `None` when nothing matched.
    pub fn eval_node(&self, expression: &str) -> Result<Option<TypedNode>> {
        self.scope().node(expression)
    }

    /// All selected nodes in document order.
    pub fn eval_nodes(&self, expression: &str) -> Result<Vec<TypedNode>> {
        self.scope().nodes(expression)
    }

    /// The element or attribute name; the target of a processing instruction.
    pub fn name(&self) -> Option<&str> {
        self.document().name(self.id)
    }

    pub fn kind(&self) -> NodeKind {
        self.document().kind(self.id)
    }

    /// Element names from the document element to this node, e.g.
    /// `configuration/environments/environment`.
    pub fn path(&self) -> String {
        self.document().path(self.id)
    }

    /// The parent element. `None` for the document element and the root.
    pub fn parent(&self) -> Option<TypedNode> {
        let document = self.document();
        document
            .parent(self.id)
            .filter(|&p| document.kind(p) == NodeKind::Element)
            .map(|p| self.scope().wrap(p))
    }

    /// Element children in document order.
    pub fn children(&self) -> Vec<TypedNode> {
        let document = self.document();
        document
            .children(self.id)
            .iter()
            .copied()
            .filter(|&c| document.kind(c) == NodeKind::Element)
            .map(|c| self.scope().wrap(c))
            .collect()
    }

    /// The node's own text, substituted: the first text child of an element,
    /// or the value of any other node. `None` when an element has no text.
    pub fn string_body(&self) -> Option<String> {
        let document = self.document();
        let raw = match document.kind(self.id) {
            NodeKind::Element | NodeKind::Root => document
                .children(self.id)
                .iter()
                .find(|&&c| document.kind(c) == NodeKind::Text)
                .map(|&c| document.value(c))?,
            _ => document.value(self.id),
        };
        Some(self.variables.substitute(raw))
    }

    pub fn string_body_or(&self, default: &str) -> String {
        self.string_body().unwrap_or_else(|| default.to_string())
    }

    /// Attribute values by name, substituted.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let document = self.document();
        document
            .attributes(self.id)
            .iter()
            .map(|&a| {
                (
                    document.name(a).unwrap_or_default().to_string(),
                    self.variables.substitute(document.value(a)),
                )
            })
            .collect()
    }

    pub fn string_attribute(&self, name: &str) -> Option<String> {
        self.document()
            .attribute(self.id, name)
            .map(|value| self.variables.substitute(value))
    }

    pub fn string_attribute_or(&self, name: &str, default: &str) -> String {
        self.string_attribute(name)
            .unwrap_or_else(|| default.to_string())
    }

    /// `Some(true)` only for a case-insensitive `true`.
    pub fn bool_attribute(&self, name: &str) -> Option<bool> {
        self.string_attribute(name)
            .map(|value| value.eq_ignore_ascii_case("true"))
    }

    pub fn int_attribute(&self, name: &str) -> Result<Option<i32>> {
        self.string_attribute(name)
            .map(|value| parse_integer(&value, "i32"))
            .transpose()
    }

    /// Collects `name`/`value` attribute pairs of the element children, as in
    /// `<property name="driver" value="${driver}"/>`. Children without a
    /// `name` are skipped.
    pub fn children_as_variables(&self) -> Variables {
        self.children()
            .iter()
            .filter_map(|child| {
                let name = child.string_attribute("name")?;
                let value = child.string_attribute_or("value", "");
                Some((name, value))
            })
            .collect()
    }
}

impl fmt::Debug for TypedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedNode")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Renders the subtree as XML.
impl fmt::Display for TypedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.document().write_xml(self.id, f)
    }
}

impl PartialEq for TypedNode {
    /// Same node of the same document.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.engine, &other.engine)
    }
}

impl Eq for TypedNode {}

/// Checks that `node` was produced by `engine`.
pub(crate) fn ensure_same_engine(
    engine: &Arc<QueryEvaluator>,
    node: &TypedNode,
    expression: &str,
) -> Result<()> {
    if Arc::ptr_eq(engine, &node.engine) {
        return Ok(());
    }
    Err(Error::QueryEvaluation {
        expression: expression.to_string(),
        context: node.document().describe(node.id),
        source: confpath_xpath1::XPathError::TypeError(
            "context node belongs to a different parser".to_string(),
        ),
    })
}
