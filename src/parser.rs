//! [`QueryParser`], the entry point: build a document once, then query it
//! with typed results.

use crate::builder::{DocumentBuilder, XmlSource};
use crate::document::Document;
use crate::error::{BuildCause, Error, Result};
use crate::evaluator::QueryEvaluator;
use crate::extract::Scope;
use crate::node::{TypedNode, ensure_same_engine};
use crate::policy::ParsePolicy;
use crate::resolver::EntityResolver;
use confpath_vars::{SharedVariables, Variables};
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;

/// A parsed document with its own XPath engine and variable table.
///
/// Clones share the document, the engine and the variable table.
///
/// ```
/// use confpath::QueryParser;
///
/// let parser: QueryParser = r#"<config><pool size="8"/></config>"#.parse()?;
/// assert_eq!(parser.eval_int("/config/pool/@size")?, 8);
/// # Ok::<(), confpath::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct QueryParser {
    engine: Arc<QueryEvaluator>,
    variables: SharedVariables,
}

impl FromStr for QueryParser {
    type Err = Error;

    /// Parses with the default policy and no variables.
    fn from_str(xml: &str) -> Result<Self> {
        Self::builder().build(xml)
    }
}

impl QueryParser {
    pub fn builder() -> QueryParserBuilder {
        QueryParserBuilder::default()
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::builder().build(XmlSource::Bytes(bytes.into()))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Self::builder().build_reader(reader)
    }

    /// Adopts an already built document.
    pub fn from_document(document: Arc<Document>) -> Self {
        Self::with_parts(document, None)
    }

    fn with_parts(document: Arc<Document>, variables: Option<Variables>) -> Self {
        Self {
            engine: Arc::new(QueryEvaluator::new(document)),
            variables: SharedVariables::new(variables),
        }
    }

    pub fn document(&self) -> &Arc<Document> {
        self.engine.document()
    }

    /// The current variable table.
    pub fn variables(&self) -> Option<Arc<Variables>> {
        self.variables.snapshot()
    }

    /// Replaces the variable table for this parser, its clones and every
    /// [`TypedNode`] produced from them.
    pub fn set_variables(&self, variables: Option<Variables>) {
        self.variables.replace(variables);
    }

    /// The root node of the document.
    pub fn root(&self) -> TypedNode {
        self.scope().wrap(self.document().root())
    }

    fn scope(&self) -> Scope<'_> {
        Scope {
            engine: &self.engine,
            variables: &self.variables,
            context: None,
        }
    }

    fn scope_at<'s>(&'s self, node: &TypedNode, expression: &str) -> Result<Scope<'s>> {
        ensure_same_engine(&self.engine, node, expression)?;
        Ok(Scope {
            context: Some(node.id()),
            ..self.scope()
        })
    }

    pub fn eval_string(&self, expression: &str) -> Result<String> {
        self.scope().string(expression)
    }

    pub fn eval_string_at(&self, node: &TypedNode, expression: &str) -> Result<String> {
        self.scope_at(node, expression)?.string(expression)
    }

    pub fn eval_bool(&self, expression: &str) -> Result<bool> {
        self.scope().boolean(expression)
    }

    pub fn eval_bool_at(&self, node: &TypedNode, expression: &str) -> Result<bool> {
        self.scope_at(node, expression)?.boolean(expression)
    }

    pub fn eval_short(&self, expression: &str) -> Result<i16> {
        self.scope().short(expression)
    }

    pub fn eval_short_at(&self, node: &TypedNode, expression: &str) -> Result<i16> {
        self.scope_at(node, expression)?.short(expression)
    }

    pub fn eval_int(&self, expression: &str) -> Result<i32> {
        self.scope().int(expression)
    }

    pub fn eval_int_at(&self, node: &TypedNode, expression: &str) -> Result<i32> {
        self.scope_at(node, expression)?.int(expression)
    }

    pub fn eval_long(&self, expression: &str) -> Result<i64> {
        self.scope().long(expression)
    }

    pub fn eval_long_at(&self, node: &TypedNode, expression: &str) -> Result<i64> {
        self.scope_at(node, expression)?.long(expression)
    }

    pub fn eval_float(&self, expression: &str) -> Result<f32> {
        self.scope().float(expression)
    }

    pub fn eval_float_at(&self, node: &TypedNode, expression: &str) -> Result<f32> {
        self.scope_at(node, expression)?.float(expression)
    }

    /// The XPath number value. Unlike the other numeric extractions this
    /// is never substituted.
    pub fn eval_double(&self, expression: &str) -> Result<f64> {
        self.scope().double(expression)
    }

    pub fn eval_double_at(&self, node: &TypedNode, expression: &str) -> Result<f64> {
        self.scope_at(node, expression)?.double(expression)
    }

    pub fn eval_node(&self, expression: &str) -> Result<Option<TypedNode>> {
        self.scope().node(expression)
    }

    pub fn eval_node_at(&self, node: &TypedNode, expression: &str) -> Result<Option<TypedNode>> {
        self.scope_at(node, expression)?.node(expression)
    }

    pub fn eval_nodes(&self, expression: &str) -> Result<Vec<TypedNode>> {
        self.scope().nodes(expression)
    }

    pub fn eval_nodes_at(&self, node: &TypedNode, expression: &str) -> Result<Vec<TypedNode>> {
        self.scope_at(node, expression)?.nodes(expression)
    }
}

/// Configures how a [`QueryParser`] builds its document.
#[derive(Debug, Clone, Default)]
pub struct QueryParserBuilder {
    policy: ParsePolicy,
    variables: Option<Variables>,
    resolver: Option<Arc<dyn EntityResolver>>,
}

impl QueryParserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate against the document's DTD.
    pub fn validation(mut self, validate: bool) -> Self {
        self.policy.validate = validate;
        self
    }

    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn entity_resolver(mut self, resolver: Arc<dyn EntityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replaces the whole policy, including any earlier [`validation`](Self::validation).
    pub fn policy(mut self, policy: ParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self, source: impl Into<XmlSource>) -> Result<QueryParser> {
        let mut builder = DocumentBuilder::new(self.policy);
        if let Some(resolver) = self.resolver {
            builder = builder.with_entity_resolver(resolver);
        }
        let document = builder.build(source)?;
        Ok(QueryParser::with_parts(document, self.variables))
    }

    pub fn build_reader(self, reader: impl Read) -> Result<QueryParser> {
        let source = XmlSource::from_reader(reader).map_err(BuildCause::from)?;
        self.build(source)
    }
}
