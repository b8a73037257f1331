//! Runs XPath expressions against one document.

use crate::document::{Document, NodeId, NodeRef};
use crate::error::{Error, Result};
use confpath_xpath1::{
    EvaluationContext, Expression, FunctionRegistry, XPathError, XPathValue, parse_expression,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// The shape a caller wants a result in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    String,
    Boolean,
    Number,
    Node,
    NodeSet,
}

/// A result already coerced to the requested [`ResultKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    String(String),
    Boolean(bool),
    Number(f64),
    /// The first selected node in document order, if any.
    Node(Option<NodeId>),
    /// Selected nodes in document order, without duplicates.
    NodeSet(Vec<NodeId>),
}

/// An XPath engine bound to a single document.
///
/// Expressions are compiled once and cached by their text. The cache has no
/// effect on results.
#[derive(Debug)]
pub struct QueryEvaluator {
    document: Arc<Document>,
    functions: FunctionRegistry,
    cache: RwLock<HashMap<String, Arc<Expression>>>,
}

impl QueryEvaluator {
    /// An evaluator with the XPath 1.0 core function library.
    pub fn new(document: Arc<Document>) -> Self {
        Self::with_functions(document, FunctionRegistry::default())
    }

    pub fn with_functions(document: Arc<Document>, functions: FunctionRegistry) -> Self {
        Self {
            document,
            functions,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// Evaluates `expression` with `context` as the context node, the document
    /// root when `None`, and coerces the value to `kind`.
    pub fn evaluate(
        &self,
        expression: &str,
        context: Option<NodeId>,
        kind: ResultKind,
    ) -> Result<RawResult> {
        let context = context.unwrap_or_else(|| self.document.root());
        let fail = |source: XPathError| Error::QueryEvaluation {
            expression: expression.to_string(),
            context: self.document.describe(context),
            source,
        };

        if !self.document.contains(context) {
            return Err(fail(XPathError::TypeError(
                "context node does not belong to this document".to_string(),
            )));
        }
        let compiled = self.compile(expression).map_err(fail)?;

        let doc: &Document = &self.document;
        let variables = HashMap::new();
        let e_ctx = EvaluationContext::new(
            doc.node(context),
            doc.node(doc.root()),
            &self.functions,
            &variables,
        );
        let value = confpath_xpath1::evaluate(&compiled, &e_ctx).map_err(fail)?;
        log::trace!(
            "Evaluated '{}' at {} to a {}",
            expression,
            doc.describe(context),
            value.type_name()
        );
        coerce(value, kind).map_err(fail)
    }

    /// Parses `expression` and checks that every function it calls is registered.
    pub fn compile(&self, expression: &str) -> Result<Arc<Expression>, XPathError> {
        if let Some(compiled) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(expression)
        {
            return Ok(Arc::clone(compiled));
        }

        let parsed = parse_expression(expression)?;
        let mut unknown = None;
        parsed.visit_function_calls(&mut |name, _| {
            if unknown.is_none() && !self.functions.contains(name) {
                unknown = Some(name.to_string());
            }
        });
        if let Some(name) = unknown {
            return Err(XPathError::UnknownFunction(name));
        }

        let compiled = Arc::new(parsed);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(expression.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }
}

fn coerce(value: XPathValue<NodeRef<'_>>, kind: ResultKind) -> Result<RawResult, XPathError> {
    let result = match kind {
        ResultKind::String => RawResult::String(value.to_string()),
        ResultKind::Boolean => RawResult::Boolean(value.to_bool()),
        ResultKind::Number => RawResult::Number(value.to_number()),
        ResultKind::Node => RawResult::Node(node_set(value)?.first().map(NodeRef::id)),
        ResultKind::NodeSet => {
            RawResult::NodeSet(node_set(value)?.iter().map(NodeRef::id).collect())
        }
    };
    Ok(result)
}

fn node_set(value: XPathValue<NodeRef<'_>>) -> Result<Vec<NodeRef<'_>>, XPathError> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        other => Err(XPathError::TypeError(format!(
            "expected a node-set, got a {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;

    const XML: &str = r#"<config>
  <settings>
    <setting name="cacheEnabled" value="true"/>
    <setting name="timeout" value="25"/>
  </settings>
  <mappers><mapper resource="a.xml"/><mapper resource="b.xml"/></mappers>
</config>"#;

    fn evaluator() -> QueryEvaluator {
        let document = DocumentBuilder::default().build(XML).unwrap();
        QueryEvaluator::new(document)
    }

    #[test]
    fn test_result_kinds() {
        let engine = evaluator();
        let eval = |expr: &str, kind| engine.evaluate(expr, None, kind).unwrap();

        assert_eq!(
            eval("/config/settings/setting[2]/@value", ResultKind::String),
            RawResult::String("25".into())
        );
        assert_eq!(
            eval("count(//mapper) = 2", ResultKind::Boolean),
            RawResult::Boolean(true)
        );
        assert_eq!(
            eval("//setting[@name='timeout']/@value * 2", ResultKind::Number),
            RawResult::Number(50.0)
        );
        assert!(matches!(
            eval("//mapper", ResultKind::Node),
            RawResult::Node(Some(_))
        ));
        assert_eq!(eval("//missing", ResultKind::Node), RawResult::Node(None));
        assert!(matches!(
            eval("//mapper", ResultKind::NodeSet),
            RawResult::NodeSet(ids) if ids.len() == 2 && ids[0] < ids[1]
        ));
    }

    #[test]
    fn test_number_and_string_conversions() {
        let engine = evaluator();
        let eval = |expr: &str, kind| engine.evaluate(expr, None, kind).unwrap();
        assert!(matches!(
            eval("/config/mappers/mapper/@resource", ResultKind::Number),
            RawResult::Number(n) if n.is_nan()
        ));
        assert_eq!(eval("1 div 0", ResultKind::String), RawResult::String("Infinity".into()));
        assert_eq!(eval("3.0", ResultKind::String), RawResult::String("3".into()));
        assert_eq!(eval("//nothing", ResultKind::String), RawResult::String("".into()));
    }

    #[test]
    fn test_relative_context() {
        let engine = evaluator();
        let RawResult::Node(Some(settings)) =
            engine.evaluate("/config/settings", None, ResultKind::Node).unwrap()
        else {
            panic!("settings not found");
        };
        let result = engine
            .evaluate("setting[1]/@name", Some(settings), ResultKind::String)
            .unwrap();
        assert_eq!(result, RawResult::String("cacheEnabled".into()));
        let result = engine
            .evaluate("count(../mappers/mapper)", Some(settings), ResultKind::Number)
            .unwrap();
        assert_eq!(result, RawResult::Number(2.0));
    }

    #[test]
    fn test_errors_carry_expression_and_context() {
        let engine = evaluator();
        let err = engine.evaluate("//setting[", None, ResultKind::String).unwrap_err();
        match err {
            Error::QueryEvaluation {
                expression,
                context,
                source,
            } => {
                assert_eq!(expression, "//setting[");
                assert_eq!(context, "the document root");
                assert!(matches!(source, XPathError::XPathParse(..)));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_node_kind_requires_node_set() {
        let engine = evaluator();
        let err = engine.evaluate("count(//mapper)", None, ResultKind::Node).unwrap_err();
        assert!(matches!(
            err,
            Error::QueryEvaluation {
                source: XPathError::TypeError(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_functions_fail_at_compile_time() {
        let engine = evaluator();
        let err = engine.compile("true() or upper-case('a')").unwrap_err();
        assert_eq!(err, XPathError::UnknownFunction("upper-case".into()));

        let document = engine.document().clone();
        let bare = QueryEvaluator::with_functions(document, FunctionRegistry::new());
        assert!(bare.compile("count(//a)").is_err());
        assert!(bare.compile("//a").is_ok());
    }

    #[test]
    fn test_variables_are_not_bound() {
        let engine = evaluator();
        let err = engine.evaluate("$x", None, ResultKind::String).unwrap_err();
        assert!(matches!(
            err,
            Error::QueryEvaluation {
                source: XPathError::UnknownVariable(_),
                ..
            }
        ));
    }

    #[test]
    fn test_repeated_evaluation_is_stable() {
        let engine = evaluator();
        let first = engine.evaluate("//mapper/@resource", None, ResultKind::NodeSet).unwrap();
        let second = engine.evaluate("//mapper/@resource", None, ResultKind::NodeSet).unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(
            &engine.compile("//mapper/@resource").unwrap(),
            &engine.compile("//mapper/@resource").unwrap()
        ));
    }
}
