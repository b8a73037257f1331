//! Typed extraction shared by [`QueryParser`](crate::QueryParser) and
//! [`TypedNode`].
//!
//! String-based extractions (`string`, the integer types and `f32`) pass the
//! text through placeholder substitution before anything else. `boolean`,
//! `f64` and node results never do.

use crate::document::NodeId;
use crate::error::{Error, Result};
use crate::evaluator::{QueryEvaluator, RawResult, ResultKind};
use crate::node::TypedNode;
use confpath_vars::SharedVariables;
use confpath_xpath1::XPathError;
use std::str::FromStr;
use std::sync::Arc;

/// An engine, its variables and the node expressions start from.
#[derive(Clone, Copy)]
pub(crate) struct Scope<'s> {
    pub(crate) engine: &'s Arc<QueryEvaluator>,
    pub(crate) variables: &'s SharedVariables,
    /// The document root when `None`.
    pub(crate) context: Option<NodeId>,
}

impl Scope<'_> {
    fn evaluate<T>(
        &self,
        expression: &str,
        kind: ResultKind,
        pick: fn(RawResult) -> Option<T>,
    ) -> Result<T> {
        let raw = self.engine.evaluate(expression, self.context, kind)?;
        pick(raw).ok_or_else(|| {
            let document = self.engine.document();
            Error::QueryEvaluation {
                expression: expression.to_string(),
                context: document.describe(self.context.unwrap_or_else(|| document.root())),
                source: XPathError::TypeError(format!("expected a {:?} result", kind)),
            }
        })
    }

    pub(crate) fn string(&self, expression: &str) -> Result<String> {
        let raw = self.evaluate(expression, ResultKind::String, |raw| match raw {
            RawResult::String(s) => Some(s),
            _ => None,
        })?;
        Ok(self.variables.substitute(&raw))
    }

    pub(crate) fn boolean(&self, expression: &str) -> Result<bool> {
        self.evaluate(expression, ResultKind::Boolean, |raw| match raw {
            RawResult::Boolean(b) => Some(b),
            _ => None,
        })
    }

    pub(crate) fn short(&self, expression: &str) -> Result<i16> {
        parse_integer(&self.string(expression)?, "i16")
    }

    pub(crate) fn int(&self, expression: &str) -> Result<i32> {
        parse_integer(&self.string(expression)?, "i32")
    }

    pub(crate) fn long(&self, expression: &str) -> Result<i64> {
        parse_integer(&self.string(expression)?, "i64")
    }

    pub(crate) fn float(&self, expression: &str) -> Result<f32> {
        parse_float(&self.string(expression)?)
    }

    pub(crate) fn double(&self, expression: &str) -> Result<f64> {
        self.evaluate(expression, ResultKind::Number, |raw| match raw {
            RawResult::Number(n) => Some(n),
            _ => None,
        })
    }

    pub(crate) fn node(&self, expression: &str) -> Result<Option<TypedNode>> {
        let id = self.evaluate(expression, ResultKind::Node, |raw| match raw {
            RawResult::Node(id) => Some(id),
            _ => None,
        })?;
        Ok(id.map(|id| self.wrap(id)))
    }

    pub(crate) fn nodes(&self, expression: &str) -> Result<Vec<TypedNode>> {
        let ids = self.evaluate(expression, ResultKind::NodeSet, |raw| match raw {
            RawResult::NodeSet(ids) => Some(ids),
            _ => None,
        })?;
        Ok(ids.into_iter().map(|id| self.wrap(id)).collect())
    }

    pub(crate) fn wrap(&self, id: NodeId) -> TypedNode {
        TypedNode::new(id, Arc::clone(self.engine), self.variables.clone())
    }
}

/// Exact integer parsing: an optional sign and decimal digits, nothing else.
pub(crate) fn parse_integer<T>(input: &str, target: &'static str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    input.parse().map_err(|e: T::Err| Error::NumberFormat {
        input: input.to_string(),
        target,
        reason: e.to_string(),
    })
}

/// Float parsing that tolerates surrounding whitespace and control
/// characters, `NaN`, `Infinity`, exponents and a trailing `f`, `F`, `d` or
/// `D` type suffix.
pub(crate) fn parse_float(input: &str) -> Result<f32> {
    let fail = |reason: String| Error::NumberFormat {
        input: input.to_string(),
        target: "f32",
        reason,
    };

    let trimmed = input.trim_matches(|c: char| c <= ' ');
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if unsigned.starts_with(['+', '-']) {
        return Err(fail("more than one sign".to_string()));
    }
    let magnitude = match unsigned {
        "NaN" => f32::NAN,
        "Infinity" => f32::INFINITY,
        _ => {
            let body = unsigned
                .strip_suffix(['f', 'F', 'd', 'D'])
                .unwrap_or(unsigned);
            let well_formed = body.bytes().any(|b| b.is_ascii_digit())
                && body
                    .bytes()
                    .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
            if !well_formed {
                return Err(fail("not a decimal number".to_string()));
            }
            body.parse::<f32>().map_err(|e| fail(e.to_string()))?
        }
    };
    Ok(if negative { -magnitude } else { magnitude })
}
