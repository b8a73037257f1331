//! Binary operators: comparisons, arithmetic and union.
//!
//! Comparisons involving a node-set are existential: `//a = 'x'` is true when
//! any selected node has the string value `x`.

use crate::ast::BinaryOperator;
use crate::datasource::DataSourceNode;
use crate::engine::{XPathValue, string_to_number};
use crate::error::XPathError;

pub fn evaluate<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    let value = match op {
        BinaryOperator::Or => XPathValue::Boolean(left.to_bool() || right.to_bool()),
        BinaryOperator::And => XPathValue::Boolean(left.to_bool() && right.to_bool()),
        BinaryOperator::Equals => XPathValue::Boolean(equality(&left, &right, false)),
        BinaryOperator::NotEquals => XPathValue::Boolean(equality(&left, &right, true)),
        BinaryOperator::LessThan => XPathValue::Boolean(relational(&left, &right, |a, b| a < b)),
        BinaryOperator::LessThanOrEqual => {
            XPathValue::Boolean(relational(&left, &right, |a, b| a <= b))
        }
        BinaryOperator::GreaterThan => {
            XPathValue::Boolean(relational(&left, &right, |a, b| a > b))
        }
        BinaryOperator::GreaterThanOrEqual => {
            XPathValue::Boolean(relational(&left, &right, |a, b| a >= b))
        }
        BinaryOperator::Plus => XPathValue::Number(left.to_number() + right.to_number()),
        BinaryOperator::Minus => XPathValue::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => XPathValue::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => XPathValue::Number(left.to_number() / right.to_number()),
        // Truncating remainder, same sign as the dividend.
        BinaryOperator::Modulo => XPathValue::Number(left.to_number() % right.to_number()),
        BinaryOperator::Union => union(left, right)?,
    };
    Ok(value)
}

fn union<'a, N: DataSourceNode<'a>>(
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match (left, right) {
        (XPathValue::NodeSet(mut l), XPathValue::NodeSet(r)) => {
            l.extend(r);
            l.sort_unstable();
            l.dedup();
            Ok(XPathValue::NodeSet(l))
        }
        (l, r) => Err(XPathError::TypeError(format!(
            "union operands must be node-sets, got a {} and a {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

/// `=` and `!=` following the XPath 1.0 conversion order.
fn equality<'a, N: DataSourceNode<'a>>(
    left: &XPathValue<N>,
    right: &XPathValue<N>,
    negate: bool,
) -> bool {
    let strings = |a: &str, b: &str| (a == b) != negate;
    let numbers = |a: f64, b: f64| (a == b) != negate;
    let bools = |a: bool, b: bool| (a == b) != negate;

    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_values: Vec<String> = r.iter().map(|n| n.string_value()).collect();
            l.iter().any(|a| {
                let a = a.string_value();
                right_values.iter().any(|b| strings(&a, b))
            })
        }
        (XPathValue::NodeSet(nodes), other) | (other, XPathValue::NodeSet(nodes)) => match other {
            XPathValue::Number(n) => nodes
                .iter()
                .any(|a| numbers(string_to_number(&a.string_value()), *n)),
            XPathValue::Boolean(b) => bools(!nodes.is_empty(), *b),
            other => {
                let s = other.to_string();
                nodes.iter().any(|a| strings(&a.string_value(), &s))
            }
        },
        (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
            bools(left.to_bool(), right.to_bool())
        }
        (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
            numbers(left.to_number(), right.to_number())
        }
        _ => strings(&left.to_string(), &right.to_string()),
    }
}

/// `<`, `<=`, `>` and `>=`, which always compare numbers.
fn relational<'a, N: DataSourceNode<'a>>(
    left: &XPathValue<N>,
    right: &XPathValue<N>,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    let node_number = |n: &N| string_to_number(&n.string_value());
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_values: Vec<f64> = r.iter().map(node_number).collect();
            l.iter()
                .any(|a| right_values.iter().any(|&b| cmp(node_number(a), b)))
        }
        (XPathValue::NodeSet(l), XPathValue::Boolean(b)) => {
            cmp(bool_number(!l.is_empty()), bool_number(*b))
        }
        (XPathValue::Boolean(b), XPathValue::NodeSet(r)) => {
            cmp(bool_number(*b), bool_number(!r.is_empty()))
        }
        (XPathValue::NodeSet(l), other) => {
            let b = other.to_number();
            l.iter().any(|a| cmp(node_number(a), b))
        }
        (other, XPathValue::NodeSet(r)) => {
            let a = other.to_number();
            r.iter().any(|b| cmp(a, node_number(b)))
        }
        _ => cmp(left.to_number(), right.to_number()),
    }
}

fn bool_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}
