//! Defines the registry and built-in implementations for XPath 1.0 functions.

use super::engine::{EvaluationContext, XPathValue, string_to_number};
use crate::datasource::{DataSourceNode, NodeType};
use crate::error::XPathError;
use std::collections::HashSet;

const CORE_FUNCTIONS: &[&str] = &[
    // Node-set
    "last",
    "position",
    "count",
    "id",
    "local-name",
    "name",
    // String
    "string",
    "concat",
    "starts-with",
    "contains",
    "substring-before",
    "substring-after",
    "substring",
    "string-length",
    "normalize-space",
    "translate",
    // Boolean
    "boolean",
    "not",
    "true",
    "false",
    "lang",
    // Number
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
];

/// The set of function names an expression may call.
///
/// Expressions are checked against the registry when they are compiled, so an
/// unknown name fails before any evaluation happens.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashSet<&'static str>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            functions: HashSet::new(),
        }
    }

    pub fn register(&mut self, name: &'static str) {
        self.functions.insert(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    /// The XPath 1.0 core function library.
    fn default() -> Self {
        let mut registry = Self::new();
        for name in CORE_FUNCTIONS {
            registry.register(*name);
        }
        registry
    }
}

/// Dispatches a function call to the correct implementation.
pub fn evaluate_function<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    if !e_ctx.functions.contains(name) {
        return Err(XPathError::UnknownFunction(name.to_string()));
    }
    match name {
        // Node-set
        "last" => {
            no_args(name, &args)?;
            Ok(XPathValue::Number(e_ctx.context_size as f64))
        }
        "position" => {
            no_args(name, &args)?;
            Ok(XPathValue::Number(e_ctx.context_position as f64))
        }
        "count" => func_count(args),
        "id" => func_id(args, e_ctx),
        "local-name" => func_local_name(args, e_ctx),
        "name" => func_name(args, e_ctx),

        // String
        "string" => {
            let s = optional_arg(name, args, e_ctx)?.to_string();
            Ok(XPathValue::String(s))
        }
        "concat" => func_concat(args),
        "starts-with" => {
            let [s1, s2] = string_args::<_, 2>(name, args)?;
            Ok(XPathValue::Boolean(s1.starts_with(&s2)))
        }
        "contains" => {
            let [s1, s2] = string_args::<_, 2>(name, args)?;
            Ok(XPathValue::Boolean(s1.contains(&s2)))
        }
        "substring-before" => {
            let [s1, s2] = string_args::<_, 2>(name, args)?;
            let before = s1.find(&s2).map(|i| &s1[..i]).unwrap_or_default();
            Ok(XPathValue::String(before.to_string()))
        }
        "substring-after" => {
            let [s1, s2] = string_args::<_, 2>(name, args)?;
            let after = s1.find(&s2).map(|i| &s1[i + s2.len()..]).unwrap_or_default();
            Ok(XPathValue::String(after.to_string()))
        }
        "substring" => func_substring(args),
        "string-length" => {
            let s = optional_arg(name, args, e_ctx)?.to_string();
            Ok(XPathValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            let s = optional_arg(name, args, e_ctx)?.to_string();
            Ok(XPathValue::String(
                s.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => {
            let [source, from, to] = string_args::<_, 3>(name, args)?;
            Ok(XPathValue::String(translate(&source, &from, &to)))
        }

        // Boolean
        "boolean" => {
            let [value] = exact_args::<_, 1>(name, args)?;
            Ok(XPathValue::Boolean(value.to_bool()))
        }
        "not" => {
            let [value] = exact_args::<_, 1>(name, args)?;
            Ok(XPathValue::Boolean(!value.to_bool()))
        }
        "true" => {
            no_args(name, &args)?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            no_args(name, &args)?;
            Ok(XPathValue::Boolean(false))
        }
        "lang" => func_lang(args, e_ctx),

        // Number
        "number" => Ok(XPathValue::Number(
            optional_arg(name, args, e_ctx)?.to_number(),
        )),
        "sum" => func_sum(args),
        "floor" => {
            let [value] = exact_args::<_, 1>(name, args)?;
            Ok(XPathValue::Number(value.to_number().floor()))
        }
        "ceiling" => {
            let [value] = exact_args::<_, 1>(name, args)?;
            Ok(XPathValue::Number(value.to_number().ceil()))
        }
        "round" => {
            let [value] = exact_args::<_, 1>(name, args)?;
            Ok(XPathValue::Number(round(value.to_number())))
        }
        _ => Err(XPathError::FunctionError {
            function: name.to_string(),
            message: "Registered but has no implementation".to_string(),
        }),
    }
}

// --- Argument helpers ---

fn no_args<N>(name: &str, args: &[XPathValue<N>]) -> Result<(), XPathError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(XPathError::arity(name, "0 arguments"))
    }
}

fn exact_args<N, const K: usize>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<[XPathValue<N>; K], XPathError> {
    args.try_into().map_err(|_| {
        let expected = if K == 1 {
            "1 argument".to_string()
        } else {
            format!("{} arguments", K)
        };
        XPathError::arity(name, &expected)
    })
}

fn string_args<'a, N: DataSourceNode<'a>, const K: usize>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<[String; K], XPathError> {
    Ok(exact_args::<N, K>(name, args)?.map(|v| v.to_string()))
}

/// The single argument, or the context node as a node-set when omitted.
fn optional_arg<'a, N: DataSourceNode<'a>>(
    name: &str,
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    match args.len() {
        0 => Ok(XPathValue::NodeSet(vec![e_ctx.context_node])),
        1 => Ok(args.remove(0)),
        _ => Err(XPathError::arity(name, "0 or 1 arguments")),
    }
}

/// The first node of an optional node-set argument.
fn optional_node<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Option<N>, XPathError> {
    match optional_arg(name, args, e_ctx)? {
        XPathValue::NodeSet(nodes) => Ok(nodes.first().copied()),
        v => Err(XPathError::TypeError(format!(
            "{}() argument must be a node-set, got a {}",
            name,
            v.type_name()
        ))),
    }
}

// --- Node-Set Functions ---

fn func_count<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    match exact_args::<_, 1>("count", args)? {
        [XPathValue::NodeSet(nodes)] => Ok(XPathValue::Number(nodes.len() as f64)),
        [v] => Err(XPathError::TypeError(format!(
            "count() argument must be a node-set, got a {}",
            v.type_name()
        ))),
    }
}

/// Elements whose `id` or `xml:id` attribute matches one of the
/// whitespace-separated tokens in the argument.
fn func_id<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let [arg] = exact_args::<_, 1>("id", args)?;
    let id_string = match arg {
        XPathValue::NodeSet(nodes) => nodes
            .iter()
            .map(|n| n.string_value())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    };
    let ids_to_find: HashSet<_> = id_string.split_whitespace().collect();
    if ids_to_find.is_empty() {
        return Ok(XPathValue::NodeSet(vec![]));
    }

    let mut results = Vec::new();
    let mut stack = e_ctx.root_node.children().collect::<Vec<_>>();
    while let Some(node) = stack.pop() {
        if node.node_type() == NodeType::Element {
            let matched = node.attributes().any(|attr| {
                attr.name().is_some_and(|q| {
                    (q.prefix == Some("xml") || q.prefix.is_none()) && q.local_part == "id"
                }) && ids_to_find.contains(attr.string_value().as_str())
            });
            if matched {
                results.push(node);
            }
        }
        stack.extend(node.children());
    }

    results.sort_unstable();
    Ok(XPathValue::NodeSet(results))
}

fn func_local_name<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let name = optional_node("local-name", args, e_ctx)?
        .and_then(|n| n.name().map(|q| q.local_part.to_string()))
        .unwrap_or_default();
    Ok(XPathValue::String(name))
}

fn func_name<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let name = optional_node("name", args, e_ctx)?
        .and_then(|n| n.name().map(|q| q.to_string()))
        .unwrap_or_default();
    Ok(XPathValue::String(name))
}

// --- String Functions ---

fn func_concat<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    if args.len() < 2 {
        return Err(XPathError::arity("concat", "at least 2 arguments"));
    }
    let result = args.iter().map(|v| v.to_string()).collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_substring<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    if !(2..=3).contains(&args.len()) {
        return Err(XPathError::arity("substring", "2 or 3 arguments"));
    }
    let length_val = if args.len() == 3 {
        Some(args.remove(2).to_number())
    } else {
        None
    };
    let start_val = args.remove(1).to_number();
    let s = args.remove(0).to_string();

    // Positions are 1-based and compared after rounding, so NaN selects nothing.
    let first = round(start_val);
    let last = length_val.map_or(f64::INFINITY, |l| first + round(l));

    let result = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64;
            (pos >= first && pos < last).then_some(c)
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn translate(source: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    source
        .chars()
        .filter_map(|c| match from.iter().position(|&fc| fc == c) {
            Some(pos) => to.get(pos).copied(),
            None => Some(c),
        })
        .collect()
}

// --- Boolean Functions ---

fn func_lang<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let [test_lang] = string_args::<_, 1>("lang", args)?;
    let test_lang = test_lang.to_lowercase();
    let mut current = Some(e_ctx.context_node);

    // If context node is not an element, start with its parent.
    if current.is_some_and(|n| n.node_type() != NodeType::Element) {
        current = current.and_then(|n| n.parent());
    }

    while let Some(node) = current {
        let lang_attr = node
            .attributes()
            .find(|attr| attr.name().is_some_and(|q| q.matches("xml:lang")));
        if let Some(attr) = lang_attr {
            // The nearest xml:lang decides; "en" matches "en-GB".
            let node_lang = attr.string_value().to_lowercase();
            let matched = node_lang == test_lang
                || node_lang
                    .strip_prefix(test_lang.as_str())
                    .is_some_and(|rest| rest.starts_with('-'));
            return Ok(XPathValue::Boolean(matched));
        }
        current = node.parent();
    }
    Ok(XPathValue::Boolean(false))
}

// --- Number Functions ---

fn func_sum<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    match exact_args::<_, 1>("sum", args)? {
        [XPathValue::NodeSet(nodes)] => Ok(XPathValue::Number(
            nodes
                .iter()
                .map(|node| string_to_number(&node.string_value()))
                .sum(),
        )),
        [v] => Err(XPathError::TypeError(format!(
            "sum() argument must be a node-set, got a {}",
            v.type_name()
        ))),
    }
}

/// XPath `round()`: halves go towards positive infinity.
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        return n;
    }
    (n + 0.5).floor()
}
