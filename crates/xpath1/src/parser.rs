//! A `nom`-based parser for the XPath 1.0 expression language.

use super::ast::*;
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};

// --- Main Public Parser ---

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(XPathError::XPathParse(
            input.to_string(),
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(XPathError::XPathParse(input.to_string(), e.to_string())),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// An operator name such as `div`, which must not run on into a longer name.
fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(satisfy(is_name_char)))
}

fn build_binary_expr_parser<'a, F, G>(
    sub_expr_parser: F,
    op_parser: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = sub_expr_parser.clone().parse(input)?;
        let (input, remainder) =
            many0(pair(ws(op_parser.clone()), sub_expr_parser.clone())).parse(input)?;

        for (op, right) in remainder {
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

// --- Expression Parsers (in order of precedence) ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("or"), |_| BinaryOperator::Or).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("and"), |_| BinaryOperator::And).parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(equality_expr, and_op)(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("="), |_| BinaryOperator::Equals),
        map(tag("!="), |_| BinaryOperator::NotEquals),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("<="), |_| BinaryOperator::LessThanOrEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('+'), |_| BinaryOperator::Plus),
        map(char('-'), |_| BinaryOperator::Minus),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('*'), |_| BinaryOperator::Multiply),
        map(keyword("div"), |_| BinaryOperator::Divide),
        map(keyword("mod"), |_| BinaryOperator::Modulo),
    ))
    .parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(char('|'), |_| BinaryOperator::Union).parse(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(relational_expr, equality_op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(additive_expr, relational_op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    if let Ok((i, _)) = ws(char::<&str, nom::error::Error<&str>>('-')).parse(input) {
        let (i, expr) = unary_expr(i)?;
        return Ok((
            i,
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            },
        ));
    }
    union_expr(input)
}

// The union operator `|` binds tighter than every other binary operator.
fn union_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(path_expr, union_op)(input)
}

/// Handles the ambiguity between location paths and primary expressions that
/// may be followed by predicates and further steps.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    // Primary expressions go first, otherwise `position()` would be taken as a
    // step named `position`.
    let (i, start_expr) = alt((
        filter_expr,
        map(ws(location_path), Expression::LocationPath),
    ))
    .parse(input)?;

    let (i, remainder_steps) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    if remainder_steps.is_empty() {
        return Ok((i, start_expr));
    }

    let (start_point, is_absolute, mut steps) = match start_expr {
        Expression::LocationPath(lp) => (lp.start_point, lp.is_absolute, lp.steps),
        other => (Some(Box::new(other)), false, vec![]),
    };
    push_steps(&mut steps, remainder_steps);

    let result = Expression::LocationPath(LocationPath {
        start_point,
        is_absolute,
        steps,
    });
    let (i, _) = multispace0(i)?;
    Ok((i, result))
}

fn push_steps(steps: &mut Vec<Step>, remainder: Vec<(&str, Step)>) {
    for (sep, next_step) in remainder {
        if sep == "//" {
            steps.push(Step::descendant_or_self());
        }
        steps.push(next_step);
    }
}

/// A primary expression with optional predicates, e.g. `(//item)[1]`.
fn filter_expr(input: &str) -> IResult<&str, Expression> {
    let (i, base) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    if predicates.is_empty() {
        return Ok((i, base));
    }
    Ok((
        i,
        Expression::Filter {
            base: Box::new(base),
            predicates,
        },
    ))
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        variable_reference,
        map(number, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))
    .parse(input)
}

// --- Literal Parsers ---

/// `Digits ('.' Digits?)? | '.' Digits`. No sign, no exponent.
fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        |s: &str| s.parse::<f64>(),
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), q_name), Expression::Variable).parse(input)
}

// --- Name and NodeTest Parsers ---

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_name_char),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(nc_name, opt(pair(tag(":"), nc_name)))),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

/// Node type tests, spelled as in an expression.
const NODE_TYPES: [(&str, NodeTypeTest); 4] = [
    ("text", NodeTypeTest::Text),
    ("node", NodeTypeTest::Node),
    ("comment", NodeTypeTest::Comment),
    ("processing-instruction", NodeTypeTest::ProcessingInstruction),
];

/// Axis names. Longer names come before their prefixes.
const AXES: [(&str, Axis); 12] = [
    ("child", Axis::Child),
    ("descendant-or-self", Axis::DescendantOrSelf),
    ("descendant", Axis::Descendant),
    ("attribute", Axis::Attribute),
    ("parent", Axis::Parent),
    ("ancestor-or-self", Axis::AncestorOrSelf),
    ("ancestor", Axis::Ancestor),
    ("self", Axis::SelfAxis),
    ("following-sibling", Axis::FollowingSibling),
    ("preceding-sibling", Axis::PrecedingSibling),
    ("following", Axis::Following),
    ("preceding", Axis::Preceding),
];

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    let (rest, name) = nc_name(input)?;
    let Some(&(_, node_type)) = NODE_TYPES.iter().find(|(n, _)| *n == name) else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    };
    let (rest, _) = pair(ws(char('(')), char(')')).parse(rest)?;
    Ok((rest, NodeTest::NodeType(node_type)))
}

pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(tag("*"), |_| NodeTest::Wildcard),
        node_type_test,
        map(q_name, NodeTest::Name),
    ))
    .parse(input)
}

// --- Path Parsers ---

fn axis(input: &str) -> IResult<&str, Axis> {
    for (name, axis) in AXES {
        if let Ok((rest, _)) =
            terminated(tag::<&str, &str, nom::error::Error<&str>>(name), tag("::")).parse(input)
        {
            return Ok((rest, axis));
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let any_node = || NodeTest::NodeType(NodeTypeTest::Node);
    let (i, (axis, node_test)) = alt((
        map(tag(".."), |_| (Axis::Parent, any_node())),
        map(tag("."), |_| (Axis::SelfAxis, any_node())),
        map(preceded(char('@'), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| {
            (ax.unwrap_or(Axis::Child), nt)
        }),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            axis,
            node_test,
            predicates,
        },
    ))
}

/// A path that does not start with a variable or function call.
fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (i, is_absolute, mut steps) = if let Ok((rem, _)) =
        tag::<&str, &str, nom::error::Error<&str>>("//").parse(input)
    {
        let (rem, first) = step(rem)?;
        (rem, true, vec![Step::descendant_or_self(), first])
    } else if let Ok((rem, _)) = tag::<&str, &str, nom::error::Error<&str>>("/").parse(input) {
        match step(rem) {
            Ok((rem, first)) => (rem, true, vec![first]),
            // A bare "/" selects the root.
            Err(_) => (rem, true, vec![]),
        }
    } else {
        let (rem, first) = step(input)?;
        (rem, false, vec![first])
    };

    // After the first step, subsequent steps must be preceded by / or //.
    let (i, remainder) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    push_steps(&mut steps, remainder);

    Ok((
        i,
        LocationPath {
            start_point: None,
            is_absolute,
            steps,
        },
    ))
}

// --- Function Call Parser ---

fn function_call(input: &str) -> IResult<&str, Expression> {
    // The lookahead for '(' keeps a step name like 'foo' in 'foo/bar' from
    // being read as a function.
    let (i, name) = q_name(input)?;
    let (i, _) = peek(ws(char('('))).parse(i)?;

    // Node-type tests like text() belong to the step parser.
    if NODE_TYPES.iter().any(|(n, _)| *n == name) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (i, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )
    .parse(i)?;

    Ok((i, Expression::FunctionCall { name, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(axis: Axis, name: &str) -> Step {
        Step {
            axis,
            node_test: NodeTest::Name(name.into()),
            predicates: vec![],
        }
    }

    fn relative(steps: Vec<Step>) -> Expression {
        Expression::LocationPath(LocationPath {
            start_point: None,
            is_absolute: false,
            steps,
        })
    }

    fn child(name: &str) -> Expression {
        relative(vec![named(Axis::Child, name)])
    }

    #[test]
    fn test_parse_simple_path() {
        let result = parse_expression("foo/bar").unwrap();
        assert_eq!(
            result,
            relative(vec![named(Axis::Child, "foo"), named(Axis::Child, "bar")])
        );
    }

    #[test]
    fn test_parse_absolute_paths() {
        let root = parse_expression("/").unwrap();
        assert_eq!(
            root,
            Expression::LocationPath(LocationPath {
                start_point: None,
                is_absolute: true,
                steps: vec![],
            })
        );

        let result = parse_expression("//foo").unwrap();
        assert_eq!(
            result,
            Expression::LocationPath(LocationPath {
                start_point: None,
                is_absolute: true,
                steps: vec![Step::descendant_or_self(), named(Axis::Child, "foo")],
            })
        );
    }

    #[test]
    fn test_parse_dotted_and_hyphenated_names() {
        let result = parse_expression("/configuration/type-aliases/type.alias").unwrap();
        if let Expression::LocationPath(lp) = result {
            assert_eq!(lp.steps[1], named(Axis::Child, "type-aliases"));
            assert_eq!(lp.steps[2], named(Axis::Child, "type.alias"));
        } else {
            panic!("Expected LocationPath");
        }
    }

    #[test]
    fn test_parse_names_that_start_like_numbers_or_keywords() {
        // Prefixes of "inf", "nan", "div", "or" must stay names.
        assert_eq!(parse_expression("info").unwrap(), child("info"));
        assert_eq!(parse_expression("nan").unwrap(), child("nan"));
        assert_eq!(parse_expression("division").unwrap(), child("division"));
        assert_eq!(
            parse_expression("a or order").unwrap(),
            Expression::BinaryOp {
                left: Box::new(child("a")),
                op: BinaryOperator::Or,
                right: Box::new(child("order")),
            }
        );
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_expression("42").unwrap(), Expression::Number(42.0));
        assert_eq!(parse_expression("3.25").unwrap(), Expression::Number(3.25));
        assert_eq!(parse_expression(".5").unwrap(), Expression::Number(0.5));
        assert!(parse_expression("1e3").is_err());
    }

    #[test]
    fn test_parse_unary_minus() {
        let result = parse_expression("-5").unwrap();
        assert_eq!(
            result,
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(Expression::Number(5.0))
            }
        );

        let result2 = parse_expression("10 - -5").unwrap();
        assert_eq!(
            result2,
            Expression::BinaryOp {
                left: Box::new(Expression::Number(10.0)),
                op: BinaryOperator::Minus,
                right: Box::new(result),
            }
        );
        assert!(parse_expression("--5").is_ok());
    }

    #[test]
    fn test_parse_axes() {
        let cases = [
            ("following-sibling::foo", Axis::FollowingSibling),
            ("preceding::*", Axis::Preceding),
            ("ancestor-or-self::node()", Axis::AncestorOrSelf),
            ("ancestor::x", Axis::Ancestor),
            ("self::x", Axis::SelfAxis),
        ];
        for (xpath, expected) in cases {
            match parse_expression(xpath).unwrap() {
                Expression::LocationPath(lp) => assert_eq!(lp.steps[0].axis, expected, "{}", xpath),
                other => panic!("Expected LocationPath for {}, got {:?}", xpath, other),
            }
        }
    }

    #[test]
    fn test_parse_abbreviated_steps() {
        let any_node = NodeTest::NodeType(NodeTypeTest::Node);
        match parse_expression("../item/.").unwrap() {
            Expression::LocationPath(lp) => {
                assert_eq!(lp.steps.len(), 3);
                assert_eq!(lp.steps[0].axis, Axis::Parent);
                assert_eq!(lp.steps[0].node_test, any_node);
                assert_eq!(lp.steps[2].axis, Axis::SelfAxis);
                assert_eq!(lp.steps[2].node_test, any_node);
            }
            other => panic!("Expected LocationPath, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_path_starting_with_variable() {
        let result = parse_expression("$myVar/foo/bar").unwrap();
        assert_eq!(
            result,
            Expression::LocationPath(LocationPath {
                start_point: Some(Box::new(Expression::Variable("myVar".to_string()))),
                is_absolute: false,
                steps: vec![named(Axis::Child, "foo"), named(Axis::Child, "bar")],
            })
        );
    }

    #[test]
    fn test_parse_filter_expression() {
        let result = parse_expression("(//item)[2]/@name").unwrap();
        let Expression::LocationPath(lp) = result else {
            panic!("Expected LocationPath");
        };
        assert_eq!(lp.steps, vec![named(Axis::Attribute, "name")]);
        match lp.start_point.as_deref() {
            Some(Expression::Filter { predicates, .. }) => {
                assert_eq!(predicates, &vec![Expression::Number(2.0)]);
            }
            other => panic!("Expected Filter start point, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_variable_reference() {
        let result = parse_expression("$myVar + 5").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(Expression::Variable("myVar".to_string())),
                op: BinaryOperator::Plus,
                right: Box::new(Expression::Number(5.0))
            }
        )
    }

    #[test]
    fn test_parse_predicate() {
        let result = parse_expression("foo[@id = 'a']").unwrap();
        let expected = Step {
            axis: Axis::Child,
            node_test: NodeTest::Name("foo".into()),
            predicates: vec![Expression::BinaryOp {
                left: Box::new(relative(vec![named(Axis::Attribute, "id")])),
                op: BinaryOperator::Equals,
                right: Box::new(Expression::Literal("a".into())),
            }],
        };
        assert_eq!(result, relative(vec![expected]));
    }

    #[test]
    fn test_parse_function_calls() {
        let result = parse_expression("para[position()=1]").unwrap();
        if let Expression::LocationPath(lp) = result {
            assert_eq!(lp.steps[0].predicates.len(), 1);
            assert!(lp.steps[0].predicates[0].is_binary_op());
        } else {
            panic!("Expected LocationPath");
        }

        let result = parse_expression("concat( name , 'x' )").unwrap();
        assert_eq!(
            result,
            Expression::FunctionCall {
                name: "concat".into(),
                args: vec![child("name"), Expression::Literal("x".into())],
            }
        );
    }

    #[test]
    fn test_parse_text_node_test() {
        let result = parse_expression("foo/text()").unwrap();
        if let Expression::LocationPath(lp) = result {
            assert_eq!(lp.steps.len(), 2);
            assert_eq!(
                lp.steps[1].node_test,
                NodeTest::NodeType(NodeTypeTest::Text)
            );
        } else {
            panic!("Expected location path");
        }
    }

    #[test]
    fn test_parse_operator_precedence() {
        let result = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(Expression::Number(1.0)),
                op: BinaryOperator::Plus,
                right: Box::new(Expression::BinaryOp {
                    left: Box::new(Expression::Number(2.0)),
                    op: BinaryOperator::Multiply,
                    right: Box::new(Expression::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_boolean_logic() {
        let eq = |l: &str, r: &str| Expression::BinaryOp {
            left: Box::new(child(l)),
            op: BinaryOperator::Equals,
            right: Box::new(child(r)),
        };
        let result = parse_expression("a = b or c = d and e = f").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(eq("a", "b")),
                op: BinaryOperator::Or,
                right: Box::new(Expression::BinaryOp {
                    left: Box::new(eq("c", "d")),
                    op: BinaryOperator::And,
                    right: Box::new(eq("e", "f")),
                }),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_expression("foo["),
            Err(XPathError::XPathParse(..))
        ));
        assert!(parse_expression("foo bar").is_err());
        assert!(parse_expression("").is_err());
    }
}
