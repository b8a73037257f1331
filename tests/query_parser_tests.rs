mod common;

use common::{TestResult, configuration_parser, datasource_variables, init_logging};
use confpath::{Error, QueryParser, Variables};
use confpath_xpath1::XPathError;
use std::io::Write;
use std::thread;

const FETCH_SIZE: &str = "/configuration/settings/setting[@name='defaultFetchSize']/@value";
const TIMEOUT: &str = "/configuration/settings/setting[@name='defaultStatementTimeout']/@value";
const LOAD_FACTOR: &str = "/configuration/settings/setting[@name='loadFactor']/@value";

#[test]
fn test_missing_nodes() -> TestResult {
    init_logging();
    let parser = configuration_parser(None)?;

    assert!(parser.eval_node("/missing")?.is_none());
    assert!(parser.eval_nodes("/missing")?.is_empty());
    assert_eq!(parser.eval_string("/missing")?, "");
    assert!(!parser.eval_bool("/missing")?);
    assert!(parser.eval_double("/missing")?.is_nan());
    Ok(())
}

#[test]
fn test_integer_extraction_substitutes_first() -> TestResult {
    init_logging();
    let parser = configuration_parser(Some(Variables::from_iter([("pool.max", "42")])))?;
    assert_eq!(parser.eval_int(FETCH_SIZE)?, 42);
    assert_eq!(parser.eval_short(FETCH_SIZE)?, 42);
    assert_eq!(parser.eval_long(FETCH_SIZE)?, 42);

    let bare = configuration_parser(None)?;
    match bare.eval_int(FETCH_SIZE) {
        Err(Error::NumberFormat { input, target, .. }) => {
            assert_eq!(input, "${pool.max}");
            assert_eq!(target, "i32");
        }
        other => panic!("expected a number format error, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_double_is_never_substituted() -> TestResult {
    init_logging();
    let parser = configuration_parser(Some(datasource_variables()))?;

    assert_eq!(parser.eval_int(FETCH_SIZE)?, 20);
    assert!(parser.eval_double(FETCH_SIZE)?.is_nan());
    assert_eq!(parser.eval_double(TIMEOUT)?, 25.0);
    assert_eq!(parser.eval_double(&format!("{} * 2", TIMEOUT))?, 50.0);
    Ok(())
}

#[test]
fn test_float_extraction() -> TestResult {
    init_logging();
    let parser = configuration_parser(None)?;
    assert_eq!(parser.eval_float(LOAD_FACTOR)?, 0.75);
    assert_eq!(parser.eval_float(TIMEOUT)?, 25.0);
    // XPath cannot read the suffixed literal.
    assert!(parser.eval_double(LOAD_FACTOR)?.is_nan());
    assert!(matches!(
        parser.eval_float("/configuration/mappers/mapper/@resource"),
        Err(Error::NumberFormat { target: "f32", .. })
    ));
    Ok(())
}

#[test]
fn test_integer_range_is_checked() -> TestResult {
    init_logging();
    let vars = Variables::from_iter([("pool.max", "70000")]);
    let parser = configuration_parser(Some(vars))?;
    assert_eq!(parser.eval_int(FETCH_SIZE)?, 70000);
    assert!(matches!(
        parser.eval_short(FETCH_SIZE),
        Err(Error::NumberFormat { target: "i16", .. })
    ));
    Ok(())
}

#[test]
fn test_string_and_boolean_extraction() -> TestResult {
    init_logging();
    let parser = configuration_parser(Some(datasource_variables()))?;

    assert_eq!(
        parser.eval_string("/configuration/properties/property[@name='driver']/@value")?,
        "org.h2.Driver"
    );
    assert_eq!(
        parser.eval_string("concat(//environments/@default, '-', count(//environment))")?,
        "development-2"
    );
    assert!(parser.eval_bool("//setting[@name='cacheEnabled']/@value = 'true'")?);
    assert!(parser.eval_bool("//dataSource[@type='POOLED']")?);
    assert!(!parser.eval_bool("//dataSource[@type='JNDI']")?);
    Ok(())
}

#[test]
fn test_node_lists_are_in_document_order() -> TestResult {
    init_logging();
    let parser = configuration_parser(None)?;

    let mappers = parser.eval_nodes("//mapper | /configuration/mappers/mapper[1]")?;
    let resources: Vec<_> = mappers
        .iter()
        .filter_map(|m| m.string_attribute("resource"))
        .collect();
    assert_eq!(
        resources,
        vec!["org/example/BlogMapper.xml", "org/example/AuthorMapper.xml"]
    );

    let reversed = parser.eval_nodes("//environment[@id='test'] | //environment[@id='development']")?;
    assert_eq!(reversed[0].string_attribute("id").as_deref(), Some("development"));
    Ok(())
}

#[test]
fn test_dropped_comments_do_not_split_text() -> TestResult {
    init_logging();
    let parser: QueryParser = "<a>x<!--c-->y</a>".parse()?;
    assert_eq!(parser.eval_string("/a/text()")?, "xy");
    assert_eq!(parser.eval_double("count(/a/text())")?, 1.0);

    let a = parser.eval_node("/a")?.ok_or("a missing")?;
    assert_eq!(a.string_body().as_deref(), Some("xy"));
    Ok(())
}

#[test]
fn test_cdata_sections_stay_separate_text_nodes() -> TestResult {
    init_logging();
    let parser: QueryParser = "<a>x<![CDATA[y]]></a>".parse()?;
    assert_eq!(parser.eval_double("count(/a/text())")?, 2.0);
    assert_eq!(parser.eval_string("/a/text()[2]")?, "y");
    assert_eq!(parser.eval_string("/a")?, "xy");

    let a = parser.eval_node("/a")?.ok_or("a missing")?;
    assert_eq!(a.string_body().as_deref(), Some("x"));
    Ok(())
}

#[test]
fn test_undeclared_prefixes_are_plain_names() -> TestResult {
    init_logging();
    let parser: QueryParser = r#"<a:b c:d="1"><e:f>v</e:f></a:b>"#.parse()?;
    assert_eq!(parser.eval_string("name(/*)")?, "a:b");
    assert_eq!(parser.eval_string("local-name(/*)")?, "b");
    assert_eq!(parser.eval_int("/a:b/@c:d")?, 1);
    assert_eq!(parser.eval_string("/a:b/e:f")?, "v");

    let root = parser.eval_node("/*")?.ok_or("root missing")?;
    assert_eq!(root.name(), Some("a:b"));
    assert_eq!(root.string_attribute("c:d").as_deref(), Some("1"));
    Ok(())
}

#[test]
fn test_repeated_queries_agree() -> TestResult {
    init_logging();
    let parser = configuration_parser(Some(datasource_variables()))?;
    let expression = "//dataSource/property/@value";

    assert_eq!(parser.eval_string(expression)?, parser.eval_string(expression)?);
    assert_eq!(parser.eval_nodes(expression)?, parser.eval_nodes(expression)?);
    assert_eq!(parser.eval_node(expression)?, parser.eval_node(expression)?);
    Ok(())
}

#[test]
fn test_replaced_variables_reach_existing_nodes() -> TestResult {
    init_logging();
    let parser = configuration_parser(None)?;
    let pooled = parser
        .eval_node("//dataSource[@type='POOLED']")?
        .ok_or("pooled data source missing")?;
    let properties = pooled.eval_nodes("property")?;

    assert_eq!(properties[0].string_attribute("value").as_deref(), Some("${driver}"));

    parser.set_variables(Some(datasource_variables()));
    assert_eq!(
        properties[0].string_attribute("value").as_deref(),
        Some("org.h2.Driver")
    );
    assert_eq!(pooled.eval_int("property[3]/@value")?, 20);
    assert_eq!(parser.variables().map(|v| v.len()), Some(4));

    parser.set_variables(None);
    assert_eq!(pooled.children_as_variables().get("username"), Some("${username}"));
    Ok(())
}

#[test]
fn test_default_values_in_placeholders() -> TestResult {
    init_logging();
    let mut vars = Variables::from_iter([("username", "sa")]);
    vars.insert(confpath_vars::ENABLE_DEFAULT_VALUE_KEY, "true");
    let parser = QueryParser::builder()
        .variables(vars)
        .build(r#"<db user="${username:admin}" pool="${pool.max:10}"/>"#)?;

    assert_eq!(parser.eval_string("/db/@user")?, "sa");
    assert_eq!(parser.eval_int("/db/@pool")?, 10);
    Ok(())
}

#[test]
fn test_at_forms_and_foreign_nodes() -> TestResult {
    init_logging();
    let parser = configuration_parser(Some(datasource_variables()))?;
    let other = configuration_parser(Some(datasource_variables()))?;

    let env = parser
        .eval_node("//environment[@id='development']")?
        .ok_or("environment missing")?;
    assert_eq!(parser.eval_string_at(&env, "dataSource/@type")?, "POOLED");
    assert_eq!(parser.eval_int_at(&env, "dataSource/property[3]/@value")?, 20);
    assert_eq!(parser.eval_nodes_at(&env, "dataSource/property")?.len(), 3);

    match other.eval_string_at(&env, "dataSource/@type") {
        Err(Error::QueryEvaluation {
            expression,
            context,
            source: XPathError::TypeError(_),
        }) => {
            assert_eq!(expression, "dataSource/@type");
            assert!(context.contains("environment"), "context was {}", context);
        }
        other => panic!("expected a query error, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_query_errors_carry_the_expression() -> TestResult {
    init_logging();
    let parser = configuration_parser(None)?;

    fn is_parse(e: &XPathError) -> bool {
        matches!(e, XPathError::XPathParse(..))
    }
    fn is_unknown_function(e: &XPathError) -> bool {
        matches!(e, XPathError::UnknownFunction(_))
    }
    fn is_type(e: &XPathError) -> bool {
        matches!(e, XPathError::TypeError(_))
    }

    let cases: [(&str, fn(&XPathError) -> bool); 3] = [
        ("//setting[", is_parse),
        ("upper-case('x')", is_unknown_function),
        ("count(//mapper)", is_type),
    ];
    for (expression, check) in cases {
        match parser.eval_node(expression) {
            Err(Error::QueryEvaluation {
                expression: reported,
                source,
                ..
            }) => {
                assert_eq!(reported, expression);
                assert!(check(&source), "unexpected cause {:?}", source);
            }
            other => panic!("expected a query error for {}, got {:?}", expression, other),
        }
    }
    Ok(())
}

#[test]
fn test_from_reader_with_a_file() -> TestResult {
    init_logging();
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(common::fixtures::CONFIGURATION.as_bytes())?;

    let parser = QueryParser::from_reader(std::fs::File::open(file.path())?)?;
    assert_eq!(parser.eval_nodes("//setting")?.len(), 4);
    Ok(())
}

#[test]
fn test_parser_is_shared_across_threads() -> TestResult {
    init_logging();
    let parser = configuration_parser(Some(datasource_variables()))?;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let parser = parser.clone();
            thread::spawn(move || {
                let expression = format!("count(//property) + {}", i);
                parser.eval_double(&expression)
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let count = handle.join().map_err(|_| "worker panicked")??;
        assert_eq!(count, 6.0 + i as f64);
    }
    Ok(())
}
