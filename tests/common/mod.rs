pub mod fixtures;

use confpath::{QueryParser, Variables};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A parser over [`fixtures::CONFIGURATION`] with the given variables.
pub fn configuration_parser(variables: Option<Variables>) -> confpath::Result<QueryParser> {
    let mut builder = QueryParser::builder();
    if let Some(variables) = variables {
        builder = builder.variables(variables);
    }
    builder.build(fixtures::CONFIGURATION)
}

/// The variables [`fixtures::CONFIGURATION`] expects.
pub fn datasource_variables() -> Variables {
    Variables::from_iter([
        ("driver", "org.h2.Driver"),
        ("url", "jdbc:h2:mem:test"),
        ("username", "sa"),
        ("pool.max", "20"),
    ])
}
