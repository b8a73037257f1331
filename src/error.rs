use crate::resolver::ResolveError;
use confpath_xpath1::XPathError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the query layer reports.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to build document: {0}")]
    DocumentBuild(#[from] BuildCause),

    #[error("Failed to evaluate '{expression}' against {context}: {source}")]
    QueryEvaluation {
        expression: String,
        context: String,
        #[source]
        source: XPathError,
    },

    #[error("Cannot parse '{input}' as {target}: {reason}")]
    NumberFormat {
        input: String,
        target: &'static str,
        reason: String,
    },
}

/// Why a document could not be built.
#[derive(Error, Debug)]
pub enum BuildCause {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported encoding: {0}")]
    Encoding(String),

    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Malformed DTD: {0}")]
    Dtd(String),

    #[error("Document is invalid: {0}")]
    Invalid(String),

    #[error("Security limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Failed to resolve '{system_id}': {source}")]
    Resolver {
        system_id: String,
        #[source]
        source: ResolveError,
    },

    #[error("External DTD '{0}' is not available")]
    ExternalUnavailable(String),

    #[error("Unsupported parse policy: {0}")]
    UnsupportedPolicy(String),

    #[error("Warning escalated: {0}")]
    Warning(String),
}
