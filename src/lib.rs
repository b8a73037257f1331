//! Typed XPath queries over XML configuration documents.
//!
//! A [`QueryParser`] builds a document once, under a [`ParsePolicy`] that
//! controls DTD validation, entity expansion limits and how diagnostics are
//! handled, then answers XPath 1.0 queries with typed results. Text results
//! pass through `${...}` placeholder substitution against an optional
//! [`Variables`] table.
//!
//! ```
//! use confpath::{QueryParser, Variables};
//!
//! let xml = r#"<configuration>
//!   <environments default="dev">
//!     <environment id="dev"><pool size="${pool.size}"/></environment>
//!   </environments>
//! </configuration>"#;
//!
//! let parser = QueryParser::builder()
//!     .variables(Variables::from_iter([("pool.size", "8")]))
//!     .build(xml)?;
//!
//! let env = parser.eval_node("/configuration/environments/environment")?.unwrap();
//! assert_eq!(env.string_attribute("id").as_deref(), Some("dev"));
//! assert_eq!(env.eval_int("pool/@size")?, 8);
//! # Ok::<(), confpath::Error>(())
//! ```

pub mod builder;
pub mod diagnostics;
pub mod document;
pub mod dtd;
pub mod error;
pub mod evaluator;
mod extract;
pub mod node;
pub mod parser;
pub mod policy;
pub mod resolver;
mod tree;

pub use builder::{DocumentBuilder, XmlSource};
pub use document::{Document, NodeId, NodeKind, NodeRef};
pub use error::{BuildCause, Error, Result};
pub use evaluator::{QueryEvaluator, RawResult, ResultKind};
pub use node::TypedNode;
pub use parser::{QueryParser, QueryParserBuilder};
pub use policy::{ErrorHandling, ParsePolicy, Reaction, SecurityLimits};
pub use resolver::{EntityResolver, InMemoryEntityResolver, ResolveError};

pub use confpath_vars::{SharedVariables, Variables};
