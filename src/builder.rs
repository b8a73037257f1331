//! Turns XML text or bytes into a [`Document`] under a [`ParsePolicy`].

use crate::diagnostics::Diagnostics;
use crate::document::Document;
use crate::dtd::limits::check_entities;
use crate::dtd::validate::validate;
use crate::dtd::{Doctype, Dtd, scan_prolog};
use crate::error::{BuildCause, Result};
use crate::policy::ParsePolicy;
use crate::resolver::EntityResolver;
use crate::tree::TreeBuilder;
use std::borrow::Cow;
use std::io::Read;
use std::sync::Arc;

/// Where a document comes from.
#[derive(Debug, Clone)]
pub enum XmlSource {
    Text(String),
    /// UTF-8, or UTF-16 when a byte order mark says so.
    Bytes(Vec<u8>),
    /// An already built tree, adopted without applying any policy.
    Tree(Arc<Document>),
}

impl XmlSource {
    /// Reads the whole stream into memory.
    pub fn from_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(XmlSource::Bytes(bytes))
    }
}

impl From<String> for XmlSource {
    fn from(text: String) -> Self {
        XmlSource::Text(text)
    }
}

impl From<&str> for XmlSource {
    fn from(text: &str) -> Self {
        XmlSource::Text(text.to_string())
    }
}

impl From<Vec<u8>> for XmlSource {
    fn from(bytes: Vec<u8>) -> Self {
        XmlSource::Bytes(bytes)
    }
}

impl From<&[u8]> for XmlSource {
    fn from(bytes: &[u8]) -> Self {
        XmlSource::Bytes(bytes.to_vec())
    }
}

impl From<Arc<Document>> for XmlSource {
    fn from(document: Arc<Document>) -> Self {
        XmlSource::Tree(document)
    }
}

impl From<Document> for XmlSource {
    fn from(document: Document) -> Self {
        XmlSource::Tree(Arc::new(document))
    }
}

/// Builds documents. Any failure is reported as
/// [`Error::DocumentBuild`](crate::Error::DocumentBuild) and no partial tree
/// is ever returned.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    policy: ParsePolicy,
    resolver: Option<Arc<dyn EntityResolver>>,
}

impl DocumentBuilder {
    pub fn new(policy: ParsePolicy) -> Self {
        Self {
            policy,
            resolver: None,
        }
    }

    /// External DTD subsets are read through `resolver` and nothing else.
    pub fn with_entity_resolver(mut self, resolver: Arc<dyn EntityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn policy(&self) -> &ParsePolicy {
        &self.policy
    }

    pub fn build(&self, source: impl Into<XmlSource>) -> Result<Arc<Document>> {
        let document = match source.into() {
            XmlSource::Tree(document) => return Ok(document),
            XmlSource::Text(text) => self.parse(text.strip_prefix('\u{feff}').unwrap_or(&text))?,
            XmlSource::Bytes(bytes) => self.parse(&decode(&bytes)?)?,
        };
        log::debug!(
            "Built document with {} nodes (validate: {})",
            document.node_count(),
            self.policy.validate
        );
        Ok(Arc::new(document))
    }

    fn parse(&self, text: &str) -> Result<Document, BuildCause> {
        self.policy.check_supported()?;
        let diagnostics = Diagnostics::new(self.policy.diagnostics);

        let doctype = scan_prolog(text).map_err(|e| diagnostics.fatal(e))?;
        let dtd = match &doctype {
            Some(doctype) => Some(self.load_dtd(doctype, &diagnostics)?),
            None => None,
        };
        if let Some(dtd) = &dtd {
            check_entities(&dtd.entities, &self.policy.limits).map_err(|e| diagnostics.fatal(e))?;
        }

        let document = TreeBuilder::new(dtd.as_ref(), self.policy.limits, &diagnostics)
            .keep_comments(!self.policy.ignore_comments)
            .build(text)
            .map_err(|e| diagnostics.fatal(e))?;
        if self.policy.validate {
            let empty = Dtd::default();
            validate(
                &document,
                doctype.as_ref(),
                dtd.as_ref().unwrap_or(&empty),
                &diagnostics,
            )?;
        }
        Ok(document)
    }

    fn load_dtd(&self, doctype: &Doctype, diagnostics: &Diagnostics) -> Result<Dtd, BuildCause> {
        let mut dtd = match &doctype.internal_subset {
            Some(subset) => Dtd::parse(subset, diagnostics).map_err(|e| diagnostics.fatal(e))?,
            None => Dtd::default(),
        };
        if let Some(system_id) = &doctype.system_id
            && let Some(external) =
                self.load_external(doctype.public_id.as_deref(), system_id, diagnostics)?
        {
            dtd.merge(external);
        }
        Ok(dtd)
    }

    fn load_external(
        &self,
        public_id: Option<&str>,
        system_id: &str,
        diagnostics: &Diagnostics,
    ) -> Result<Option<Dtd>, BuildCause> {
        let resolved = match &self.resolver {
            Some(resolver) => {
                log::debug!(
                    "Resolving external DTD '{}' through {}",
                    system_id,
                    resolver.name()
                );
                resolver
                    .resolve_entity(public_id, system_id)
                    .map_err(|source| {
                        diagnostics.fatal(BuildCause::Resolver {
                            system_id: system_id.to_string(),
                            source,
                        })
                    })?
            }
            None => None,
        };

        match resolved {
            Some(text) => Dtd::parse(&text, diagnostics)
                .map(Some)
                .map_err(|e| diagnostics.fatal(e)),
            None if self.policy.validate => Err(diagnostics.fatal(
                BuildCause::ExternalUnavailable(system_id.to_string()),
            )),
            None => {
                diagnostics.warning(format!("external DTD '{}' was not loaded", system_id))?;
                Ok(None)
            }
        }
    }
}

/// UTF-8 with an optional BOM, or UTF-16 announced by its BOM.
fn decode(bytes: &[u8]) -> Result<Cow<'_, str>, BuildCause> {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => utf8(rest),
        [0xFF, 0xFE, rest @ ..] => utf16(rest, u16::from_le_bytes).map(Cow::Owned),
        [0xFE, 0xFF, rest @ ..] => utf16(rest, u16::from_be_bytes).map(Cow::Owned),
        _ => utf8(bytes),
    }
}

fn utf8(bytes: &[u8]) -> Result<Cow<'_, str>, BuildCause> {
    std::str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .map_err(|e| BuildCause::Encoding(format!("input is not UTF-8: {}", e)))
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, BuildCause> {
    if bytes.len() % 2 != 0 {
        return Err(BuildCause::Encoding(
            "UTF-16 input has an odd number of bytes".to_string(),
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| BuildCause::Encoding(format!("invalid UTF-16: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::document::NodeKind;
    use crate::resolver::InMemoryEntityResolver;

    fn build(xml: &str) -> Result<Arc<Document>> {
        DocumentBuilder::default().build(xml)
    }

    fn cause(result: Result<Arc<Document>>) -> BuildCause {
        match result {
            Err(Error::DocumentBuild(cause)) => cause,
            other => panic!("expected a build error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(b"\xEF\xBB\xBF<a/>").unwrap(), "<a/>");
        assert_eq!(decode(b"<a/>").unwrap(), "<a/>");
        assert_eq!(decode(b"\xFF\xFE<\0a\0/\0>\0").unwrap(), "<a/>");
        assert_eq!(decode(b"\xFE\xFF\0<\0a\0/\0>").unwrap(), "<a/>");
        assert!(matches!(decode(b"\xFF\xFE<"), Err(BuildCause::Encoding(_))));
        assert!(matches!(decode(b"<a>\xC3</a>"), Err(BuildCause::Encoding(_))));
    }

    #[test]
    fn test_malformed_xml_fails() {
        assert!(matches!(cause(build("<a><b></a>")), BuildCause::Malformed(_)));
        assert!(matches!(cause(build("")), BuildCause::Malformed(_)));
    }

    #[test]
    fn test_comments_are_dropped_by_default() {
        let doc = build("<a><!-- x --><b/></a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.children(a).len(), 1);

        let doc = build("<a>x<!-- x -->y</a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.children(a).len(), 1);
        assert_eq!(doc.value(doc.children(a)[0]), "xy");

        let keep = DocumentBuilder::new(ParsePolicy {
            ignore_comments: false,
            ..ParsePolicy::default()
        });
        let doc = keep.build("<a><!-- x --><b/></a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.kind(doc.children(a)[0]), NodeKind::Comment);
    }

    #[test]
    fn test_internal_entities_are_expanded() {
        let doc = build(r#"<!DOCTYPE a [<!ENTITY who "world">]><a>hello &who;</a>"#).unwrap();
        assert_eq!(doc.string_value(doc.root()), "hello world");
    }

    #[test]
    fn test_unsupported_policy() {
        let builder = DocumentBuilder::new(ParsePolicy {
            namespace_aware: true,
            ..ParsePolicy::default()
        });
        assert!(matches!(
            cause(builder.build("<a/>")),
            BuildCause::UnsupportedPolicy(_)
        ));
    }

    #[test]
    fn test_external_dtd_without_resolver() {
        let xml = r#"<!DOCTYPE a SYSTEM "a.dtd"><a/>"#;
        assert!(build(xml).is_ok());

        let validating = DocumentBuilder::new(ParsePolicy::validating(true));
        assert!(matches!(
            cause(validating.build(xml)),
            BuildCause::ExternalUnavailable(id) if id == "a.dtd"
        ));
    }

    #[test]
    fn test_external_dtd_through_resolver() {
        let resolver = InMemoryEntityResolver::new()
            .with("a.dtd", r#"<!ELEMENT a EMPTY><!ATTLIST a mode CDATA "fast">"#)
            .unwrap();
        let builder = DocumentBuilder::new(ParsePolicy::validating(true))
            .with_entity_resolver(Arc::new(resolver));

        let doc = builder.build(r#"<!DOCTYPE a SYSTEM "a.dtd"><a/>"#).unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.attribute(a, "mode"), Some("fast"));

        assert!(matches!(
            cause(builder.build(r#"<!DOCTYPE a SYSTEM "a.dtd"><a><b/></a>"#)),
            BuildCause::Invalid(_)
        ));
    }

    #[test]
    fn test_node_limit() {
        let builder = DocumentBuilder::new(ParsePolicy {
            limits: crate::policy::SecurityLimits {
                max_nodes: 3,
                ..Default::default()
            },
            ..ParsePolicy::default()
        });
        assert!(matches!(
            cause(builder.build("<a><b/><c/><d/><e/></a>")),
            BuildCause::LimitExceeded(_)
        ));
    }

    #[test]
    fn test_prebuilt_tree_is_adopted() {
        let tree = roxmltree::Document::parse("<a><!-- kept --></a>").unwrap();
        let document = Arc::new(Document::from_roxmltree(&tree));
        let built = DocumentBuilder::default().build(document.clone()).unwrap();
        assert!(Arc::ptr_eq(&built, &document));
    }
}
