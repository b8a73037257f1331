//! Document type declarations: the DOCTYPE itself, the declarations of its
//! internal and external subsets, entity expansion limits and validation.

pub mod doctype;
pub mod limits;
pub mod model;
pub mod validate;

use crate::diagnostics::Diagnostics;
use crate::error::BuildCause;
use std::collections::HashMap;

pub use doctype::{Doctype, scan_prolog};
pub use model::{ContentModel, Occurrence, Particle, ParticleKind};

/// The declarations collected from a DTD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dtd {
    pub elements: HashMap<String, ContentModel>,
    pub attributes: HashMap<String, Vec<AttributeDecl>>,
    pub entities: HashMap<String, EntityDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    pub name: String,
    pub kind: AttributeType,
    pub default: DefaultDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    CData,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation(Vec<String>),
    Enumeration(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultDecl {
    Required,
    Implied,
    Fixed(String),
    Value(String),
}

impl DefaultDecl {
    /// The value supplied when the attribute is absent.
    pub fn value(&self) -> Option<&str> {
        match self {
            DefaultDecl::Fixed(v) | DefaultDecl::Value(v) => Some(v.as_str()),
            DefaultDecl::Required | DefaultDecl::Implied => None,
        }
    }
}

/// A general entity declaration. Parameter entities are not kept.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDecl {
    Internal(String),
    External {
        public_id: Option<String>,
        system_id: String,
    },
}

impl Dtd {
    /// Parses a sequence of markup declarations.
    pub fn parse(text: &str, diagnostics: &Diagnostics) -> Result<Self, BuildCause> {
        let mut dtd = Dtd::default();
        let mut cursor = Cursor::new(text);
        loop {
            cursor.skip_ws();
            if cursor.is_done() {
                break;
            }
            if cursor.eat("<!--") {
                cursor.take_until("-->")?;
            } else if cursor.eat("<?") {
                cursor.take_until("?>")?;
            } else if cursor.eat("<!ELEMENT") {
                dtd.parse_element(&mut cursor)?;
            } else if cursor.eat("<!ATTLIST") {
                dtd.parse_attlist(&mut cursor)?;
            } else if cursor.eat("<!ENTITY") {
                dtd.parse_entity(&mut cursor, diagnostics)?;
            } else if cursor.eat("<!NOTATION") {
                cursor.skip_declaration()?;
            } else if cursor.eat("<![") {
                diagnostics.warning("conditional sections are skipped")?;
                cursor.take_until("]]>")?;
            } else if cursor.eat("%") {
                let name = cursor.name()?;
                cursor.expect(";")?;
                diagnostics.warning(format!(
                    "parameter entity reference '%{};' is not expanded",
                    name
                ))?;
            } else {
                return Err(cursor.error("expected a markup declaration"));
            }
        }
        Ok(dtd)
    }

    /// Adds the declarations of an external subset. Declarations already
    /// present, which come from the internal subset, take precedence.
    pub fn merge(&mut self, external: Dtd) {
        for (name, model) in external.elements {
            self.elements.entry(name).or_insert(model);
        }
        for (name, decls) in external.attributes {
            let existing = self.attributes.entry(name).or_default();
            for decl in decls {
                if !existing.iter().any(|d| d.name == decl.name) {
                    existing.push(decl);
                }
            }
        }
        for (name, entity) in external.entities {
            self.entities.entry(name).or_insert(entity);
        }
    }

    pub fn attribute_decls(&self, element: &str) -> &[AttributeDecl] {
        self.attributes.get(element).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.attributes.is_empty() && self.entities.is_empty()
    }

    fn parse_element(&mut self, cursor: &mut Cursor<'_>) -> Result<(), BuildCause> {
        cursor.require_ws()?;
        let name = cursor.name()?.to_string();
        cursor.require_ws()?;
        let model = ContentModel::parse(cursor)?;
        cursor.skip_ws();
        cursor.expect(">")?;
        if self.elements.contains_key(&name) {
            return Err(BuildCause::Dtd(format!(
                "element type '{}' is declared more than once",
                name
            )));
        }
        self.elements.insert(name, model);
        Ok(())
    }

    fn parse_attlist(&mut self, cursor: &mut Cursor<'_>) -> Result<(), BuildCause> {
        cursor.require_ws()?;
        let element = cursor.name()?.to_string();
        let decls = self.attributes.entry(element).or_default();
        loop {
            cursor.skip_ws();
            if cursor.eat(">") {
                return Ok(());
            }
            let name = cursor.name()?.to_string();
            cursor.require_ws()?;
            let kind = parse_attribute_type(cursor)?;
            cursor.require_ws()?;
            let default = if cursor.eat("#REQUIRED") {
                DefaultDecl::Required
            } else if cursor.eat("#IMPLIED") {
                DefaultDecl::Implied
            } else if cursor.eat("#FIXED") {
                cursor.require_ws()?;
                DefaultDecl::Fixed(unescape_literal(cursor.quoted()?))
            } else {
                DefaultDecl::Value(unescape_literal(cursor.quoted()?))
            };
            // The first declaration of an attribute is binding.
            if !decls.iter().any(|d| d.name == name) {
                decls.push(AttributeDecl {
                    name,
                    kind,
                    default,
                });
            }
        }
    }

    fn parse_entity(
        &mut self,
        cursor: &mut Cursor<'_>,
        diagnostics: &Diagnostics,
    ) -> Result<(), BuildCause> {
        cursor.require_ws()?;
        if cursor.eat("%") {
            cursor.require_ws()?;
            let name = cursor.name()?;
            cursor.skip_declaration()?;
            return diagnostics.warning(format!("parameter entity '{}' is ignored", name));
        }
        let name = cursor.name()?.to_string();
        cursor.require_ws()?;
        let decl = if matches!(cursor.peek(), Some('"' | '\'')) {
            EntityDecl::Internal(cursor.quoted()?.to_string())
        } else {
            let (public_id, system_id) = cursor
                .external_id()?
                .ok_or_else(|| cursor.error("expected an entity value or external id"))?;
            cursor.skip_ws();
            if cursor.eat("NDATA") {
                cursor.require_ws()?;
                cursor.name()?;
            }
            EntityDecl::External {
                public_id: public_id.map(str::to_string),
                system_id: system_id.to_string(),
            }
        };
        cursor.skip_ws();
        cursor.expect(">")?;
        self.entities.entry(name).or_insert(decl);
        Ok(())
    }
}

fn parse_attribute_type(cursor: &mut Cursor<'_>) -> Result<AttributeType, BuildCause> {
    // Longer keywords first, `IDREFS` must not be read as `ID`.
    let kind = if cursor.eat("CDATA") {
        AttributeType::CData
    } else if cursor.eat("IDREFS") {
        AttributeType::IdRefs
    } else if cursor.eat("IDREF") {
        AttributeType::IdRef
    } else if cursor.eat("ID") {
        AttributeType::Id
    } else if cursor.eat("ENTITIES") {
        AttributeType::Entities
    } else if cursor.eat("ENTITY") {
        AttributeType::Entity
    } else if cursor.eat("NMTOKENS") {
        AttributeType::NmTokens
    } else if cursor.eat("NMTOKEN") {
        AttributeType::NmToken
    } else if cursor.eat("NOTATION") {
        cursor.require_ws()?;
        AttributeType::Notation(parse_enumeration(cursor)?)
    } else if cursor.peek() == Some('(') {
        AttributeType::Enumeration(parse_enumeration(cursor)?)
    } else {
        return Err(cursor.error("expected an attribute type"));
    };
    Ok(kind)
}

fn parse_enumeration(cursor: &mut Cursor<'_>) -> Result<Vec<String>, BuildCause> {
    cursor.expect("(")?;
    let mut values = Vec::new();
    loop {
        cursor.skip_ws();
        values.push(cursor.name()?.to_string());
        cursor.skip_ws();
        if cursor.eat(")") {
            return Ok(values);
        }
        cursor.expect("|")?;
    }
}

/// Expands the predefined entities and character references of a default
/// value. Anything it cannot expand is kept as written.
fn unescape_literal(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// A forward-only reader over declaration text.
#[derive(Debug)]
pub(crate) struct Cursor<'t> {
    text: &'t str,
    pos: usize,
}

impl<'t> Cursor<'t> {
    pub(crate) fn new(text: &'t str) -> Self {
        Self { text, pos: 0 }
    }

    pub(crate) fn rest(&self) -> &'t str {
        &self.text[self.pos..]
    }

    pub(crate) fn is_done(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn skip_ws(&mut self) -> bool {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(is_xml_space);
        self.pos += rest.len() - trimmed.len();
        rest.len() != trimmed.len()
    }

    pub(crate) fn require_ws(&mut self) -> Result<(), BuildCause> {
        if self.skip_ws() {
            Ok(())
        } else {
            Err(self.error("expected whitespace"))
        }
    }

    pub(crate) fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, token: &str) -> Result<(), BuildCause> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", token)))
        }
    }

    pub(crate) fn name(&mut self) -> Result<&'t str, BuildCause> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !is_xml_name_char(c))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    /// A literal in single or double quotes, returned without the quotes.
    pub(crate) fn quoted(&mut self) -> Result<&'t str, BuildCause> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted literal")),
        };
        self.pos += 1;
        let rest = self.rest();
        let end = rest
            .find(quote)
            .ok_or_else(|| self.error("unterminated literal"))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    /// Everything up to `delimiter`, which is consumed but not returned.
    pub(crate) fn take_until(&mut self, delimiter: &str) -> Result<&'t str, BuildCause> {
        let rest = self.rest();
        let end = rest
            .find(delimiter)
            .ok_or_else(|| self.error(&format!("missing '{}'", delimiter)))?;
        self.pos += end + delimiter.len();
        Ok(&rest[..end])
    }

    /// `PUBLIC "pub" "sys"` or `SYSTEM "sys"`; `None` when neither keyword follows.
    pub(crate) fn external_id(&mut self) -> Result<Option<(Option<&'t str>, &'t str)>, BuildCause> {
        if self.eat("PUBLIC") {
            self.require_ws()?;
            let public_id = self.quoted()?;
            self.require_ws()?;
            let system_id = self.quoted()?;
            Ok(Some((Some(public_id), system_id)))
        } else if self.eat("SYSTEM") {
            self.require_ws()?;
            Ok(Some((None, self.quoted()?)))
        } else {
            Ok(None)
        }
    }

    /// Skips to the `>` closing the current declaration, stepping over quoted literals.
    pub(crate) fn skip_declaration(&mut self) -> Result<(), BuildCause> {
        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' => {
                    self.quoted()?;
                }
                '>' => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += c.len_utf8(),
            }
        }
        Err(self.error("unterminated declaration"))
    }

    pub(crate) fn error(&self, message: &str) -> BuildCause {
        let context: String = self.rest().chars().take(24).collect();
        BuildCause::Dtd(format!("{} at offset {} near '{}'", message, self.pos, context))
    }
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_xml_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Dtd {
        Dtd::parse(text, &Diagnostics::default()).unwrap()
    }

    #[test]
    fn test_parse_element_declarations() {
        let dtd = parse(
            "<!ELEMENT configuration (properties?, settings?, mappers?)>\n\
             <!ELEMENT property EMPTY>\n\
             <!ELEMENT anything ANY>\n\
             <!ELEMENT note (#PCDATA)>",
        );
        assert_eq!(dtd.elements.len(), 4);
        assert_eq!(dtd.elements["property"], ContentModel::Empty);
        assert_eq!(dtd.elements["anything"], ContentModel::Any);
        assert_eq!(dtd.elements["note"], ContentModel::Mixed(vec![]));
        assert!(matches!(dtd.elements["configuration"], ContentModel::Children(_)));
    }

    #[test]
    fn test_parse_attlist() {
        let dtd = parse(
            r#"<!ATTLIST property
                name CDATA #REQUIRED
                value CDATA #IMPLIED
                kind (plain|secret) "plain"
                version CDATA #FIXED "1.0"
                key ID #IMPLIED
                refs IDREFS #IMPLIED>"#,
        );
        let decls = dtd.attribute_decls("property");
        assert_eq!(decls.len(), 6);
        assert_eq!(decls[0].default, DefaultDecl::Required);
        assert_eq!(decls[1].default, DefaultDecl::Implied);
        assert_eq!(
            decls[2].kind,
            AttributeType::Enumeration(vec!["plain".into(), "secret".into()])
        );
        assert_eq!(decls[2].default.value(), Some("plain"));
        assert_eq!(decls[3].default, DefaultDecl::Fixed("1.0".into()));
        assert_eq!(decls[4].kind, AttributeType::Id);
        assert_eq!(decls[5].kind, AttributeType::IdRefs);
        assert!(dtd.attribute_decls("missing").is_empty());
    }

    #[test]
    fn test_first_attribute_declaration_wins() {
        let dtd = parse(
            r#"<!ATTLIST a x CDATA "one">
               <!ATTLIST a x CDATA "two" y CDATA "&lt;y&gt;">"#,
        );
        let decls = dtd.attribute_decls("a");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].default.value(), Some("one"));
        assert_eq!(decls[1].default.value(), Some("<y>"));
    }

    #[test]
    fn test_parse_entities() {
        let dtd = parse(
            r#"<!ENTITY product "confpath">
               <!ENTITY legal SYSTEM "legal.xml">
               <!ENTITY logo PUBLIC "-//x//logo" "logo.png" NDATA png>
               <!ENTITY % shared "ignored">
               <!ENTITY product "second">"#,
        );
        assert_eq!(dtd.entities.len(), 3);
        assert_eq!(dtd.entities["product"], EntityDecl::Internal("confpath".into()));
        assert_eq!(
            dtd.entities["legal"],
            EntityDecl::External {
                public_id: None,
                system_id: "legal.xml".into()
            }
        );
        assert!(matches!(
            &dtd.entities["logo"],
            EntityDecl::External { public_id: Some(p), .. } if p == "-//x//logo"
        ));
    }

    #[test]
    fn test_comments_and_processing_instructions_are_skipped() {
        let dtd = parse(
            "<!-- a <!ELEMENT fake ANY> comment -->\n<?pi data?>\n<!NOTATION png SYSTEM \"image/png\">\n<!ELEMENT real ANY>",
        );
        assert_eq!(dtd.elements.len(), 1);
        assert!(dtd.elements.contains_key("real"));
    }

    #[test]
    fn test_parameter_entity_reference_is_a_warning() {
        let dtd = parse("%common;\n<!ELEMENT a EMPTY>");
        assert!(dtd.elements.contains_key("a"));
    }

    #[test]
    fn test_malformed_declarations_fail() {
        let diagnostics = Diagnostics::default();
        assert!(matches!(
            Dtd::parse("<!ELEMENT a (b,c>", &diagnostics),
            Err(BuildCause::Dtd(_))
        ));
        assert!(Dtd::parse("<!ATTLIST a x CDATA>", &diagnostics).is_err());
        assert!(Dtd::parse("<!BOGUS>", &diagnostics).is_err());
        assert!(Dtd::parse("<!ELEMENT a EMPTY><!ELEMENT a ANY>", &diagnostics).is_err());
    }

    #[test]
    fn test_merge_keeps_internal_declarations() {
        let mut internal = parse(r#"<!ELEMENT a EMPTY><!ATTLIST a x CDATA "in">"#);
        let external = parse(
            r#"<!ELEMENT a ANY><!ELEMENT b ANY><!ATTLIST a x CDATA "ex" y CDATA #IMPLIED>"#,
        );
        internal.merge(external);
        assert_eq!(internal.elements["a"], ContentModel::Empty);
        assert!(internal.elements.contains_key("b"));
        let decls = internal.attribute_decls("a");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].default.value(), Some("in"));
    }
}
