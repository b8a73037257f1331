use super::Cursor;
use crate::error::BuildCause;
use quick_xml::Reader;
use quick_xml::events::Event;

/// The document type declaration found in the prolog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Doctype {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    /// Text between `[` and `]`, if any.
    pub internal_subset: Option<String>,
}

impl Doctype {
    /// Parses the body of a `<!DOCTYPE ...>` declaration.
    pub fn parse(body: &str) -> Result<Self, BuildCause> {
        let mut cursor = Cursor::new(body);
        cursor.skip_ws();
        if cursor.eat("DOCTYPE") {
            cursor.require_ws()?;
        }
        let name = cursor.name()?.to_string();
        cursor.skip_ws();
        let (public_id, system_id) = match cursor.external_id()? {
            Some((public_id, system_id)) => {
                (public_id.map(str::to_string), Some(system_id.to_string()))
            }
            None => (None, None),
        };
        cursor.skip_ws();
        let internal_subset = if cursor.eat("[") {
            let rest = cursor.rest();
            let end = rest
                .rfind(']')
                .ok_or_else(|| cursor.error("unterminated internal subset"))?;
            Some(rest[..end].to_string())
        } else {
            None
        };
        Ok(Doctype {
            name,
            public_id,
            system_id,
            internal_subset,
        })
    }
}

/// Looks for a DOCTYPE before the document element.
///
/// Prolog problems other than a malformed DOCTYPE are left for the tree
/// parser to report, so a scan that cannot read the prolog yields `None`.
pub fn scan_prolog(text: &str) -> Result<Option<Doctype>, BuildCause> {
    let mut reader = Reader::from_str(text);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::DocType(e)) => {
                let body = String::from_utf8_lossy(&e);
                return Doctype::parse(&body).map(Some);
            }
            Ok(Event::Start(_) | Event::Empty(_) | Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => {
                log::debug!("Prolog scan stopped early: {}", e);
                return Ok(None);
            }
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_public_doctype() {
        let doctype = Doctype::parse(
            r#" configuration PUBLIC "-//confpath//DTD Config 1.0//EN" "http://example.org/config.dtd""#,
        )
        .unwrap();
        assert_eq!(doctype.name, "configuration");
        assert_eq!(doctype.public_id.as_deref(), Some("-//confpath//DTD Config 1.0//EN"));
        assert_eq!(doctype.system_id.as_deref(), Some("http://example.org/config.dtd"));
        assert!(doctype.internal_subset.is_none());
    }

    #[test]
    fn test_parse_internal_subset() {
        let doctype = Doctype::parse("DOCTYPE note [ <!ELEMENT note (#PCDATA)> ]").unwrap();
        assert_eq!(doctype.name, "note");
        assert!(doctype.system_id.is_none());
        assert_eq!(
            doctype.internal_subset.as_deref(),
            Some(" <!ELEMENT note (#PCDATA)> ")
        );
    }

    #[test]
    fn test_scan_prolog_finds_doctype() {
        let xml = r#"<?xml version="1.0"?>
<!-- settings -->
<!DOCTYPE config SYSTEM "config.dtd">
<config/>"#;
        let doctype = scan_prolog(xml).unwrap().unwrap();
        assert_eq!(doctype.name, "config");
        assert_eq!(doctype.system_id.as_deref(), Some("config.dtd"));
    }

    #[test]
    fn test_scan_prolog_without_doctype() {
        assert_eq!(scan_prolog("<config><a/></config>").unwrap(), None);
        assert_eq!(scan_prolog("").unwrap(), None);
    }

    #[test]
    fn test_scan_prolog_reads_subset_with_markup() {
        let xml = r#"<!DOCTYPE a [
  <!ENTITY e "value">
  <!ELEMENT a (#PCDATA)>
]>
<a>&e;</a>"#;
        let doctype = scan_prolog(xml).unwrap().unwrap();
        let subset = doctype.internal_subset.unwrap();
        assert!(subset.contains("<!ENTITY e \"value\">"));
        assert!(subset.contains("<!ELEMENT a (#PCDATA)>"));
    }
}
