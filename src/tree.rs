//! Builds a [`Document`] from quick-xml events.
//!
//! Names are kept exactly as written. Prefixes are never resolved, so
//! `<a:b/>` is an element named `a:b` whether or not `a` is declared, and
//! `xmlns` declarations are ordinary attributes.
//!
//! Character data and entity references between two pieces of markup form a
//! single text node. A CDATA section is always a text node of its own, and a
//! comment that is dropped does not split the text around it.

use crate::diagnostics::Diagnostics;
use crate::document::{Document, NodeId, NodeKind};
use crate::dtd::{Dtd, EntityDecl};
use crate::error::BuildCause;
use crate::policy::SecurityLimits;
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesRef, BytesStart, Event};
use std::collections::HashMap;
use std::rc::Rc;

pub(crate) struct TreeBuilder<'d> {
    document: Document,
    /// Elements started but not yet ended, innermost last.
    open: Vec<NodeId>,
    /// The text node the next run of character data extends.
    text: Option<NodeId>,
    keep_comments: bool,
    dtd: Option<&'d Dtd>,
    limits: SecurityLimits,
    diagnostics: &'d Diagnostics,
    /// Replacement text of internal entities, fully expanded.
    expanded: HashMap<String, Rc<str>>,
    /// Bytes produced by entity references so far.
    expanded_bytes: u64,
}

impl<'d> TreeBuilder<'d> {
    pub(crate) fn new(
        dtd: Option<&'d Dtd>,
        limits: SecurityLimits,
        diagnostics: &'d Diagnostics,
    ) -> Self {
        Self {
            document: Document::new(),
            open: Vec::new(),
            text: None,
            keep_comments: false,
            dtd,
            limits,
            diagnostics,
            expanded: HashMap::new(),
            expanded_bytes: 0,
        }
    }

    pub(crate) fn keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    pub(crate) fn build(mut self, text: &str) -> Result<Document, BuildCause> {
        self.read(text)?;
        if let Some(&open) = self.open.last() {
            return Err(malformed(format!(
                "element <{}> is never closed",
                self.document.name(open).unwrap_or_default()
            )));
        }
        if self.document.root_element().is_none() {
            return Err(malformed("the document has no root element"));
        }
        Ok(self.document)
    }

    /// Feeds `text` through the tree. Called again for the replacement text
    /// of entities that contain markup.
    fn read(&mut self, text: &str) -> Result<(), BuildCause> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().check_comments = true;

        loop {
            let event = reader.read_event().map_err(|e| {
                malformed(format!("{} at byte {}", e, reader.error_position()))
            })?;
            match event {
                Event::Start(e) => self.start(&e, false)?,
                Event::Empty(e) => self.start(&e, true)?,
                Event::End(e) => self.end(utf8(e.name().as_ref())?)?,
                Event::Text(e) => {
                    let content = e.xml10_content().map_err(encoding)?;
                    self.character_data(&content)?;
                }
                Event::GeneralRef(e) => self.reference(&e)?,
                Event::CData(e) => {
                    let content = e.xml10_content().map_err(encoding)?;
                    let parent = self.content_parent("CDATA section")?;
                    self.push(parent, NodeKind::Text, None, content.into_owned())?;
                }
                Event::Comment(e) => {
                    if self.keep_comments {
                        let content = e.xml10_content().map_err(encoding)?;
                        let parent = self.parent();
                        self.push(parent, NodeKind::Comment, None, content.into_owned())?;
                    }
                }
                Event::PI(e) => {
                    let target = utf8(e.target())?.to_string();
                    let value = utf8(e.content())?.trim_start().to_string();
                    let parent = self.parent();
                    self.push(parent, NodeKind::ProcessingInstruction, Some(target), value)?;
                }
                Event::Decl(_) | Event::DocType(_) => {}
                Event::Eof => return Ok(()),
            }
        }
    }

    fn parent(&self) -> NodeId {
        self.open.last().copied().unwrap_or(self.document.root())
    }

    /// The element character data goes into; there is none outside the root.
    fn content_parent(&self, what: &str) -> Result<NodeId, BuildCause> {
        self.open
            .last()
            .copied()
            .ok_or_else(|| malformed(format!("{} outside the root element", what)))
    }

    fn push(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: Option<String>,
        value: String,
    ) -> Result<NodeId, BuildCause> {
        let id = self.document.push(parent, kind, name, value);
        if kind != NodeKind::Attribute {
            self.text = None;
        }
        if self.document.node_count() > self.limits.max_nodes as usize {
            return Err(BuildCause::LimitExceeded(format!(
                "the document has more than {} nodes",
                self.limits.max_nodes
            )));
        }
        Ok(id)
    }

    fn start(&mut self, tag: &BytesStart<'_>, empty: bool) -> Result<(), BuildCause> {
        if self.open.is_empty() && self.document.root_element().is_some() {
            return Err(malformed("the document has more than one root element"));
        }
        let name = utf8(tag.name().as_ref())?.to_string();
        let parent = self.parent();
        let element = self.push(parent, NodeKind::Element, Some(name.clone()), String::new())?;

        let mut seen = Vec::new();
        for attr in tag.attributes() {
            let attr = attr.map_err(|e| malformed(format!("in <{}>: {}", name, e)))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = self.attribute_value(utf8(&attr.value)?)?;
            self.push(element, NodeKind::Attribute, Some(key.clone()), value)?;
            seen.push(key);
        }
        if let Some(dtd) = self.dtd {
            for decl in dtd.attribute_decls(&name) {
                if let Some(default) = decl.default.value()
                    && !seen.contains(&decl.name)
                {
                    self.push(
                        element,
                        NodeKind::Attribute,
                        Some(decl.name.clone()),
                        default.to_string(),
                    )?;
                }
            }
        }

        if !empty {
            self.open.push(element);
        }
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), BuildCause> {
        let element = self
            .open
            .pop()
            .ok_or_else(|| malformed(format!("</{}> closes nothing", name)))?;
        let open = self.document.name(element).unwrap_or_default();
        if open != name {
            return Err(malformed(format!("</{}> closes <{}>", name, open)));
        }
        self.text = None;
        Ok(())
    }

    fn character_data(&mut self, content: &str) -> Result<(), BuildCause> {
        if content.is_empty() {
            return Ok(());
        }
        if self.open.is_empty() {
            if content.trim_matches(is_xml_space).is_empty() {
                return Ok(());
            }
            return Err(malformed("text outside the root element"));
        }
        match self.text {
            Some(text) => self.document.append_text(text, content),
            None => {
                let parent = self.parent();
                let text = self.push(parent, NodeKind::Text, None, content.to_string())?;
                self.text = Some(text);
            }
        }
        Ok(())
    }

    fn reference(&mut self, reference: &BytesRef<'_>) -> Result<(), BuildCause> {
        let resolved = reference
            .resolve_char_ref()
            .map_err(|e| malformed(e.to_string()))?;
        if let Some(ch) = resolved {
            self.content_parent("character reference")?;
            return self.character_data(ch.encode_utf8(&mut [0; 4]));
        }

        let name = utf8(reference)?;
        self.content_parent("entity reference")?;
        if let Some(text) = resolve_predefined_entity(name) {
            return self.character_data(text);
        }
        match self.entity(name)? {
            EntityDecl::Internal(raw) if raw.contains('<') => {
                self.count_expansion(name, raw.len())?;
                let depth = self.open.len();
                self.read(raw)?;
                if self.open.len() != depth {
                    return Err(malformed(format!(
                        "entity '{}' does not hold balanced markup",
                        name
                    )));
                }
                Ok(())
            }
            EntityDecl::Internal(_) => {
                let text = self.expand(name)?;
                self.count_expansion(name, text.len())?;
                self.character_data(&text)
            }
            EntityDecl::External { system_id, .. } => self.diagnostics.warning(format!(
                "external entity '{}' ({}) was not expanded",
                name, system_id
            )),
        }
    }

    fn entity(&self, name: &str) -> Result<&'d EntityDecl, BuildCause> {
        self.dtd
            .and_then(|dtd| dtd.entities.get(name))
            .ok_or_else(|| malformed(format!("undefined entity '&{};'", name)))
    }

    /// The replacement text of an internal entity with every reference in
    /// it resolved.
    fn expand(&mut self, name: &str) -> Result<Rc<str>, BuildCause> {
        if let Some(text) = self.expanded.get(name) {
            return Ok(text.clone());
        }
        let raw = match self.entity(name)? {
            EntityDecl::Internal(raw) => raw.as_str(),
            EntityDecl::External { .. } => {
                return Err(malformed(format!(
                    "external entity '{}' cannot be expanded here",
                    name
                )));
            }
        };
        // Entity declarations are acyclic once the limits check has run.
        for nested in references(raw) {
            if !nested.starts_with('#') && resolve_predefined_entity(nested).is_none() {
                self.expand(nested)?;
            }
        }
        let expanded = &self.expanded;
        let text: Rc<str> = unescape_with(raw, |entity| {
            resolve_predefined_entity(entity).or_else(|| expanded.get(entity).map(|t| &**t))
        })
        .map_err(|e| malformed(format!("in entity '{}': {}", name, e)))?
        .into();
        self.expanded.insert(name.to_string(), text.clone());
        Ok(text)
    }

    fn attribute_value(&mut self, raw: &str) -> Result<String, BuildCause> {
        let normalized = raw.replace("\r\n", " ").replace(['\t', '\n', '\r'], " ");
        for name in references(&normalized) {
            if name.starts_with('#') || resolve_predefined_entity(name).is_some() {
                continue;
            }
            if let EntityDecl::Internal(replacement) = self.entity(name)?
                && replacement.contains('<')
            {
                return Err(malformed(format!(
                    "entity '{}' puts markup in an attribute value",
                    name
                )));
            }
            let text = self.expand(name)?;
            self.count_expansion(name, text.len())?;
        }
        let expanded = &self.expanded;
        unescape_with(&normalized, |entity| {
            resolve_predefined_entity(entity).or_else(|| expanded.get(entity).map(|t| &**t))
        })
        .map(|value| value.into_owned())
        .map_err(|e| malformed(e.to_string()))
    }

    fn count_expansion(&mut self, name: &str, bytes: usize) -> Result<(), BuildCause> {
        self.expanded_bytes = self.expanded_bytes.saturating_add(bytes as u64);
        if self.expanded_bytes > self.limits.total_entity_size_limit {
            return Err(BuildCause::LimitExceeded(format!(
                "expanding '&{};' brings the document to {} bytes of entity text, the limit is {}",
                name, self.expanded_bytes, self.limits.total_entity_size_limit
            )));
        }
        Ok(())
    }
}

/// Names between `&` and `;`, character references included.
fn references(text: &str) -> impl Iterator<Item = &str> {
    text.split('&')
        .skip(1)
        .filter_map(|rest| rest.split_once(';').map(|(name, _)| name))
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn utf8(bytes: &[u8]) -> Result<&str, BuildCause> {
    std::str::from_utf8(bytes).map_err(|e| BuildCause::Encoding(e.to_string()))
}

fn encoding(error: quick_xml::encoding::EncodingError) -> BuildCause {
    BuildCause::Encoding(error.to_string())
}

fn malformed(message: impl Into<String>) -> BuildCause {
    BuildCause::Malformed(message.into())
}
