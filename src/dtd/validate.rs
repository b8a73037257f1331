//! Validity checks of a built document against its DTD.

use super::{AttributeType, ContentModel, DefaultDecl, Doctype, Dtd};
use crate::diagnostics::Diagnostics;
use crate::document::{Document, NodeId, NodeKind};
use crate::error::BuildCause;
use std::collections::HashSet;

/// Checks `document` and reports each finding as a recoverable error.
/// Returns early only when a finding escalates.
pub fn validate(
    document: &Document,
    doctype: Option<&Doctype>,
    dtd: &Dtd,
    diagnostics: &Diagnostics,
) -> Result<(), BuildCause> {
    let invalid = |message: String| diagnostics.error(BuildCause::Invalid(message));

    let Some(doctype) = doctype else {
        return invalid("document has no DOCTYPE to validate against".to_string());
    };
    let Some(root) = document.root_element() else {
        return invalid("document has no root element".to_string());
    };
    let root_name = document.name(root).unwrap_or_default();
    if root_name != doctype.name {
        invalid(format!(
            "root element <{}> does not match DOCTYPE '{}'",
            root_name, doctype.name
        ))?;
    }

    let mut ids = HashSet::new();
    let mut references = Vec::new();
    let mut stack = vec![root];
    while let Some(element) = stack.pop() {
        let name = document.name(element).unwrap_or_default();
        match dtd.elements.get(name) {
            Some(model) => {
                if let Some(problem) = check_content(document, element, model) {
                    invalid(format!("content of <{}> {}", name, problem))?;
                }
            }
            None => invalid(format!("element <{}> is not declared", name))?,
        }
        check_attributes(document, element, dtd, &mut ids, &mut references, &invalid)?;

        let children = document.children(element);
        stack.extend(
            children
                .iter()
                .rev()
                .copied()
                .filter(|&c| document.kind(c) == NodeKind::Element),
        );
    }

    for reference in references {
        if !ids.contains(&reference) {
            invalid(format!("IDREF '{}' does not match any ID", reference))?;
        }
    }
    Ok(())
}

fn check_content(document: &Document, element: NodeId, model: &ContentModel) -> Option<String> {
    let mut names = Vec::new();
    let mut has_text = false;
    let mut has_character_data = false;
    for &child in document.children(element) {
        match document.kind(child) {
            NodeKind::Element => names.push(document.name(child).unwrap_or_default()),
            NodeKind::Text => {
                has_text = true;
                if !document.value(child).trim().is_empty() {
                    has_character_data = true;
                }
            }
            _ => {}
        }
    }

    match model {
        ContentModel::Empty if has_text || !names.is_empty() => {
            Some("must be empty".to_string())
        }
        ContentModel::Children(_) if has_character_data => {
            Some("must not contain character data".to_string())
        }
        _ if !model.accepts(&names) => Some(format!(
            "({}) does not match its declaration",
            names.join(", ")
        )),
        _ => None,
    }
}

fn check_attributes(
    document: &Document,
    element: NodeId,
    dtd: &Dtd,
    ids: &mut HashSet<String>,
    references: &mut Vec<String>,
    invalid: &impl Fn(String) -> Result<(), BuildCause>,
) -> Result<(), BuildCause> {
    let name = document.name(element).unwrap_or_default();
    let decls = dtd.attribute_decls(name);

    for &attr in document.attributes(element) {
        let attr_name = document.name(attr).unwrap_or_default();
        if attr_name == "xmlns" || attr_name.starts_with("xmlns:") {
            continue;
        }
        let value = document.value(attr);
        let Some(decl) = decls.iter().find(|d| d.name == attr_name) else {
            invalid(format!("attribute '{}' of <{}> is not declared", attr_name, name))?;
            continue;
        };

        if let DefaultDecl::Fixed(fixed) = &decl.default
            && value != fixed.as_str()
        {
            invalid(format!(
                "attribute '{}' of <{}> must be '{}', found '{}'",
                attr_name, name, fixed, value
            ))?;
        }

        match &decl.kind {
            AttributeType::Enumeration(allowed) | AttributeType::Notation(allowed)
                if !allowed.iter().any(|a| a == value) =>
            {
                invalid(format!(
                    "attribute '{}' of <{}> must be one of ({}), found '{}'",
                    attr_name,
                    name,
                    allowed.join("|"),
                    value
                ))?;
            }
            AttributeType::Id => {
                if !ids.insert(value.to_string()) {
                    invalid(format!("ID '{}' is declared more than once", value))?;
                }
            }
            AttributeType::IdRef => references.push(value.to_string()),
            AttributeType::IdRefs => {
                references.extend(value.split_whitespace().map(str::to_string))
            }
            _ => {}
        }
    }

    for decl in decls {
        if decl.default == DefaultDecl::Required && document.attribute(element, &decl.name).is_none()
        {
            invalid(format!(
                "required attribute '{}' of <{}> is missing",
                decl.name, name
            ))?;
        }
    }
    Ok(())
}
