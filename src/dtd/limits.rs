//! Entity expansion accounting, done on the declarations alone so that an
//! exponential payload is rejected without being expanded.

use super::EntityDecl;
use crate::error::BuildCause;
use crate::policy::SecurityLimits;
use std::collections::HashMap;

const PREDEFINED: &[&str] = &["lt", "gt", "amp", "apos", "quot"];

#[derive(Debug, Clone, Copy)]
struct Expansion {
    /// Entity references expanded, transitively.
    references: u64,
    /// Bytes of replacement text once fully expanded.
    size: u64,
}

enum State {
    Visiting,
    Done(Expansion),
}

/// Checks every internal entity against `limits`.
pub fn check_entities(
    entities: &HashMap<String, EntityDecl>,
    limits: &SecurityLimits,
) -> Result<(), BuildCause> {
    let mut states = HashMap::new();
    for name in entities.keys() {
        let expansion = measure(name, entities, &mut states)?;
        if expansion.references > limits.entity_expansion_limit {
            return Err(BuildCause::LimitExceeded(format!(
                "entity '{}' expands {} entity references, the limit is {}",
                name, expansion.references, limits.entity_expansion_limit
            )));
        }
        if expansion.size > limits.total_entity_size_limit {
            return Err(BuildCause::LimitExceeded(format!(
                "entity '{}' expands to {} bytes, the limit is {}",
                name, expansion.size, limits.total_entity_size_limit
            )));
        }
    }
    Ok(())
}

fn measure<'e>(
    name: &'e str,
    entities: &'e HashMap<String, EntityDecl>,
    states: &mut HashMap<&'e str, State>,
) -> Result<Expansion, BuildCause> {
    match states.get(name) {
        Some(State::Done(expansion)) => return Ok(*expansion),
        Some(State::Visiting) => {
            return Err(BuildCause::Dtd(format!(
                "entity '{}' references itself",
                name
            )));
        }
        None => {}
    }

    let text = match entities.get(name) {
        Some(EntityDecl::Internal(text)) => text.as_str(),
        // External and undeclared entities are never expanded here.
        _ => {
            return Ok(Expansion {
                references: 0,
                size: 0,
            });
        }
    };

    states.insert(name, State::Visiting);
    let mut total = Expansion {
        references: 0,
        size: 0,
    };
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        total.size = total.size.saturating_add(amp as u64);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';') else {
            total.size = total.size.saturating_add(after.len() as u64 + 1);
            rest = "";
            break;
        };
        let reference = &after[..semi];
        rest = &after[semi + 1..];

        if reference.starts_with('#') || PREDEFINED.contains(&reference) {
            total.size = total.size.saturating_add(1);
            continue;
        }
        let child = match entities.get_key_value(reference) {
            Some((key, _)) => measure(key, entities, states)?,
            None => Expansion {
                references: 0,
                size: 0,
            },
        };
        total.references = total
            .references
            .saturating_add(1)
            .saturating_add(child.references);
        total.size = total.size.saturating_add(child.size);
    }
    total.size = total.size.saturating_add(rest.len() as u64);

    states.insert(name, State::Done(total));
    Ok(total)
}
