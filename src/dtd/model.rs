//! Element content models and matching a child sequence against them.

use super::Cursor;
use crate::error::BuildCause;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum ContentModel {
    Empty,
    Any,
    /// `(#PCDATA | a | b)*`; the names of the elements allowed between text.
    Mixed(Vec<String>),
    Children(Particle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub kind: ParticleKind,
    pub occurrence: Occurrence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParticleKind {
    Name(String),
    Seq(Vec<Particle>),
    Choice(Vec<Particle>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    Once,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl ContentModel {
    pub(crate) fn parse(cursor: &mut Cursor<'_>) -> Result<Self, BuildCause> {
        if cursor.eat("EMPTY") {
            return Ok(ContentModel::Empty);
        }
        if cursor.eat("ANY") {
            return Ok(ContentModel::Any);
        }
        cursor.expect("(")?;
        cursor.skip_ws();
        if cursor.eat("#PCDATA") {
            return parse_mixed(cursor);
        }
        let kind = parse_group_body(cursor)?;
        Ok(ContentModel::Children(Particle {
            kind,
            occurrence: parse_occurrence(cursor),
        }))
    }

    /// Checks a sequence of child element names against the model.
    /// Text content is checked by the validator.
    pub fn accepts(&self, children: &[&str]) -> bool {
        match self {
            ContentModel::Empty => children.is_empty(),
            ContentModel::Any => true,
            ContentModel::Mixed(names) => children.iter().all(|c| names.iter().any(|n| n == c)),
            ContentModel::Children(particle) => {
                let start = BTreeSet::from([0]);
                particle.advance(children, &start).contains(&children.len())
            }
        }
    }
}

impl Particle {
    /// Every position reachable after matching this particle once more,
    /// starting from any of `from`.
    fn advance(&self, children: &[&str], from: &BTreeSet<usize>) -> BTreeSet<usize> {
        match self.occurrence {
            Occurrence::Once => self.advance_once(children, from),
            Occurrence::Optional => {
                let mut reached = self.advance_once(children, from);
                reached.extend(from.iter().copied());
                reached
            }
            Occurrence::ZeroOrMore => self.closure(children, from.clone()),
            Occurrence::OneOrMore => {
                let first = self.advance_once(children, from);
                self.closure(children, first)
            }
        }
    }

    fn closure(&self, children: &[&str], mut reached: BTreeSet<usize>) -> BTreeSet<usize> {
        let mut frontier = reached.clone();
        while !frontier.is_empty() {
            let next = self.advance_once(children, &frontier);
            frontier = next.difference(&reached).copied().collect();
            reached.extend(frontier.iter().copied());
        }
        reached
    }

    fn advance_once(&self, children: &[&str], from: &BTreeSet<usize>) -> BTreeSet<usize> {
        match &self.kind {
            ParticleKind::Name(name) => from
                .iter()
                .filter(|&&pos| children.get(pos) == Some(&name.as_str()))
                .map(|pos| pos + 1)
                .collect(),
            ParticleKind::Seq(items) => items
                .iter()
                .fold(from.clone(), |reached, item| item.advance(children, &reached)),
            ParticleKind::Choice(items) => items
                .iter()
                .flat_map(|item| item.advance(children, from))
                .collect(),
        }
    }
}

fn parse_mixed(cursor: &mut Cursor<'_>) -> Result<ContentModel, BuildCause> {
    let mut names = Vec::new();
    loop {
        cursor.skip_ws();
        if cursor.eat(")") {
            break;
        }
        cursor.expect("|")?;
        cursor.skip_ws();
        names.push(cursor.name()?.to_string());
    }
    if !cursor.eat("*") && !names.is_empty() {
        return Err(cursor.error("mixed content with element names must end in ')*'"));
    }
    Ok(ContentModel::Mixed(names))
}

/// The inside of a group whose `(` has been consumed, up to and including `)`.
fn parse_group_body(cursor: &mut Cursor<'_>) -> Result<ParticleKind, BuildCause> {
    let mut items = vec![parse_particle(cursor)?];
    let mut separator = None;
    loop {
        cursor.skip_ws();
        if cursor.eat(")") {
            break;
        }
        let sep = if cursor.eat(",") {
            ','
        } else if cursor.eat("|") {
            '|'
        } else {
            return Err(cursor.error("expected ',', '|' or ')'"));
        };
        if separator.is_some_and(|s| s != sep) {
            return Err(cursor.error("a group cannot mix ',' and '|'"));
        }
        separator = Some(sep);
        items.push(parse_particle(cursor)?);
    }
    Ok(match separator {
        Some('|') => ParticleKind::Choice(items),
        _ => ParticleKind::Seq(items),
    })
}

fn parse_particle(cursor: &mut Cursor<'_>) -> Result<Particle, BuildCause> {
    cursor.skip_ws();
    let kind = if cursor.eat("(") {
        cursor.skip_ws();
        parse_group_body(cursor)?
    } else {
        ParticleKind::Name(cursor.name()?.to_string())
    };
    Ok(Particle {
        kind,
        occurrence: parse_occurrence(cursor),
    })
}

fn parse_occurrence(cursor: &mut Cursor<'_>) -> Occurrence {
    if cursor.eat("?") {
        Occurrence::Optional
    } else if cursor.eat("*") {
        Occurrence::ZeroOrMore
    } else if cursor.eat("+") {
        Occurrence::OneOrMore
    } else {
        Occurrence::Once
    }
}
