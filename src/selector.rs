//! CSS selector subset used to pick the regions rendered as images.
//!
//! Supported grammar:
//!
//! ```text
//! list      := complex ( "," complex )*
//! complex   := compound ( ( " " | ">" ) compound )*
//! compound  := ( tag | "*" )? ( "#" id | "." class | "[" attr ( "=" value )? "]" )*
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::dom::{Document, ElementData, NodeId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Id(String),
    Class(String),
    HasAttr(String),
    AttrEquals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One complex selector, stored right-to-left for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

impl Selector {
    /// Parse a selector list (`a, b > c`) into its complex selectors.
    pub fn parse_list(input: &str) -> Result<Vec<Selector>, SelectorError> {
        let err = |reason: &str| SelectorError {
            selector: input.to_string(),
            reason: reason.to_string(),
        };
        if input.trim().is_empty() {
            return Err(err("empty selector"));
        }
        input
            .split(',')
            .map(|part| parse_complex(part.trim()).map_err(|reason| err(&reason)))
            .collect()
    }

    /// Whether `node` is an element matching this selector.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };
        if !self.subject.matches(element) {
            return false;
        }
        self.match_ancestors(doc, node, 0)
    }

    fn match_ancestors(&self, doc: &Document, node: NodeId, step: usize) -> bool {
        let Some((combinator, compound)) = self.ancestors.get(step) else {
            return true;
        };
        let mut current = doc.parent(node);
        while let Some(candidate) = current {
            if let Some(element) = doc.element(candidate) {
                if compound.matches(element) && self.match_ancestors(doc, candidate, step + 1) {
                    return true;
                }
            }
            if *combinator == Combinator::Child {
                return false;
            }
            current = doc.parent(candidate);
        }
        false
    }
}

impl Compound {
    fn matches(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag.name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.conditions.iter().all(|c| match c {
            Condition::Id(id) => element.id() == Some(id.as_str()),
            Condition::Class(class) => element.has_class(class),
            Condition::HasAttr(name) => element.attr(name).is_some(),
            Condition::AttrEquals(name, value) => element.attr(name) == Some(value.as_str()),
        })
    }
}

fn parse_complex(input: &str) -> Result<Selector, String> {
    if input.is_empty() {
        return Err("empty selector in list".to_string());
    }
    let mut compounds: Vec<Compound> = Vec::new();
    let mut combinators: Vec<Combinator> = Vec::new();
    let mut chars = input.chars().peekable();
    let mut pending: Option<Combinator> = None;

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            if !compounds.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            continue;
        }
        if c == '>' {
            chars.next();
            if compounds.is_empty() {
                return Err("combinator without a left-hand side".to_string());
            }
            pending = Some(Combinator::Child);
            continue;
        }
        if !compounds.is_empty() {
            combinators.push(pending.take().ok_or("missing combinator")?);
        }
        compounds.push(parse_compound(&mut chars)?);
    }
    if pending == Some(Combinator::Child) {
        return Err("dangling `>`".to_string());
    }

    let subject = compounds.pop().ok_or("empty selector")?;
    let ancestors = combinators
        .into_iter()
        .rev()
        .zip(compounds.into_iter().rev())
        .collect();
    Ok(Selector { subject, ancestors })
}

fn parse_compound(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut any = false;

    if chars.peek() == Some(&'*') {
        chars.next();
        any = true;
    } else {
        let tag = take_ident(chars);
        if !tag.is_empty() {
            compound.tag = Some(tag.to_ascii_lowercase());
            any = true;
        }
    }

    while let Some(&c) = chars.peek() {
        match c {
            '#' | '.' => {
                chars.next();
                let name = take_ident(chars);
                if name.is_empty() {
                    return Err(format!("expected a name after `{c}`"));
                }
                compound.conditions.push(if c == '#' {
                    Condition::Id(name)
                } else {
                    Condition::Class(name)
                });
            }
            '[' => {
                chars.next();
                compound.conditions.push(parse_attribute(chars)?);
            }
            c if c.is_whitespace() || c == '>' => break,
            other => return Err(format!("unexpected character `{other}`")),
        }
        any = true;
    }

    if !any {
        return Err("expected a simple selector".to_string());
    }
    Ok(compound)
}

fn parse_attribute(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Condition, String> {
    let name = take_ident(chars).to_ascii_lowercase();
    if name.is_empty() {
        return Err("expected an attribute name".to_string());
    }
    match chars.next() {
        Some(']') => Ok(Condition::HasAttr(name)),
        Some('=') => {
            let value = match chars.peek() {
                Some(&quote @ ('"' | '\'')) => {
                    chars.next();
                    let mut value = String::new();
                    loop {
                        match chars.next() {
                            Some(c) if c == quote => break,
                            Some(c) => value.push(c),
                            None => return Err("unterminated attribute value".to_string()),
                        }
                    }
                    value
                }
                _ => take_ident(chars),
            };
            match chars.next() {
                Some(']') => Ok(Condition::AttrEquals(name, value)),
                _ => Err("expected `]`".to_string()),
            }
        }
        _ => Err("expected `]` or `=`".to_string()),
    }
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
            chars.next();
        } else {
            break;
        }
    }
    out
}

/// Resolve `selectors` against the descendants of `root`.
///
/// Results follow selector-list order, then document order within each
/// selector. An element matched by more than one selector appears once, at
/// its first match. The root itself is never matched.
pub fn query_all<S: AsRef<str>>(
    doc: &Document,
    root: NodeId,
    selectors: &[S],
) -> Result<Vec<NodeId>, SelectorError> {
    let parsed: Vec<Vec<Selector>> = selectors
        .iter()
        .map(|s| Selector::parse_list(s.as_ref()))
        .collect::<Result<_, _>>()?;
    if parsed.is_empty() {
        return Ok(Vec::new());
    }

    let descendants = doc.descendants(root);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for selector in parsed.iter().flatten() {
        for &node in &descendants {
            if selector.matches(doc, node) && seen.insert(node) {
                out.push(node);
            }
        }
    }
    Ok(out)
}
