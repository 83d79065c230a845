//! CSS selector subset for input detection.
//!
//! The rule table only ever needs tag names, ids, classes, and attribute
//! tests joined by descendant combinators, so that is all this parser
//! accepts. Anything fancier (`>`, `+`, `~`, selector lists, pseudo
//! classes) is rejected at parse time; callers treat an unparsable
//! pattern as a skip, not a failure, so one exotic entry can never break
//! detection for the rest of a selector list.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("combinator {0:?} is not supported")]
    Combinator(char),
    #[error("expected a name after {0:?}")]
    MissingName(char),
    #[error("unterminated attribute test")]
    UnterminatedAttr,
    #[error("unexpected character {0:?}")]
    Unexpected(char),
}

/// One attribute-level condition inside a compound selector.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Test {
    Id(String),
    Class(String),
    Attr { name: String, value: Option<String> },
}

/// A single element pattern: optional tag name plus zero or more tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    tag: Option<String>,
    tests: Vec<Test>,
}

/// A parsed selector: compounds joined by descendant combinators,
/// leftmost-ancestor first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    parts: Vec<Compound>,
}

/// Read access a matcher needs from an element. Tag names are compared
/// ASCII case-insensitively; attribute values are compared verbatim.
pub trait ElementView {
    fn tag(&self) -> &str;
    fn attr(&self, name: &str) -> Option<&str>;
}

pub fn parse(input: &str) -> Result<Selector, SelectorError> {
    let mut cur = Cursor::new(input);
    let mut parts = Vec::new();
    loop {
        cur.skip_ws();
        if cur.peek().is_none() {
            break;
        }
        parts.push(parse_compound(&mut cur)?);
    }
    if parts.is_empty() {
        return Err(SelectorError::Empty);
    }
    Ok(Selector { parts })
}

/// Parses every pattern in `patterns`, dropping the ones the subset
/// cannot express. Order is preserved.
pub fn parse_all(patterns: &[&str]) -> Vec<Selector> {
    patterns
        .iter()
        .filter_map(|pattern| match parse(pattern) {
            Ok(selector) => Some(selector),
            Err(err) => {
                tracing::debug!(pattern, %err, "skipping unsupported selector");
                None
            }
        })
        .collect()
}

impl Selector {
    /// True when `element` matches the rightmost compound and the
    /// remaining compounds match `ancestors` (closest first) in order.
    pub fn matches<E, I>(&self, element: &E, ancestors: I) -> bool
    where
        E: ElementView,
        I: IntoIterator,
        I::Item: ElementView,
    {
        let Some((last, outer)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(element) {
            return false;
        }
        let mut remaining = outer.len();
        if remaining == 0 {
            return true;
        }
        for ancestor in ancestors {
            if outer[remaining - 1].matches(&ancestor) {
                remaining -= 1;
                if remaining == 0 {
                    return true;
                }
            }
        }
        false
    }
}

impl Compound {
    fn matches<E: ElementView>(&self, element: &E) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.tests.iter().all(|test| match test {
            Test::Id(id) => element.attr("id") == Some(id.as_str()),
            Test::Class(class) => element
                .attr("class")
                .is_some_and(|list| list.split_whitespace().any(|c| c == class)),
            Test::Attr { name, value: None } => element.attr(name).is_some(),
            Test::Attr {
                name,
                value: Some(value),
            } => element.attr(name) == Some(value.as_str()),
        })
    }
}

fn parse_compound(cur: &mut Cursor) -> Result<Compound, SelectorError> {
    let mut compound = Compound::default();
    if cur.peek().is_some_and(is_ident_char) {
        compound.tag = Some(cur.take_ident().to_ascii_lowercase());
    }
    loop {
        match cur.peek() {
            None => break,
            Some(c) if c.is_whitespace() => break,
            Some('#') => {
                cur.bump();
                let id = cur.take_ident();
                if id.is_empty() {
                    return Err(SelectorError::MissingName('#'));
                }
                compound.tests.push(Test::Id(id.to_owned()));
            }
            Some('.') => {
                cur.bump();
                let class = cur.take_ident();
                if class.is_empty() {
                    return Err(SelectorError::MissingName('.'));
                }
                compound.tests.push(Test::Class(class.to_owned()));
            }
            Some('[') => {
                cur.bump();
                compound.tests.push(parse_attr(cur)?);
            }
            Some(c @ ('>' | '+' | '~' | ',')) => return Err(SelectorError::Combinator(c)),
            Some(c) => return Err(SelectorError::Unexpected(c)),
        }
    }
    Ok(compound)
}

fn parse_attr(cur: &mut Cursor) -> Result<Test, SelectorError> {
    let name = cur.take_ident();
    if name.is_empty() {
        return Err(SelectorError::MissingName('['));
    }
    let name = name.to_owned();
    match cur.peek() {
        Some(']') => {
            cur.bump();
            Ok(Test::Attr { name, value: None })
        }
        Some('=') => {
            cur.bump();
            let value = parse_attr_value(cur)?;
            match cur.peek() {
                Some(']') => {
                    cur.bump();
                    Ok(Test::Attr {
                        name,
                        value: Some(value),
                    })
                }
                _ => Err(SelectorError::UnterminatedAttr),
            }
        }
        _ => Err(SelectorError::UnterminatedAttr),
    }
}

fn parse_attr_value(cur: &mut Cursor) -> Result<String, SelectorError> {
    match cur.peek() {
        Some(quote @ ('"' | '\'')) => {
            cur.bump();
            let value = cur.take_until(quote)?;
            cur.bump();
            Ok(value)
        }
        Some(c) if is_ident_char(c) => Ok(cur.take_ident().to_owned()),
        _ => Err(SelectorError::MissingName('=')),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { rest: src }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.rest = &self.rest[c.len_utf8()..];
        }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn take_ident(&mut self) -> &'a str {
        let end = self
            .rest
            .char_indices()
            .find(|&(_, c)| !is_ident_char(c))
            .map_or(self.rest.len(), |(i, _)| i);
        let (ident, rest) = self.rest.split_at(end);
        self.rest = rest;
        ident
    }

    fn take_until(&mut self, stop: char) -> Result<String, SelectorError> {
        match self.rest.find(stop) {
            Some(end) => {
                let (value, rest) = self.rest.split_at(end);
                self.rest = rest;
                Ok(value.to_owned())
            }
            None => Err(SelectorError::UnterminatedAttr),
        }
    }
}
