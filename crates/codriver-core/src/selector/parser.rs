//! Hand-rolled scanner/parser for selector expressions.
//!
//! The parser walks the input character by character, building the step list
//! directly. Offsets in errors are character offsets into the trimmed input.

use super::{Axis, NodeTest, Predicate, Selector, SelectorError, Step};

/// Characters permitted in bare names (object names, attribute names,
/// component type names use the quoted form and are unrestricted).
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Consumes the next character if it equals `expected`.
    fn consume(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes the literal `text` if the input continues with it.
    fn consume_literal(&mut self, text: &str) -> bool {
        let remaining = &self.chars[self.pos..];
        let literal: Vec<char> = text.chars().collect();
        if remaining.len() >= literal.len() && remaining[..literal.len()] == literal[..] {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn starts_with(&self, text: &str) -> bool {
        let remaining = &self.chars[self.pos..];
        let literal: Vec<char> = text.chars().collect();
        remaining.len() >= literal.len() && remaining[..literal.len()] == literal[..]
    }

    /// Takes the longest run of name characters (possibly empty).
    fn take_name(&mut self) -> String {
        let start = self.pos;
        while self.peek().map(is_name_char).unwrap_or(false) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Reads a `'…'` or `"…"` quoted literal; the opening quote must be the
    /// next character.
    fn take_quoted(&mut self) -> Result<String, SelectorError> {
        let open_offset = self.pos;
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            Some(found) => {
                return Err(SelectorError::UnexpectedCharacter {
                    offset: self.pos,
                    found,
                })
            }
            None => return Err(SelectorError::UnterminatedString { offset: open_offset }),
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(SelectorError::UnterminatedString { offset: open_offset })
    }
}

/// Parses a full selector expression.
pub(super) fn parse(input: &str) -> Result<Selector, SelectorError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SelectorError::Empty);
    }

    let mut s = Scanner::new(trimmed);
    if s.peek() != Some('/') {
        return Err(SelectorError::MissingLeadingSeparator);
    }

    let mut steps = Vec::new();
    let mut attribute = None;

    while !s.at_end() {
        let sep_offset = s.pos;
        // Separator: '/' for child, '//' for descendant.
        s.consume('/');
        let axis = if s.consume('/') {
            Axis::Descendant
        } else {
            Axis::Child
        };
        if s.peek() == Some('/') {
            return Err(SelectorError::EmptyStep { offset: s.pos });
        }
        if s.at_end() {
            return Err(SelectorError::EmptyStep { offset: sep_offset });
        }

        // Trailing attribute access: '/@field' ends the selector.
        if s.consume('@') {
            let name_offset = s.pos;
            let name = s.take_name();
            if name.is_empty() {
                return Err(SelectorError::EmptyStep { offset: name_offset });
            }
            if !s.at_end() {
                return Err(SelectorError::AttributeNotLast { offset: s.pos });
            }
            attribute = Some(name);
            break;
        }

        let test = parse_node_test(&mut s)?;

        let mut predicates = Vec::new();
        while s.consume('[') {
            predicates.push(parse_predicate(&mut s)?);
        }

        steps.push(Step {
            axis,
            test,
            predicates,
        });

        match s.peek() {
            None => break,
            Some('/') => continue,
            Some(']') => return Err(SelectorError::UnbalancedBracket { offset: s.pos }),
            Some(found) => {
                return Err(SelectorError::UnexpectedCharacter {
                    offset: s.pos,
                    found,
                })
            }
        }
    }

    if steps.is_empty() && attribute.is_none() {
        return Err(SelectorError::Empty);
    }

    Ok(Selector::from_parts(steps, attribute))
}

fn parse_node_test(s: &mut Scanner) -> Result<NodeTest, SelectorError> {
    if s.consume('*') {
        return Ok(NodeTest::Wildcard);
    }

    if s.starts_with("fn:") {
        let fn_offset = s.pos;
        // Only the component filter is defined; anything else under fn: is
        // rejected before it can reach the agent.
        if !s.consume_literal("fn:component(") {
            return Err(SelectorError::InvalidFunction { offset: fn_offset });
        }
        let type_name = s.take_quoted()?;
        if !s.consume(')') {
            return Err(SelectorError::InvalidFunction { offset: fn_offset });
        }
        return Ok(NodeTest::Component(type_name));
    }

    let start = s.pos;
    let name = s.take_name();
    if name.is_empty() {
        return match s.peek() {
            Some(']') => Err(SelectorError::UnbalancedBracket { offset: s.pos }),
            Some('[') => Err(SelectorError::EmptyStep { offset: start }),
            Some(found) => Err(SelectorError::UnexpectedCharacter {
                offset: s.pos,
                found,
            }),
            None => Err(SelectorError::EmptyStep { offset: start }),
        };
    }
    Ok(NodeTest::Name(name))
}

/// Parses the body of a predicate; the opening `[` is already consumed.
fn parse_predicate(s: &mut Scanner) -> Result<Predicate, SelectorError> {
    let body_offset = s.pos;

    if s.consume('@') {
        let name = s.take_name();
        if name.is_empty() {
            return Err(SelectorError::InvalidPredicate { offset: s.pos });
        }
        if !s.consume('=') {
            return Err(SelectorError::InvalidPredicate { offset: s.pos });
        }
        let value = s.take_quoted()?;
        if !s.consume(']') {
            return Err(SelectorError::UnbalancedBracket { offset: s.pos });
        }
        return Ok(Predicate::Attribute { name, value });
    }

    if s.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        let digits = {
            let start = s.pos;
            while s.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                s.pos += 1;
            }
            s.chars[start..s.pos].iter().collect::<String>()
        };
        let index: u32 = digits
            .parse()
            .map_err(|_| SelectorError::InvalidPredicate { offset: body_offset })?;
        if !s.consume(']') {
            return Err(SelectorError::UnbalancedBracket { offset: s.pos });
        }
        return Ok(Predicate::Index(index));
    }

    Err(SelectorError::InvalidPredicate { offset: body_offset })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
