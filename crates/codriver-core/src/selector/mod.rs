//! Path-based selector language for identifying remote objects.
//!
//! A selector is an ordered sequence of steps evaluated against the remote
//! object graph *by the agent*. The driver's responsibility is purely
//! syntactic: validate the expression at command-construction time, before
//! any network round trip, and canonicalize it for transmission. A malformed
//! selector therefore fails in microseconds instead of burning a command
//! timeout on a query the agent could never resolve.
//!
//! Grammar (informal):
//!
//! ```text
//! selector   = step+ attribute?
//! step       = ("/" | "//") node_test predicate*
//! node_test  = "*" | name | "fn:component(" quoted ")"
//! predicate  = "[@" name "=" quoted "]" | "[" integer "]"
//! attribute  = "/@" name
//! ```
//!
//! Examples accepted:
//!
//! ```text
//! //*[@name='Load_UISample']
//! /*[@name='Cube']
//! //*[@name='Cylinder']/fn:component('UnityEngine.Light')/@color
//! /Canvas/Panel[2]
//! ```

mod parser;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing a selector expression.
///
/// Offsets are character offsets into the trimmed input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector is empty")]
    Empty,

    #[error("selector must start with '/' or '//'")]
    MissingLeadingSeparator,

    #[error("empty step at offset {offset}")]
    EmptyStep { offset: usize },

    #[error("unbalanced bracket at offset {offset}")]
    UnbalancedBracket { offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid predicate at offset {offset}")]
    InvalidPredicate { offset: usize },

    #[error("invalid function step at offset {offset}; only fn:component('Type') is supported")]
    InvalidFunction { offset: usize },

    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedCharacter { offset: usize, found: char },

    #[error("attribute access must be the final segment (offset {offset})")]
    AttributeNotLast { offset: usize },

    /// Raised by callers that require a trailing `/@field` segment
    /// (e.g. field reads) when the selector has none.
    #[error("selector has no trailing /@field attribute access")]
    MissingAttribute,
}

/// How a step walks the object graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// `/` — direct children of the previous step's matches.
    Child,
    /// `//` — all descendants of the previous step's matches.
    Descendant,
}

/// What a step matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeTest {
    /// `*` — any object.
    Wildcard,
    /// A bare object name.
    Name(String),
    /// `fn:component('TypeName')` — narrows matches to objects exposing the
    /// named component/capability.
    Component(String),
}

/// A filter applied to a step's matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// `[@name='value']` — attribute equality.
    Attribute { name: String, value: String },
    /// `[n]` — positional index among the step's matches.
    Index(u32),
}

/// One step of a selector path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

/// A parsed, validated selector.
///
/// Immutable after construction; the agent re-evaluates it against the live
/// object graph on every use, so a `Selector` never caches matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    steps: Vec<Step>,
    attribute: Option<String>,
}

impl Selector {
    /// Parses and validates a selector expression.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] describing the first syntax problem found.
    pub fn parse(input: &str) -> Result<Selector, SelectorError> {
        parser::parse(input)
    }

    pub(crate) fn from_parts(steps: Vec<Step>, attribute: Option<String>) -> Selector {
        Selector { steps, attribute }
    }

    /// The parsed path steps, in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The trailing `/@field` attribute access, if any.
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Re-serializes the parsed form into its canonical text.
    ///
    /// Canonical text always uses single quotes and exactly the separators
    /// the axes call for; parsing it again yields an equal `Selector`.
    pub fn canonical(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        for step in &self.steps {
            out.push_str(match step.axis {
                Axis::Child => "/",
                Axis::Descendant => "//",
            });
            match &step.test {
                NodeTest::Wildcard => out.push('*'),
                NodeTest::Name(name) => out.push_str(name),
                NodeTest::Component(type_name) => {
                    let _ = write!(out, "fn:component('{type_name}')");
                }
            }
            for predicate in &step.predicates {
                match predicate {
                    Predicate::Attribute { name, value } => {
                        let _ = write!(out, "[@{name}='{value}']");
                    }
                    Predicate::Index(index) => {
                        let _ = write!(out, "[{index}]");
                    }
                }
            }
        }
        if let Some(attr) = &self.attribute {
            let _ = write!(out, "/@{attr}");
        }
        out
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
