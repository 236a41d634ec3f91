//! XPath 1.0 location paths and expressions over an HTML [`Tree`].
//!
//! Supports every axis except `namespace`, the core node tests, predicates,
//! unions, comparison and arithmetic operators, and the string, number and
//! boolean parts of the core function library. Variables are not supported.

mod eval;
mod lexer;
mod parser;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::content::tree::{NodeRef, Tree};
use eval::{Evaluator, XValue};
use parser::Expr;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum XPathError {
    #[error("empty xpath expression")]
    Empty,
    #[error("invalid xpath at offset {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("unknown xpath function '{0}'")]
    UnknownFunction(String),
    #[error("xpath function '{function}' called with {found} arguments")]
    Arity { function: String, found: usize },
    #[error("unsupported xpath feature: {0}")]
    Unsupported(String),
    #[error("xpath '{0}' does not select nodes")]
    NotANodeSet(String),
    #[error("xpath evaluation failed: {0}")]
    Evaluation(String),
}

impl XPathError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        XPathError::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// A compiled XPath expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    pub fn compile(source: &str) -> Result<Self, XPathError> {
        if source.trim().is_empty() {
            return Err(XPathError::Empty);
        }
        Ok(Self {
            source: source.to_owned(),
            expr: parser::parse(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Selects matching nodes in document order. Expressions that evaluate
    /// to a string, number or boolean are rejected.
    pub(crate) fn select(&self, tree: &Tree) -> Result<Vec<NodeRef>, XPathError> {
        match Evaluator::new(tree).evaluate(&self.expr)? {
            XValue::Nodes(nodes) => Ok(nodes),
            _ => Err(XPathError::NotANodeSet(self.source.clone())),
        }
    }
}

impl FromStr for XPath {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        XPath::compile(s)
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
