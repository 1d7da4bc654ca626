//! # btex Syntax
//!
//! Structural tokenizer for btex, a LaTeX-like markup language edited live
//! inside a text editor.
//!
//! ## Overview
//!
//! This crate does not build a syntax tree. It extracts only the markers that
//! matter for nesting and matching, one line at a time:
//!
//! - **Braces**: `{`, `}`
//! - **Math delimiters**: `$`, `\(`, `\)`, `\[`, `\]`
//! - **Environments**: `\begin{name}`, `\end{name}`
//! - **Definition openers**: `\def`, `\newcommand`, `\newenvironment`, `\envdef`
//!   and their relatives
//!
//! Everything else on the line is consumed without producing a token. The
//! tokenizer never fails: malformed or half-typed constructs simply produce no
//! token, which is the common case while the user is typing.
//!
//! ## Coordinates
//!
//! Lines and columns are **1-based** and columns count **UTF-16 code units**,
//! matching the conventions of the editors this is meant to drive. A token
//! covers the half-open column range `[start_column, end_column)`.
//!
//! ## Examples
//!
//! ```
//! use btex_syntax::{tokenize, TokenTag};
//!
//! let tokens = tokenize(r"\begin{align} x \end{align}");
//! assert_eq!(tokens.len(), 2);
//! assert_eq!(tokens[0].tag, TokenTag::Begin("align".to_string()));
//! assert_eq!((tokens[0].start_column, tokens[0].end_column), (1, 14));
//! ```

pub mod position;
pub mod tokenizer;


pub use position::{Position, Range};
pub use tokenizer::{neutralize, tokenize};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The family of a command or environment definition opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    /// `\def`, `\gdef`, `\newcommand`, `\renewcommand`, ...
    Def,
    /// `\newenvironment`, `\renewenvironment`
    NewEnv,
    /// `\envdef`, `\envadef`, `\envpdef`
    EnvDef,
}

impl DefinitionKind {
    /// Number of brace groups that make up the definition after the opener.
    pub fn group_count(self) -> usize {
        match self {
            DefinitionKind::Def => 1,
            DefinitionKind::NewEnv => 3,
            DefinitionKind::EnvDef => 4,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            DefinitionKind::Def => "def",
            DefinitionKind::NewEnv => "newenv",
            DefinitionKind::EnvDef => "envdef",
        }
    }
}

/// What a structural token stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum TokenTag {
    LBrace,
    RBrace,
    Dollar,
    /// `\(`
    OpenParen,
    /// `\)`
    CloseParen,
    /// `\[`
    OpenBracket,
    /// `\]`
    CloseBracket,
    Begin(String),
    End(String),
    Definition(DefinitionKind),
}

impl TokenTag {
    /// The environment name carried by `\begin` / `\end` tags.
    pub fn environment(&self) -> Option<&str> {
        match self {
            TokenTag::Begin(name) | TokenTag::End(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TokenTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenTag::LBrace => f.write_str("{"),
            TokenTag::RBrace => f.write_str("}"),
            TokenTag::Dollar => f.write_str("$"),
            TokenTag::OpenParen => f.write_str("\\("),
            TokenTag::CloseParen => f.write_str("\\)"),
            TokenTag::OpenBracket => f.write_str("\\["),
            TokenTag::CloseBracket => f.write_str("\\]"),
            TokenTag::Begin(name) => write!(f, "\\begin{{{}}}", name),
            TokenTag::End(name) => write!(f, "\\end{{{}}}", name),
            TokenTag::Definition(kind) => f.write_str(kind.as_str()),
        }
    }
}

/// A structurally significant marker within one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralToken {
    pub tag: TokenTag,
    pub start_column: u32,
    pub end_column: u32,
}

impl StructuralToken {
    pub fn new(tag: TokenTag, start_column: u32, end_column: u32) -> Self {
        Self {
            tag,
            start_column,
            end_column,
        }
    }

    /// Whether `column` touches the token: strictly after its start and at
    /// most one past its end.
    pub fn touches(&self, column: u32) -> bool {
        self.start_column < column && column <= self.end_column
    }

    /// The token's range on `line`.
    pub fn range(&self, line: u32) -> Range {
        Range::new(line, self.start_column, line, self.end_column)
    }
}

/// The tokens of one line, in left-to-right column order.
pub type LineTokens = Vec<StructuralToken>;
