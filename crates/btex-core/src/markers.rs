//! Logical delimiter stream over a [`TokenCache`].
//!
//! Raw tokens are per-character facts; consumers want delimiters. The only
//! difference between the two is `$$`: two `$` tokens on the same line with
//! no gap between them form one atomic display-math delimiter, paired left to
//! right, so `$$$` reads as `$$` followed by `$`.

use crate::document::TokenCache;
use btex_syntax::{DefinitionKind, Position, Range, TokenTag};

/// A delimiter that opens and closes with distinct tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket<'a> {
    Brace,
    /// `\(` … `\)`
    Paren,
    /// `\[` … `\]`
    Square,
    Environment(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter<'a> {
    Open(Bracket<'a>),
    Close(Bracket<'a>),
    /// `$`, opening or closing depending on context.
    Dollar,
    /// `$$`, opening or closing depending on context.
    DoubleDollar,
    Definition(DefinitionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker<'a> {
    pub delimiter: Delimiter<'a>,
    pub line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

impl<'a> Marker<'a> {
    pub fn start(&self) -> Position {
        Position::new(self.line, self.start_column)
    }

    pub fn end(&self) -> Position {
        Position::new(self.line, self.end_column)
    }

    pub fn range(&self) -> Range {
        Range::new(self.line, self.start_column, self.line, self.end_column)
    }

    /// Whether `position` is inside the marker or touches either edge.
    pub fn is_adjacent(&self, position: Position) -> bool {
        position.line == self.line
            && self.start_column <= position.column
            && position.column <= self.end_column
    }

    pub fn is_brace(&self) -> bool {
        matches!(
            self.delimiter,
            Delimiter::Open(Bracket::Brace) | Delimiter::Close(Bracket::Brace)
        )
    }
}

/// Iterator over the [`Marker`]s of a document, in document order.
pub struct Markers<'a> {
    cache: &'a TokenCache,
    line: u32,
    index: usize,
}

impl<'a> Markers<'a> {
    pub fn new(cache: &'a TokenCache) -> Self {
        Self {
            cache,
            line: 1,
            index: 0,
        }
    }

    /// Moves the iterator to the first token starting at or after `position`,
    /// forwards or backwards.
    pub fn seek(&mut self, position: Position) {
        self.line = position.line.max(1);
        self.index = self
            .cache
            .line(self.line)
            .iter()
            .take_while(|t| t.start_column < position.column)
            .count();
    }
}

impl<'a> Iterator for Markers<'a> {
    type Item = Marker<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let line_count = self.cache.line_count();
        while self.line <= line_count {
            let tokens = self.cache.line(self.line);
            let Some(token) = tokens.get(self.index) else {
                self.line += 1;
                self.index = 0;
                continue;
            };
            self.index += 1;

            let mut end_column = token.end_column;
            let delimiter = match &token.tag {
                TokenTag::LBrace => Delimiter::Open(Bracket::Brace),
                TokenTag::RBrace => Delimiter::Close(Bracket::Brace),
                TokenTag::OpenParen => Delimiter::Open(Bracket::Paren),
                TokenTag::CloseParen => Delimiter::Close(Bracket::Paren),
                TokenTag::OpenBracket => Delimiter::Open(Bracket::Square),
                TokenTag::CloseBracket => Delimiter::Close(Bracket::Square),
                TokenTag::Begin(name) => Delimiter::Open(Bracket::Environment(name)),
                TokenTag::End(name) => Delimiter::Close(Bracket::Environment(name)),
                TokenTag::Definition(kind) => Delimiter::Definition(*kind),
                TokenTag::Dollar => match tokens.get(self.index) {
                    Some(next)
                        if next.tag == TokenTag::Dollar
                            && next.start_column == token.end_column =>
                    {
                        self.index += 1;
                        end_column = next.end_column;
                        Delimiter::DoubleDollar
                    }
                    _ => Delimiter::Dollar,
                },
            };

            return Some(Marker {
                delimiter,
                line: self.line,
                start_column: token.start_column,
                end_column,
            });
        }
        None
    }
}
