//! Bracket stack shared by the highlighter and the validator.

use crate::markers::{Bracket, Delimiter, Marker};
use btex_syntax::Range;

/// What kind of construct a [`Frame`] holds open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind<'a> {
    Brace,
    Paren,
    Square,
    Environment(&'a str),
    Dollar,
    DoubleDollar,
}

impl<'a> Kind<'a> {
    fn of(bracket: Bracket<'a>) -> Self {
        match bracket {
            Bracket::Brace => Kind::Brace,
            Bracket::Paren => Kind::Paren,
            Bracket::Square => Kind::Square,
            Bracket::Environment(name) => Kind::Environment(name),
        }
    }

    pub fn opener(&self) -> String {
        match self {
            Kind::Brace => "{".to_string(),
            Kind::Paren => "\\(".to_string(),
            Kind::Square => "\\[".to_string(),
            Kind::Environment(name) => format!("\\begin{{{name}}}"),
            Kind::Dollar => "$".to_string(),
            Kind::DoubleDollar => "$$".to_string(),
        }
    }

    pub fn closer(&self) -> String {
        match self {
            Kind::Brace => "}".to_string(),
            Kind::Paren => "\\)".to_string(),
            Kind::Square => "\\]".to_string(),
            Kind::Environment(name) => format!("\\end{{{name}}}"),
            Kind::Dollar => "$".to_string(),
            Kind::DoubleDollar => "$$".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub kind: Kind<'a>,
    pub line: u32,
    pub start_column: u32,
    pub end_column: u32,
    /// Set by the highlighter once the cursor is known to sit inside this frame.
    pub highlight: bool,
}

impl Frame<'_> {
    pub fn range(&self) -> Range {
        Range::new(self.line, self.start_column, self.line, self.end_column)
    }
}

/// Outcome of feeding one marker to a [`BracketStack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<'a> {
    Opened,
    /// The marker closed `opener`. Frames that were above it on the stack are
    /// dropped unclosed, innermost last.
    Closed {
        opener: Frame<'a>,
        unclosed: Vec<Frame<'a>>,
    },
    /// A closer with no matching frame anywhere on the stack. The stack is
    /// left untouched.
    Orphan(Kind<'a>),
}

#[derive(Debug, Default)]
pub struct BracketStack<'a> {
    frames: Vec<Frame<'a>>,
}

impl<'a> BracketStack<'a> {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Applies `marker` to the stack. Definition markers are not brackets and
    /// yield `None`.
    ///
    /// `$` and `$$` close only when the innermost frame is of the same kind;
    /// anywhere else they open.
    pub fn feed(&mut self, marker: &Marker<'a>) -> Option<Step<'a>> {
        let step = match marker.delimiter {
            Delimiter::Open(bracket) => self.open(Kind::of(bracket), marker),
            Delimiter::Close(bracket) => self.close(Kind::of(bracket)),
            Delimiter::Dollar => self.toggle(Kind::Dollar, marker),
            Delimiter::DoubleDollar => self.toggle(Kind::DoubleDollar, marker),
            Delimiter::Definition(_) => return None,
        };
        Some(step)
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame<'a>> {
        self.frames.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames still open, outermost first.
    pub fn into_frames(self) -> Vec<Frame<'a>> {
        self.frames
    }

    fn open(&mut self, kind: Kind<'a>, marker: &Marker<'a>) -> Step<'a> {
        self.frames.push(Frame {
            kind,
            line: marker.line,
            start_column: marker.start_column,
            end_column: marker.end_column,
            highlight: false,
        });
        Step::Opened
    }

    fn toggle(&mut self, kind: Kind<'a>, marker: &Marker<'a>) -> Step<'a> {
        match self.frames.last() {
            Some(top) if top.kind == kind => self.close(kind),
            _ => self.open(kind, marker),
        }
    }

    fn close(&mut self, kind: Kind<'a>) -> Step<'a> {
        let Some(index) = self.frames.iter().rposition(|frame| frame.kind == kind) else {
            return Step::Orphan(kind);
        };
        let unclosed = self.frames.split_off(index + 1);
        match self.frames.pop() {
            Some(opener) => Step::Closed { opener, unclosed },
            None => Step::Orphan(kind),
        }
    }
}
