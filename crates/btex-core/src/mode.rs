use crate::config::Options;
use crate::document::TokenCache;
use crate::markers::{Bracket, Delimiter, Markers};
use crate::matcher::jump_over_groups;
use btex_syntax::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a position is in running text or in math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Text,
    Math,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Text => f.write_str("text"),
            Mode::Math => f.write_str("math"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context<'a> {
    Dollar,
    DoubleDollar,
    Paren,
    Square,
    Environment(&'a str),
}

/// Classifies `position` as text or math mode.
///
/// Replays every delimiter that ends at or before `position`. Closers that do
/// not match the innermost context are ignored rather than reported, since
/// this only needs a best guess for completion. Definition bodies are skipped
/// with [`jump_over_groups`]; a position inside one is always text.
///
/// ```
/// use btex_core::{detect_mode, Mode, Options, TokenCache};
/// use btex_syntax::Position;
///
/// let lines = vec!["a $x$ b".to_string()];
/// let cache = TokenCache::build(&lines, &Options::default());
/// assert_eq!(detect_mode(&cache, Position::new(1, 4), &Options::default()), Mode::Math);
/// assert_eq!(detect_mode(&cache, Position::new(1, 6), &Options::default()), Mode::Text);
/// ```
pub fn detect_mode(cache: &TokenCache, position: Position, options: &Options) -> Mode {
    let mut stack: Vec<Context<'_>> = Vec::new();
    let mut markers = Markers::new(cache);

    while let Some(marker) = markers.next() {
        if marker.end() > position {
            break;
        }
        match marker.delimiter {
            Delimiter::Dollar => toggle(&mut stack, Context::Dollar),
            Delimiter::DoubleDollar => toggle(&mut stack, Context::DoubleDollar),
            Delimiter::Open(Bracket::Paren) => stack.push(Context::Paren),
            Delimiter::Open(Bracket::Square) => stack.push(Context::Square),
            Delimiter::Close(Bracket::Paren) => pop_if(&mut stack, Context::Paren),
            Delimiter::Close(Bracket::Square) => pop_if(&mut stack, Context::Square),
            Delimiter::Open(Bracket::Environment(name)) => {
                if options.is_math_environment(name) {
                    stack.push(Context::Environment(name));
                }
            }
            Delimiter::Close(Bracket::Environment(name)) => {
                pop_if(&mut stack, Context::Environment(name))
            }
            Delimiter::Open(Bracket::Brace) | Delimiter::Close(Bracket::Brace) => {}
            Delimiter::Definition(kind) => {
                match jump_over_groups(cache, marker.end(), kind.group_count()) {
                    Some(end) if end < position => {
                        markers.seek(Position::new(end.line, end.column + 1));
                    }
                    _ => return Mode::Text,
                }
            }
        }
    }

    if stack.is_empty() {
        Mode::Text
    } else {
        Mode::Math
    }
}

fn toggle<'a>(stack: &mut Vec<Context<'a>>, context: Context<'a>) {
    if stack.last() == Some(&context) {
        stack.pop();
    } else {
        stack.push(context);
    }
}

fn pop_if<'a>(stack: &mut Vec<Context<'a>>, context: Context<'a>) {
    if stack.last() == Some(&context) {
        stack.pop();
    }
}
