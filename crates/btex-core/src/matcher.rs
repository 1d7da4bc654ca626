//! Environment and group matching.

use crate::document::{utf16_len, TokenCache};
use btex_syntax::{Position, StructuralToken, TokenTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Finds the environment token that closes (or opens, walking backwards) the
/// construct at `start`.
///
/// `start` must touch an existing token on its line: strictly after the
/// token's first column and no further than one past its last. The walk begins
/// with the token after (or before) that one. `expected` is the name the match
/// must carry; `None` accepts any name for the outermost match.
///
/// Returns the position right after the `{` of the matching token, or `None`
/// when the walk leaves the document first or meets a closing token whose name
/// differs from the one it closes.
///
/// ```
/// use btex_core::{match_environment, Direction, Options, TokenCache};
/// use btex_syntax::Position;
///
/// let lines = vec![r"\begin{a}".to_string(), r"\end{a}".to_string()];
/// let cache = TokenCache::build(&lines, &Options::default());
/// let end = match_environment(&cache, Position::new(1, 8), Some("a"), Direction::Forward);
/// assert_eq!(end, Some(Position::new(2, 6)));
/// ```
pub fn match_environment(
    cache: &TokenCache,
    start: Position,
    expected: Option<&str>,
    direction: Direction,
) -> Option<Position> {
    let tokens = cache.line(start.line);
    let index = tokens
        .iter()
        .take_while(|t| t.start_column < start.column)
        .count()
        .checked_sub(1)?;
    if tokens[index].end_column < start.column {
        return None;
    }

    let line = start.line;
    let found = match direction {
        Direction::Forward => walk_environments(
            tokens[index + 1..]
                .iter()
                .map(move |t| (line, t))
                .chain(lines_after(cache, line)),
            expected,
            direction,
        ),
        Direction::Backward => walk_environments(
            tokens[..index]
                .iter()
                .rev()
                .map(move |t| (line, t))
                .chain(lines_before(cache, line)),
            expected,
            direction,
        ),
    };
    found.map(|(position, _)| position)
}

/// Finds the innermost `\begin{name}` before `position` that is still open
/// at `position`, returning the position right after its `{` and its name.
pub fn enclosing_environment(cache: &TokenCache, position: Position) -> Option<(Position, &str)> {
    let tokens = cache.line(position.line);
    let before = tokens
        .iter()
        .take_while(|t| t.end_column <= position.column)
        .count();
    let line = position.line;
    walk_environments(
        tokens[..before]
            .iter()
            .rev()
            .map(move |t| (line, t))
            .chain(lines_before(cache, line)),
        None,
        Direction::Backward,
    )
}

fn lines_after(cache: &TokenCache, line: u32) -> impl Iterator<Item = (u32, &StructuralToken)> {
    (line + 1..=cache.line_count()).flat_map(move |l| cache.line(l).iter().map(move |t| (l, t)))
}

fn lines_before(cache: &TokenCache, line: u32) -> impl Iterator<Item = (u32, &StructuralToken)> {
    (1..line)
        .rev()
        .flat_map(move |l| cache.line(l).iter().rev().map(move |t| (l, t)))
}

fn walk_environments<'a>(
    walk: impl Iterator<Item = (u32, &'a StructuralToken)>,
    expected: Option<&str>,
    direction: Direction,
) -> Option<(Position, &'a str)> {
    let mut stack: Vec<Option<&str>> = vec![expected];
    for (line, token) in walk {
        let (opens, name) = match &token.tag {
            TokenTag::Begin(name) => (direction == Direction::Forward, name.as_str()),
            TokenTag::End(name) => (direction == Direction::Backward, name.as_str()),
            _ => continue,
        };
        if opens {
            stack.push(Some(name));
            continue;
        }
        if let Some(Some(open)) = stack.pop() {
            if open != name {
                return None;
            }
        }
        if stack.is_empty() {
            let column = token.end_column - utf16_len(name) - 1;
            return Some((Position::new(line, column), name));
        }
    }
    None
}

/// Counts brace groups forward from `start` and returns the position of the
/// `}` that completes the `group_count`-th group at depth zero.
///
/// Only braces are considered. Returns `None` when a `}` appears before any
/// matching `{` or the document ends first.
pub fn jump_over_groups(cache: &TokenCache, start: Position, group_count: usize) -> Option<Position> {
    if group_count == 0 {
        return Some(start);
    }
    let mut depth = 0usize;
    let mut closed = 0usize;
    for (line, token) in cache.tokens_from(start) {
        match token.tag {
            TokenTag::LBrace => depth += 1,
            TokenTag::RBrace => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    closed += 1;
                    if closed == group_count {
                        return Some(Position::new(line, token.start_column));
                    }
                }
            }
            _ => {}
        }
    }
    None
}
