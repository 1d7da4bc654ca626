use crate::brackets::{BracketStack, Step};
use crate::document::TokenCache;
use crate::markers::{Delimiter, Markers};
use btex_syntax::{Position, Range};
use serde::{Deserialize, Serialize};

/// The two ends of a matched bracket pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketPair {
    pub open: Range,
    pub close: Range,
}

/// Finds the innermost matched pair that encloses or touches `position`.
///
/// One pass over the document. The frame on top of the stack when the scan
/// first moves past the cursor is flagged, as is an opener the cursor touches.
/// The pair is returned when a flagged frame closes, or when the cursor
/// touches the closer itself. Passing the cursor with nothing open means there
/// is no enclosing pair.
pub fn highlight(cache: &TokenCache, position: Position) -> Option<BracketPair> {
    let mut stack = BracketStack::new();
    let mut passed = false;

    for marker in Markers::new(cache) {
        if matches!(marker.delimiter, Delimiter::Definition(_)) {
            continue;
        }
        if !passed && position < marker.start() {
            passed = true;
            stack.top_mut()?.highlight = true;
        }
        let adjacent = marker.is_adjacent(position);

        match stack.feed(&marker) {
            Some(Step::Opened) if adjacent && !passed => {
                if let Some(top) = stack.top_mut() {
                    top.highlight = true;
                }
                passed = true;
            }
            Some(Step::Closed { opener, unclosed }) => {
                if opener.highlight || adjacent || unclosed.iter().any(|f| f.highlight) {
                    return Some(BracketPair {
                        open: opener.range(),
                        close: marker.range(),
                    });
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

    fn pair_at(text: &str, line: u32, column: u32) -> Option<(u32, u32, u32, u32)> {
        let lines: Vec<String> = text.split('\n').map(String::from).collect();
        let cache = TokenCache::build(&lines, &Options::default());
        highlight(&cache, Position::new(line, column)).map(|pair| {
            (
                pair.open.start_column,
                pair.open.end_column,
                pair.close.start_column,
                pair.close.end_column,
            )
        })
    }

    #[test]
    fn test_cursor_inside_braces() {
        assert_eq!(pair_at("a { b } c", 1, 5), Some((3, 4, 7, 8)));
    }

    #[test]
    fn test_innermost_pair_wins() {
        assert_eq!(pair_at("{ { x } }", 1, 5), Some((3, 4, 7, 8)));
        assert_eq!(pair_at("{ { x } }", 1, 8), Some((3, 4, 7, 8)));
        assert_eq!(pair_at("{ { x } y }", 1, 9), Some((1, 2, 11, 12)));
    }

    #[test]
    fn test_adjacent_to_opener_or_closer() {
        assert_eq!(pair_at("$x$", 1, 1), Some((1, 2, 3, 4)));
        assert_eq!(pair_at("$x$", 1, 4), Some((1, 2, 3, 4)));
        assert_eq!(pair_at("{}{}", 1, 3), Some((1, 2, 2, 3)));
    }

    #[test]
    fn test_outside_any_pair() {
        assert_eq!(pair_at("x {}", 1, 1), None);
        assert_eq!(pair_at("{} x", 1, 4), None);
    }

    #[test]
    fn test_plain_parentheses_are_not_brackets() {
        assert_eq!(pair_at("\\left( x", 1, 8), None);
    }

    #[test]
    fn test_environment_pair_across_lines() {
        let text = "\\begin{proof}\n  body\n\\end{proof}";
        let lines: Vec<String> = text.split('\n').map(String::from).collect();
        let cache = TokenCache::build(&lines, &Options::default());
        let pair = highlight(&cache, Position::new(2, 3)).unwrap();
        assert_eq!(pair.open, Range::new(1, 1, 1, 14));
        assert_eq!(pair.close, Range::new(3, 1, 3, 12));
    }

    #[test]
    fn test_unclosed_inner_frame_still_highlights_outer_pair() {
        assert_eq!(pair_at("\\( { x \\)", 1, 6), Some((1, 3, 8, 10)));
    }

    #[test]
    fn test_display_math_pair() {
        assert_eq!(pair_at("$$ x $$", 1, 4), Some((1, 3, 6, 8)));
    }
}
