//! Editing helpers built on the structural analysis: auto-closing
//! environments and display math, keeping `\begin`/`\end` names in sync, and
//! environment name suggestions.

use crate::document::{utf16_len, StructuralDocument, TextEdit};
use crate::matcher::{enclosing_environment, match_environment, Direction};
use crate::mode::{detect_mode, Mode};
use btex_syntax::{Position, Range, TokenTag};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static JUST_OPENED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\begin\s*\{([^{}\\\s]*)\}$").expect("valid regex"));

static NAME_BEING_EDITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(begin|end)\s*\{([^{}\\]*)\}?$").expect("valid regex"));

static ENVIRONMENT_AT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\\(begin|end)\s*\{([^{}\\]*)\}").expect("valid regex"));

static ENVIRONMENT_USE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(?:begin|end|envdef|newenvironment\*?|renewenvironment\*?|newtheorem\*?)\s*\{([a-zA-Z*]+)\}",
    )
    .expect("valid regex")
});

/// Text to insert after the cursor once a `\begin{name}` has just been typed.
///
/// Returns `None` when the prefix does not end in a complete `\begin{name}`
/// or when the rest of the line already starts with the matching `\end`.
pub fn auto_close_environment(prefix: &str, suffix: &str) -> Option<String> {
    let name = JUST_OPENED.captures(prefix)?.get(1)?.as_str();
    let closer = format!("\\end{{{name}}}");
    if suffix.trim_start().starts_with(&closer) {
        return None;
    }
    Some(closer)
}

/// Closing `$$` to insert when the character just typed completed an opening
/// `$$` in text mode.
pub fn complete_display_math(document: &StructuralDocument, position: Position) -> Option<TextEdit> {
    if !document.line_prefix(position).ends_with("$$") || position.column < 3 {
        return None;
    }
    let before = Position::new(position.line, position.column - 2);
    match detect_mode(document.tokens(), before, document.options()) {
        Mode::Text => Some(TextEdit::insert(position, "$$")),
        Mode::Math => None,
    }
}

/// The name ranges of a `\begin{name}`/`\end{name}` pair, when `position` is
/// inside one of the two names. The range under the cursor comes first.
pub fn linked_environment_names(
    document: &StructuralDocument,
    position: Position,
) -> Option<[Range; 2]> {
    let tokens = document.tokens();
    let (token, name) = tokens
        .line(position.line)
        .iter()
        .filter(|t| t.touches(position.column))
        .find_map(|t| t.tag.environment().map(|name| (t, name)))?;

    let name_len = utf16_len(name);
    let name_end = token.end_column - 1;
    let name_start = name_end - name_len;
    if position.column < name_start || position.column > name_end {
        return None;
    }

    let direction = match token.tag {
        TokenTag::Begin(_) => Direction::Forward,
        _ => Direction::Backward,
    };
    let start = Position::new(position.line, name_start);
    let other = match_environment(tokens, start, Some(name), direction)?;
    Some([
        Range::new(position.line, name_start, position.line, name_end),
        Range::new(other.line, other.column, other.line, other.column + name_len),
    ])
}

/// Name of the innermost environment still open at `position`.
pub fn closing_environment(document: &StructuralDocument, position: Position) -> Option<String> {
    enclosing_environment(document.tokens(), position).map(|(_, name)| name.to_string())
}

/// Renames the partner of the `\begin`/`\end` whose name was just edited.
///
/// `previous_line` is the cursor's line before the edit. The partner is
/// found by its old name, and the returned edit replaces that name with the
/// new one.
pub fn sync_environment_rename(
    document: &StructuralDocument,
    previous_line: &str,
    position: Position,
) -> Option<TextEdit> {
    let prefix = document.line_prefix(position);
    let offset = NAME_BEING_EDITED.find(prefix)?.start();

    let old = ENVIRONMENT_AT_START.captures(previous_line.get(offset..)?)?;
    let new = ENVIRONMENT_AT_START.captures(document.line(position.line).get(offset..)?)?;
    let old_name = old.get(2)?.as_str();
    let new_name = new.get(2)?.as_str();
    if old_name == new_name {
        return None;
    }

    let direction = match new.get(1)?.as_str() {
        "begin" => Direction::Forward,
        _ => Direction::Backward,
    };
    let other = match_environment(document.tokens(), position, Some(old_name), direction)?;
    let end_column = other.column + utf16_len(old_name);
    Some(TextEdit::new(
        Range::new(other.line, other.column, other.line, end_column),
        new_name,
    ))
}

/// Distinct environment names used or defined in the document, in order of
/// first appearance, at most `limit` of them.
pub fn environment_names(document: &StructuralDocument, limit: usize) -> Vec<String> {
    let max_len = document.options().max_parsed_line_length;
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for line in document.lines() {
        if utf16_len(line) as usize > max_len {
            continue;
        }
        for found in ENVIRONMENT_USE.captures_iter(line) {
            if names.len() >= limit {
                return names;
            }
            let Some(name) = found.get(1) else { continue };
            if seen.insert(name.as_str()) {
                names.push(name.as_str().to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

    fn doc(text: &str) -> StructuralDocument {
        StructuralDocument::new(text, Options::default())
    }

    #[test]
    fn test_auto_close_environment() {
        assert_eq!(
            auto_close_environment("x \\begin{proof}", ""),
            Some("\\end{proof}".to_string())
        );
        assert_eq!(
            auto_close_environment("\\begin {a*}", " tail"),
            Some("\\end{a*}".to_string())
        );
        assert_eq!(auto_close_environment("\\begin{proof}", " \\end{proof}"), None);
        assert_eq!(auto_close_environment("\\begin{proof", ""), None);
        assert_eq!(auto_close_environment("\\begin{a b}", ""), None);
    }

    #[test]
    fn test_complete_display_math_only_in_text() {
        let document = doc("$$");
        assert_eq!(
            complete_display_math(&document, Position::new(1, 3)),
            Some(TextEdit::insert(Position::new(1, 3), "$$"))
        );

        let document = doc("$$ x $$");
        assert_eq!(complete_display_math(&document, Position::new(1, 8)), None);

        let document = doc("a $");
        assert_eq!(complete_display_math(&document, Position::new(1, 4)), None);
    }

    #[test]
    fn test_linked_names_from_begin_and_end() {
        let document = doc("\\begin{ab}\n  x\n\\end{ab}");
        let expected_begin = Range::new(1, 8, 1, 10);
        let expected_end = Range::new(3, 6, 3, 8);
        assert_eq!(
            linked_environment_names(&document, Position::new(1, 9)),
            Some([expected_begin, expected_end])
        );
        assert_eq!(
            linked_environment_names(&document, Position::new(3, 8)),
            Some([expected_end, expected_begin])
        );
        // On `\begin` itself rather than the name.
        assert_eq!(linked_environment_names(&document, Position::new(1, 3)), None);
    }

    #[test]
    fn test_closing_environment() {
        let document = doc("\\begin{outer}\n\\begin{inner}\\end{inner}\n");
        assert_eq!(
            closing_environment(&document, Position::new(3, 1)),
            Some("outer".to_string())
        );
        assert_eq!(closing_environment(&document, Position::new(1, 1)), None);
    }

    #[test]
    fn test_sync_rename_from_begin() {
        let document = doc("\\begin{abx}\n\\end{ab}");
        let edit = sync_environment_rename(&document, "\\begin{ab}", Position::new(1, 11));
        assert_eq!(edit, Some(TextEdit::new(Range::new(2, 6, 2, 8), "abx")));
    }

    #[test]
    fn test_sync_rename_from_end() {
        let document = doc("\\begin{ab}\n\\end{a}");
        let edit = sync_environment_rename(&document, "\\end{ab}", Position::new(2, 7));
        assert_eq!(edit, Some(TextEdit::new(Range::new(1, 8, 1, 10), "a")));
    }

    #[test]
    fn test_sync_rename_ignores_other_edits() {
        let document = doc("\\begin{ab} x\n\\end{ab}");
        assert_eq!(
            sync_environment_rename(&document, "\\begin{ab} ", Position::new(1, 13)),
            None
        );
    }

    #[test]
    fn test_environment_names_are_distinct_and_capped() {
        let document = doc(
            "\\newenvironment*{box}{}{}\n\\begin{proof}\\end{proof}\n\\newtheorem{lemma}\\begin{box}",
        );
        assert_eq!(environment_names(&document, 10), vec!["box", "proof", "lemma"]);
        assert_eq!(environment_names(&document, 2), vec!["box", "proof"]);
    }
}
