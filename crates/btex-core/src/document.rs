use crate::config::Options;
use crate::highlight::{highlight, BracketPair};
use crate::mode::{detect_mode, Mode};
use crate::validate::{validate, Diagnostic};
use btex_syntax::{tokenize, LineTokens, Position, Range, StructuralToken};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read access to a document's lines, as provided by the editor host.
///
/// Lines are numbered from 1. Out-of-range lines read as empty.
pub trait LineSource {
    fn line_count(&self) -> u32;
    fn line_content(&self, line: u32) -> &str;
}

impl LineSource for [String] {
    fn line_count(&self) -> u32 {
        self.len() as u32
    }

    fn line_content(&self, line: u32) -> &str {
        line.checked_sub(1)
            .and_then(|idx| self.get(idx as usize))
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl LineSource for Vec<String> {
    fn line_count(&self) -> u32 {
        self.as_slice().line_count()
    }

    fn line_content(&self, line: u32) -> &str {
        self.as_slice().line_content(line)
    }
}

/// Tokens keyed by 1-based line number.
pub type TokenMap = BTreeMap<u32, LineTokens>;

/// Tokenizes the lines of `source` covered by `range`, or every line when
/// `range` is `None`. Only the line numbers of `range` are used.
pub fn analyse<S: LineSource + ?Sized>(
    source: &S,
    range: Option<Range>,
    options: &Options,
) -> TokenMap {
    let count = source.line_count();
    let (start, end) = match range {
        Some(range) => (range.start_line.max(1), range.end_line.min(count)),
        None => (1, count),
    };
    (start..=end)
        .map(|line| (line, tokenize_line(source.line_content(line), options)))
        .collect()
}

/// Tokenizes one line, honoring the line length guard.
pub fn tokenize_line(text: &str, options: &Options) -> LineTokens {
    // UTF-16 length never exceeds the byte length.
    if text.len() > options.max_parsed_line_length
        && text.encode_utf16().count() > options.max_parsed_line_length
    {
        return LineTokens::new();
    }
    tokenize(text)
}

/// Per-document token sequences, one entry per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCache {
    lines: Vec<LineTokens>,
}

impl TokenCache {
    /// Full analysis of `source`.
    pub fn build<S: LineSource + ?Sized>(source: &S, options: &Options) -> Self {
        let mut cache = Self::default();
        cache.merge(analyse(source, None, options));
        cache
    }

    /// Re-tokenizes the lines of `range` and replaces their entries.
    pub fn update<S: LineSource + ?Sized>(&mut self, source: &S, range: Range, options: &Options) {
        self.merge(analyse(source, Some(range), options));
    }

    /// Replaces the entries present in `map`, growing the cache if needed.
    pub fn merge(&mut self, map: TokenMap) {
        for (line, tokens) in map {
            let Some(idx) = line.checked_sub(1).map(|idx| idx as usize) else {
                continue;
            };
            if idx >= self.lines.len() {
                self.lines.resize_with(idx + 1, LineTokens::new);
            }
            self.lines[idx] = tokens;
        }
    }

    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Tokens of `line`, empty when the line is unknown.
    pub fn line(&self, line: u32) -> &[StructuralToken] {
        line.checked_sub(1)
            .and_then(|idx| self.lines.get(idx as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[StructuralToken])> + '_ {
        self.lines
            .iter()
            .enumerate()
            .map(|(idx, tokens)| (idx as u32 + 1, tokens.as_slice()))
    }

    /// Every token starting at or after `position`, in document order.
    pub fn tokens_from(
        &self,
        position: Position,
    ) -> impl Iterator<Item = (u32, &StructuralToken)> + '_ {
        let first = self.line(position.line);
        let skip = first
            .iter()
            .take_while(|t| t.start_column < position.column)
            .count();
        let line = position.line;
        first[skip..]
            .iter()
            .map(move |t| (line, t))
            .chain((line + 1..=self.line_count()).flat_map(move |l| {
                self.line(l).iter().map(move |t| (l, t))
            }))
    }

    pub fn to_map(&self) -> TokenMap {
        self.iter().map(|(line, tokens)| (line, tokens.to_vec())).collect()
    }
}

/// A text replacement in editor coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range,
    pub text: String,
}

impl TextEdit {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self::new(Range::new(at.line, at.column, at.line, at.column), text)
    }

    /// Whether re-tokenizing the edited line is enough to keep the cache
    /// exact. Edits that span lines or add line breaks shift the structure.
    pub fn is_line_local(&self) -> bool {
        self.range.is_single_line() && !self.text.contains(['\n', '\r'])
    }
}

/// How much of the token cache an edit invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reanalysis {
    Line(u32),
    Full,
}

/// A document's text together with its token cache.
///
/// The cache is only replaced through the methods below, so it always
/// reflects the current text.
#[derive(Debug, Clone)]
pub struct StructuralDocument {
    lines: Vec<String>,
    tokens: TokenCache,
    options: Options,
}

impl StructuralDocument {
    pub fn new(text: &str, options: Options) -> Self {
        let lines = split_lines(text);
        let tokens = TokenCache::build(&lines, &options);
        Self {
            lines,
            tokens,
            options,
        }
    }

    /// Replaces the whole text and rebuilds the cache.
    pub fn set_text(&mut self, text: &str) {
        self.lines = split_lines(text);
        self.reanalyse();
    }

    pub fn set_options(&mut self, options: Options) {
        self.options = options;
        self.reanalyse();
    }

    /// Rebuilds the token cache from scratch.
    pub fn reanalyse(&mut self) {
        self.tokens = TokenCache::build(&self.lines, &self.options);
    }

    /// Applies `edit` and re-tokenizes what it touched.
    ///
    /// Line-local edits re-tokenize only their line; everything else triggers a
    /// full re-analysis.
    pub fn apply_edit(&mut self, edit: &TextEdit) -> Reanalysis {
        let count = self.line_count();
        let start_line = edit.range.start_line.clamp(1, count);
        let end_line = edit.range.end_line.clamp(start_line, count);
        let start_idx = (start_line - 1) as usize;
        let end_idx = (end_line - 1) as usize;

        // Positions past the last line sit at the end of the document.
        let start_byte = if edit.range.start_line > count {
            self.lines[start_idx].len()
        } else {
            byte_offset(&self.lines[start_idx], edit.range.start_column)
        };
        let mut end_byte = if edit.range.end_line > count {
            self.lines[end_idx].len()
        } else {
            byte_offset(&self.lines[end_idx], edit.range.end_column)
        };
        if start_idx == end_idx {
            end_byte = end_byte.max(start_byte);
        }

        let mut merged = String::with_capacity(edit.text.len() + 32);
        merged.push_str(&self.lines[start_idx][..start_byte]);
        merged.push_str(&edit.text);
        merged.push_str(&self.lines[end_idx][end_byte..]);
        self.lines.splice(start_idx..=end_idx, split_lines(&merged));

        if edit.is_line_local() {
            self.tokens.update(
                &self.lines,
                Range::new(start_line, 1, start_line, 1),
                &self.options,
            );
            Reanalysis::Line(start_line)
        } else {
            log::debug!(
                "full re-analysis: edit {}:{}-{}:{} is not line-local",
                edit.range.start_line,
                edit.range.start_column,
                edit.range.end_line,
                edit.range.end_column
            );
            self.reanalyse();
            Reanalysis::Full
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    pub fn line(&self, line: u32) -> &str {
        self.lines.line_content(line)
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn detect_mode(&self, position: Position) -> Mode {
        detect_mode(&self.tokens, position, &self.options)
    }

    pub fn highlight(&self, position: Position) -> Option<BracketPair> {
        highlight(&self.tokens, position)
    }

    pub fn validate(&self) -> Vec<Diagnostic> {
        validate(&self.tokens)
    }

    /// Text of `line` before `column`.
    pub fn line_prefix(&self, position: Position) -> &str {
        let line = self.line(position.line);
        &line[..byte_offset(line, position.column)]
    }

    /// Text of `line` from `column` on.
    pub fn line_suffix(&self, position: Position) -> &str {
        let line = self.line(position.line);
        &line[byte_offset(line, position.column)..]
    }
}

impl LineSource for StructuralDocument {
    fn line_count(&self) -> u32 {
        self.lines.line_count()
    }

    fn line_content(&self, line: u32) -> &str {
        self.lines.line_content(line)
    }
}

/// Splits text into lines, dropping the `\r` of CRLF endings.
fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Byte index of the 1-based UTF-16 `column` in `line`, clamped to the line.
pub fn byte_offset(line: &str, column: u32) -> usize {
    let mut current = 1u32;
    for (idx, c) in line.char_indices() {
        if current >= column {
            return idx;
        }
        current += c.len_utf16() as u32;
    }
    line.len()
}

pub(crate) fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}
