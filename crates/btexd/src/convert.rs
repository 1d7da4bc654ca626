//! Coordinate conversion between LSP and the analysis core.
//!
//! Both sides count columns in UTF-16 code units. LSP numbers lines and
//! characters from 0, the core from 1.

use btex_core::{Diagnostic as CoreDiagnostic, TextEdit as CoreEdit};
use btex_syntax::{Position as CorePosition, Range as CoreRange};
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range, TextEdit,
};

pub fn to_core_position(position: Position) -> CorePosition {
    CorePosition::new(position.line + 1, position.character + 1)
}

pub fn to_lsp_position(position: CorePosition) -> Position {
    Position::new(
        position.line.saturating_sub(1),
        position.column.saturating_sub(1),
    )
}

pub fn to_core_range(range: Range) -> CoreRange {
    let start = to_core_position(range.start);
    let end = to_core_position(range.end);
    CoreRange::new(start.line, start.column, end.line, end.column)
}

pub fn to_lsp_range(range: CoreRange) -> Range {
    Range::new(to_lsp_position(range.start()), to_lsp_position(range.end()))
}

pub fn to_lsp_edit(edit: CoreEdit) -> TextEdit {
    TextEdit::new(to_lsp_range(edit.range), edit.text)
}

pub fn to_lsp_diagnostic(owner: &str, diagnostic: &CoreDiagnostic) -> Diagnostic {
    Diagnostic {
        range: to_lsp_range(diagnostic.range),
        severity: Some(DiagnosticSeverity::ERROR),
        code: Some(NumberOrString::String(diagnostic.kind.code().to_string())),
        source: Some(owner.to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}
