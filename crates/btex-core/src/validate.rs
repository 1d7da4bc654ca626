use crate::brackets::{BracketStack, Frame, Kind, Step};
use crate::document::TokenCache;
use crate::markers::{Delimiter, Markers};
use crate::matcher::jump_over_groups;
use btex_syntax::{Position, Range};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// An opener that is never closed.
    Unclosed,
    /// A closer with nothing to close.
    Unexpected,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::Unclosed => "unclosed-delimiter",
            DiagnosticKind::Unexpected => "unexpected-delimiter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    fn unclosed(frame: &Frame<'_>) -> Self {
        Self {
            range: frame.range(),
            kind: DiagnosticKind::Unclosed,
            message: format!("Unmatched opening '{}'", frame.kind.opener()),
        }
    }

    fn unexpected(kind: Kind<'_>, range: Range) -> Self {
        Self {
            range,
            kind: DiagnosticKind::Unexpected,
            message: format!("Unmatched closing '{}'", kind.closer()),
        }
    }
}

/// Markers up to this point belong to a definition body.
#[derive(Debug, Clone, Copy)]
enum Suppression {
    Off,
    Until(Position),
    ToEnd,
}

impl Suppression {
    fn covers(self, position: Position) -> bool {
        match self {
            Suppression::Off => false,
            Suppression::Until(end) => position <= end,
            Suppression::ToEnd => true,
        }
    }
}

/// Reports every unmatched delimiter in the document, ordered by position.
///
/// Inside a definition body only braces are checked; math delimiters and
/// environments there are routinely unbalanced on purpose.
pub fn validate(cache: &TokenCache) -> Vec<Diagnostic> {
    let mut stack = BracketStack::new();
    let mut diagnostics = Vec::new();
    let mut suppression = Suppression::Off;

    for marker in Markers::new(cache) {
        if suppression.covers(marker.start()) {
            if !marker.is_brace() {
                continue;
            }
        } else if let Delimiter::Definition(kind) = marker.delimiter {
            suppression = match jump_over_groups(cache, marker.end(), kind.group_count()) {
                Some(end) => Suppression::Until(end),
                None => Suppression::ToEnd,
            };
            continue;
        }

        match stack.feed(&marker) {
            Some(Step::Closed { unclosed, .. }) => {
                diagnostics.extend(unclosed.iter().map(Diagnostic::unclosed));
            }
            Some(Step::Orphan(kind)) => diagnostics.push(Diagnostic::unexpected(kind, marker.range())),
            Some(Step::Opened) | None => {}
        }
    }

    diagnostics.extend(stack.into_frames().iter().map(Diagnostic::unclosed));
    diagnostics.sort_by_key(|d| d.range.start());
    diagnostics
}
