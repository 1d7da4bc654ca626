//! Per-editor state that lives alongside a [`StructuralDocument`].

use crate::config::Options;
use crate::document::StructuralDocument;
use crate::schedule::Debouncer;
use crate::validate::{validate, Diagnostic};
use std::collections::BTreeMap;
use std::future::Future;

/// Owner tag of the diagnostics produced by [`validate`].
pub const STRUCTURE_OWNER: &str = "btex-structure";

/// Diagnostics of one document, grouped by the validator that produced them,
/// so independent validators can replace their own results without touching
/// the others.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBoard {
    owners: BTreeMap<String, Vec<Diagnostic>>,
}

impl DiagnosticBoard {
    /// Replaces the diagnostics of `owner`. Returns whether anything changed.
    pub fn set(&mut self, owner: &str, diagnostics: Vec<Diagnostic>) -> bool {
        if diagnostics.is_empty() {
            return self.clear(owner);
        }
        match self.owners.get(owner) {
            Some(current) if *current == diagnostics => false,
            _ => {
                self.owners.insert(owner.to_string(), diagnostics);
                true
            }
        }
    }

    pub fn clear(&mut self, owner: &str) -> bool {
        self.owners.remove(owner).is_some()
    }

    pub fn get(&self, owner: &str) -> &[Diagnostic] {
        self.owners.get(owner).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Diagnostic)> + '_ {
        self.owners
            .iter()
            .flat_map(|(owner, diagnostics)| diagnostics.iter().map(move |d| (owner.as_str(), d)))
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Typed editor state: the content before the latest edit, the pending
/// validation, and the published diagnostics.
#[derive(Debug)]
pub struct EditorSession {
    previous_content: String,
    pending_validation: Debouncer,
    board: DiagnosticBoard,
}

impl EditorSession {
    pub fn new(options: &Options) -> Self {
        Self {
            previous_content: String::new(),
            pending_validation: Debouncer::new(options.validation_delay()),
            board: DiagnosticBoard::default(),
        }
    }

    /// Remembers the document's current text as the "before" state of the
    /// next edit.
    pub fn record(&mut self, document: &StructuralDocument) {
        self.previous_content = document.text();
    }

    pub fn previous_content(&self) -> &str {
        &self.previous_content
    }

    /// Line `line` (1-based) of the recorded content.
    pub fn previous_line(&self, line: u32) -> Option<&str> {
        let index = usize::try_from(line.checked_sub(1)?).ok()?;
        self.previous_content
            .split('\n')
            .nth(index)
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
    }

    /// Schedules `task` after the validation delay, superseding any pending
    /// validation.
    pub fn schedule_validation<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending_validation.schedule(task);
    }

    pub fn cancel_validation(&mut self) {
        self.pending_validation.cancel();
    }

    pub fn has_pending_validation(&self) -> bool {
        self.pending_validation.is_pending()
    }

    pub fn set_options(&mut self, options: &Options) {
        self.pending_validation.set_delay(options.validation_delay());
    }

    /// Runs the validator and stores its result under [`STRUCTURE_OWNER`].
    /// Returns whether the stored diagnostics changed.
    pub fn validate_now(&mut self, document: &StructuralDocument) -> bool {
        let diagnostics = validate(document.tokens());
        log::trace!("validation produced {} diagnostics", diagnostics.len());
        self.board.set(STRUCTURE_OWNER, diagnostics)
    }

    pub fn board(&self) -> &DiagnosticBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut DiagnosticBoard {
        &mut self.board
    }
}
