//! # btex Core
//!
//! Structural analysis of btex documents on top of the per-line tokens from
//! [`btex_syntax`].
//!
//! ## Overview
//!
//! A [`StructuralDocument`] owns a document's lines and its [`TokenCache`].
//! Edits go through [`StructuralDocument::apply_edit`], which re-tokenizes a
//! single line when it can and the whole document when it must. Everything
//! else reads the cache:
//!
//! - [`match_environment`] / [`jump_over_groups`] - find the partner of a
//!   `\begin`/`\end` and the end of a definition body
//! - [`detect_mode`] - text or math at a position
//! - [`highlight`] - the bracket pair around the cursor
//! - [`validate`] - every unmatched delimiter as a [`Diagnostic`]
//!
//! [`EditorSession`] carries the per-editor state that surrounds a document:
//! the content before the last edit, the debounced validation, and the
//! diagnostics published per owner. [`assist`] builds editing conveniences
//! (auto-closing, rename sync, environment suggestions) from the same pieces.
//!
//! None of the analysis functions fail. Mid-edit input is the normal case, so
//! a malformed construct yields `None` or an empty result, never an error.
//!
//! ## Examples
//!
//! ```
//! use btex_core::{Options, StructuralDocument, TextEdit};
//! use btex_syntax::Position;
//!
//! let mut document = StructuralDocument::new("\\begin{align}\n\n\\end{align}", Options::default());
//! assert!(document.validate().is_empty());
//!
//! document.apply_edit(&TextEdit::insert(Position::new(2, 1), "{"));
//! assert_eq!(document.validate().len(), 1);
//! assert_eq!(document.detect_mode(Position::new(2, 1)), btex_core::Mode::Math);
//! ```

pub mod assist;
pub mod brackets;
pub mod config;
pub mod document;
pub mod highlight;
pub mod markers;
pub mod matcher;
pub mod mode;
pub mod schedule;
pub mod session;
pub mod validate;

pub use config::{ConfigError, Options};
pub use document::{analyse, Reanalysis, StructuralDocument, TextEdit, TokenCache, TokenMap};
pub use highlight::{highlight, BracketPair};
pub use matcher::{enclosing_environment, jump_over_groups, match_environment, Direction};
pub use mode::{detect_mode, Mode};
pub use schedule::{Debouncer, TimerHandle};
pub use session::{DiagnosticBoard, EditorSession, STRUCTURE_OWNER};
pub use validate::{validate, Diagnostic, DiagnosticKind};
