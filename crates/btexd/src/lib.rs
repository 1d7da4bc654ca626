pub mod convert;

use btex_core::assist;
use btex_core::{EditorSession, Options, StructuralDocument};
use convert::{to_core_position, to_core_range, to_lsp_diagnostic, to_lsp_edit, to_lsp_range};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

pub const DETECT_MODE_COMMAND: &str = "btex.detectMode";

static ENVIRONMENT_ARGUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(begin|end)\s*\{[^{}\\\s]*$").expect("valid regex"));

static COMMAND_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\\])(\\\\)*\\[a-zA-Z]*$").expect("valid regex"));

/// A document together with the editor state kept for it.
#[derive(Debug)]
pub struct DocumentState {
    pub document: StructuralDocument,
    pub session: EditorSession,
}

#[derive(Debug)]
pub struct Backend {
    pub client: Client,
    pub documents: Arc<DashMap<Url, DocumentState>>,
    pub options: Arc<Mutex<Options>>,
    /// Rename the partner `\begin`/`\end` from the server side, for clients
    /// without linked editing.
    pub rename_sync: Arc<AtomicBool>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(DashMap::new()),
            options: Arc::new(Mutex::new(Options::default())),
            rename_sync: Arc::new(AtomicBool::new(false)),
        }
    }

    fn options(&self) -> Options {
        match self.options.lock() {
            Ok(options) => options.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_options(&self, options: Options) {
        match self.options.lock() {
            Ok(mut current) => *current = options.clone(),
            Err(poisoned) => *poisoned.into_inner() = options.clone(),
        }
        for mut state in self.documents.iter_mut() {
            let state = &mut *state;
            state.document.set_options(options.clone());
            state.session.set_options(&options);
        }
    }

    /// Runs `f` against the document at `uri`, if it is open.
    fn with_document<T>(&self, uri: &Url, f: impl FnOnce(&StructuralDocument) -> T) -> Option<T> {
        self.documents.get(uri).map(|state| f(&state.document))
    }

    /// Validates `uri` once the configured quiet interval has passed without
    /// another call for the same document.
    fn schedule_validation(&self, uri: &Url) {
        let documents = self.documents.clone();
        let client = self.client.clone();
        let task_uri = uri.clone();
        if let Some(mut state) = self.documents.get_mut(uri) {
            state.session.schedule_validation(async move {
                publish_diagnostics(&client, &documents, task_uri).await;
            });
        }
    }

    fn apply_changes(
        &self,
        uri: &Url,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Option<btex_core::TextEdit> {
        let mut state = self.documents.get_mut(uri)?;
        let state = &mut *state;
        let single = changes.len() == 1;
        let mut rename = None;

        for change in changes {
            let Some(range) = change.range else {
                state.document.set_text(&change.text);
                continue;
            };
            let edit = btex_core::TextEdit::new(to_core_range(range), change.text);
            let reanalysis = state.document.apply_edit(&edit);
            log::trace!("{uri}: {reanalysis:?}");

            if single && edit.is_line_local() && self.rename_sync.load(Ordering::Relaxed) {
                let cursor = btex_syntax::Position::new(
                    edit.range.start_line,
                    edit.range.start_column + edit.text.encode_utf16().count() as u32,
                );
                rename = state
                    .session
                    .previous_line(cursor.line)
                    .and_then(|previous| {
                        assist::sync_environment_rename(&state.document, previous, cursor)
                    });
            }
        }

        state.session.record(&state.document);
        rename
    }
}

async fn publish_diagnostics(client: &Client, documents: &DashMap<Url, DocumentState>, uri: Url) {
    let diagnostics = {
        let Some(mut state) = documents.get_mut(&uri) else {
            return;
        };
        let state = &mut *state;
        if !state.session.validate_now(&state.document) {
            return;
        }
        state
            .session
            .board()
            .iter()
            .map(|(owner, diagnostic)| to_lsp_diagnostic(owner, diagnostic))
            .collect::<Vec<_>>()
    };
    log::debug!("publishing {} diagnostics for {uri}", diagnostics.len());
    client.publish_diagnostics(uri, diagnostics, None).await;
}

fn mode_detail(document: &StructuralDocument, position: btex_syntax::Position) -> String {
    format!("{} mode", document.detect_mode(position))
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(value) = params.initialization_options {
            match Options::from_json_value(value) {
                Ok(options) => self.set_options(options),
                Err(e) => log::warn!("ignoring initializationOptions: {e}"),
            }
        }

        let linked_editing = params
            .capabilities
            .text_document
            .as_ref()
            .and_then(|caps| caps.linked_editing_range.as_ref())
            .is_some();
        self.rename_sync.store(!linked_editing, Ordering::Relaxed);

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "btexd".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                document_highlight_provider: Some(OneOf::Left(true)),
                linked_editing_range_provider: Some(LinkedEditingRangeServerCapabilities::Simple(
                    true,
                )),
                document_on_type_formatting_provider: Some(DocumentOnTypeFormattingOptions {
                    first_trigger_character: "}".to_string(),
                    more_trigger_character: Some(vec!["$".to_string()]),
                }),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec!["\\".to_string(), "{".to_string()]),
                    ..Default::default()
                }),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![DETECT_MODE_COMMAND.to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("btexd initialized");
        self.client
            .log_message(MessageType::INFO, "btexd initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        for mut state in self.documents.iter_mut() {
            state.session.cancel_validation();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let options = self.options();
        let document = StructuralDocument::new(&params.text_document.text, options.clone());
        let mut session = EditorSession::new(&options);
        session.record(&document);
        let uri = params.text_document.uri;
        log::debug!("opened {uri} ({} lines)", document.line_count());
        self.documents
            .insert(uri.clone(), DocumentState { document, session });
        self.schedule_validation(&uri);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let rename = self.apply_changes(&uri, params.content_changes);

        if let Some(edit) = rename {
            let changes = HashMap::from([(uri.clone(), vec![to_lsp_edit(edit)])]);
            if let Err(e) = self.client.apply_edit(WorkspaceEdit::new(changes)).await {
                log::warn!("environment rename sync failed: {e}");
            }
        }
        self.schedule_validation(&uri);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if self.documents.remove(&uri).is_some() {
            self.client.publish_diagnostics(uri, Vec::new(), None).await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let settings = match params.settings {
            Value::Object(mut map) if map.contains_key("btex") => {
                map.remove("btex").unwrap_or_default()
            }
            other => other,
        };
        match Options::from_json_value(settings) {
            Ok(options) => {
                self.set_options(options);
                let uris: Vec<Url> = self.documents.iter().map(|e| e.key().clone()).collect();
                for uri in &uris {
                    self.schedule_validation(uri);
                }
            }
            Err(e) => {
                self.client
                    .log_message(MessageType::WARNING, format!("invalid btex settings: {e}"))
                    .await;
            }
        }
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = to_core_position(params.text_document_position_params.position);
        let pair = self
            .with_document(uri, |document| document.highlight(position))
            .flatten();
        Ok(pair.map(|pair| {
            [pair.open, pair.close]
                .into_iter()
                .map(|range| DocumentHighlight {
                    range: to_lsp_range(range),
                    kind: Some(DocumentHighlightKind::TEXT),
                })
                .collect()
        }))
    }

    async fn linked_editing_range(
        &self,
        params: LinkedEditingRangeParams,
    ) -> Result<Option<LinkedEditingRanges>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = to_core_position(params.text_document_position_params.position);
        let names = self
            .with_document(uri, |document| {
                assist::linked_environment_names(document, position)
            })
            .flatten();
        Ok(names.map(|ranges| LinkedEditingRanges {
            ranges: ranges.into_iter().map(to_lsp_range).collect(),
            word_pattern: Some(r"[^{}\\\s]*".to_string()),
        }))
    }

    async fn on_type_formatting(
        &self,
        params: DocumentOnTypeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = to_core_position(params.text_document_position.position);
        let edit = self
            .with_document(uri, |document| match params.ch.as_str() {
                "}" => assist::auto_close_environment(
                    document.line_prefix(position),
                    document.line_suffix(position),
                )
                .map(|text| btex_core::TextEdit::insert(position, text)),
                "$" => assist::complete_display_math(document, position),
                _ => None,
            })
            .flatten();
        Ok(edit.map(|edit| vec![to_lsp_edit(edit)]))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = to_core_position(params.text_document_position.position);
        let limit = self.options().suggestions_limit;

        let items = self.with_document(uri, |document| {
            let prefix = document.line_prefix(position);
            let detail = mode_detail(document, position);
            let mut items = Vec::new();

            if let Some(argument) = ENVIRONMENT_ARGUMENT.captures(prefix) {
                let closing = assist::closing_environment(document, position);
                if &argument[1] == "end" {
                    if let Some(name) = &closing {
                        items.push(CompletionItem {
                            label: format!("\\end{{{name}}}"),
                            kind: Some(CompletionItemKind::METHOD),
                            detail: Some(detail.clone()),
                            insert_text: Some(format!("{name}}}")),
                            preselect: Some(true),
                            ..Default::default()
                        });
                    }
                }
                items.extend(
                    assist::environment_names(document, limit)
                        .into_iter()
                        .filter(|name| closing.as_deref() != Some(name.as_str()))
                        .map(|name| CompletionItem {
                            insert_text: Some(format!("{name}}}")),
                            label: name,
                            kind: Some(CompletionItemKind::MODULE),
                            detail: Some(detail.clone()),
                            ..Default::default()
                        }),
                );
            } else if COMMAND_START.is_match(prefix) {
                if let Some(name) = assist::closing_environment(document, position) {
                    let label = format!("\\end{{{name}}}");
                    items.push(CompletionItem {
                        insert_text: Some(label[1..].to_string()),
                        label,
                        kind: Some(CompletionItemKind::METHOD),
                        detail: Some(detail),
                        ..Default::default()
                    });
                }
            }
            items
        });
        Ok(items.map(CompletionResponse::Array))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        match params.command.as_str() {
            DETECT_MODE_COMMAND => {
                let uri = params
                    .arguments
                    .first()
                    .and_then(Value::as_str)
                    .and_then(|s| Url::parse(s).ok())
                    .ok_or_else(|| Error::invalid_params("expected a document URI"))?;
                let position: Position = params
                    .arguments
                    .get(1)
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .ok_or_else(|| Error::invalid_params("expected a position"))?;
                let mode = self
                    .with_document(&uri, |document| {
                        document.detect_mode(to_core_position(position))
                    })
                    .ok_or_else(|| Error::invalid_params("document is not open"))?;
                Ok(Some(Value::String(mode.to_string())))
            }
            _ => Err(Error::method_not_found()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::LspService;

    fn setup() -> LspService<Backend> {
        let (service, _socket) = LspService::new(Backend::new);
        service
    }

    fn uri() -> Url {
        Url::parse("file:///test.btex").unwrap()
    }

    async fn open(backend: &Backend, text: &str) {
        backend
            .did_open(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri(),
                    language_id: "btex".to_string(),
                    version: 1,
                    text: text.to_string(),
                },
            })
            .await;
    }

    fn at(line: u32, character: u32) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri() },
            position: Position::new(line, character),
        }
    }

    #[tokio::test]
    async fn test_initialize_advertises_features() {
        let service = setup();
        let backend = service.inner();
        let result = backend
            .initialize(InitializeParams {
                initialization_options: Some(serde_json::json!({"suggestionsLimit": 3})),
                ..Default::default()
            })
            .await
            .unwrap();
        let caps = result.capabilities;
        assert_eq!(
            caps.text_document_sync,
            Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::INCREMENTAL))
        );
        assert!(caps.linked_editing_range_provider.is_some());
        assert_eq!(backend.options().suggestions_limit, 3);
        assert!(backend.rename_sync.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_incremental_changes() {
        let service = setup();
        let backend = service.inner();
        open(backend, "a\nb").await;

        backend
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier { uri: uri(), version: 2 },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(1, 1), Position::new(1, 1))),
                    range_length: None,
                    text: "{".to_string(),
                }],
            })
            .await;

        let state = backend.documents.get(&uri()).unwrap();
        assert_eq!(state.document.text(), "a\nb{");
        assert_eq!(state.session.previous_content(), "a\nb{");
        assert!(state.session.has_pending_validation());
    }

    #[tokio::test]
    async fn test_rename_sync_edits_partner() {
        let service = setup();
        let backend = service.inner();
        backend.rename_sync.store(true, Ordering::Relaxed);
        open(backend, "\\begin{ab}\n\\end{ab}").await;

        let rename = backend.apply_changes(
            &uri(),
            vec![TextDocumentContentChangeEvent {
                range: Some(Range::new(Position::new(0, 9), Position::new(0, 9))),
                range_length: None,
                text: "c".to_string(),
            }],
        );
        assert_eq!(
            rename,
            Some(btex_core::TextEdit::new(
                btex_syntax::Range::new(2, 6, 2, 8),
                "abc"
            ))
        );
        // The client applies the edit and reports it back as a change.
        let state = backend.documents.get(&uri()).unwrap();
        assert_eq!(state.document.text(), "\\begin{abc}\n\\end{ab}");
    }

    #[tokio::test]
    async fn test_document_highlight() {
        let service = setup();
        let backend = service.inner();
        open(backend, "a { b } c").await;

        let highlights = backend
            .document_highlight(DocumentHighlightParams {
                text_document_position_params: at(0, 4),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            })
            .await
            .unwrap()
            .unwrap();
        let ranges: Vec<Range> = highlights.iter().map(|h| h.range).collect();
        assert_eq!(
            ranges,
            vec![
                Range::new(Position::new(0, 2), Position::new(0, 3)),
                Range::new(Position::new(0, 6), Position::new(0, 7)),
            ]
        );
    }

    #[tokio::test]
    async fn test_linked_editing_range() {
        let service = setup();
        let backend = service.inner();
        open(backend, "\\begin{proof}\n\\end{proof}").await;

        let ranges = backend
            .linked_editing_range(LinkedEditingRangeParams {
                text_document_position_params: at(0, 8),
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            ranges.ranges,
            vec![
                Range::new(Position::new(0, 7), Position::new(0, 12)),
                Range::new(Position::new(1, 5), Position::new(1, 10)),
            ]
        );
    }

    #[tokio::test]
    async fn test_on_type_formatting_closes_environment() {
        let service = setup();
        let backend = service.inner();
        open(backend, "\\begin{proof}").await;

        let edits = backend
            .on_type_formatting(DocumentOnTypeFormattingParams {
                text_document_position: at(0, 13),
                ch: "}".to_string(),
                options: FormattingOptions::default(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edits[0].new_text, "\\end{proof}");
        assert_eq!(edits[0].range.start, Position::new(0, 13));
    }

    #[tokio::test]
    async fn test_completion_offers_closing_environment() {
        let service = setup();
        let backend = service.inner();
        open(backend, "\\begin{align}\n\\end{").await;

        let response = backend
            .completion(CompletionParams {
                text_document_position: at(1, 5),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
                context: None,
            })
            .await
            .unwrap();
        let Some(CompletionResponse::Array(items)) = response else {
            panic!("expected completion items");
        };
        assert_eq!(items[0].label, "\\end{align}");
        assert_eq!(items[0].insert_text.as_deref(), Some("align}"));
        assert_eq!(items[0].detail.as_deref(), Some("math mode"));
    }

    #[tokio::test]
    async fn test_detect_mode_command() {
        let service = setup();
        let backend = service.inner();
        open(backend, "$x$").await;

        let result = backend
            .execute_command(ExecuteCommandParams {
                command: DETECT_MODE_COMMAND.to_string(),
                arguments: vec![
                    Value::String(uri().to_string()),
                    serde_json::json!({"line": 0, "character": 1}),
                ],
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap();
        assert_eq!(result, Some(Value::String("math".to_string())));

        let missing = backend
            .execute_command(ExecuteCommandParams {
                command: DETECT_MODE_COMMAND.to_string(),
                arguments: vec![],
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_close_forgets_document() {
        let service = setup();
        let backend = service.inner();
        open(backend, "{").await;
        backend
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri() },
            })
            .await;
        assert!(!backend.documents.contains_key(&uri()));
    }
}
