//! Orthography Language Server.
//!
//! Hosts the overlay for editors that speak LSP: open documents are kept as
//! line buffers, edits trigger a debounced remote check, highlights are
//! published as diagnostics and replacements are offered as code actions
//! that the server applies itself and forwards as workspace edits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use dashmap::DashMap;
use globset::GlobSet;
use ortho_core::cycle::{NO_ISSUES_NOTICE, SERVER_ERROR_NOTICE};
use ortho_core::{
    CheckCycle, CycleSignal, Debouncer, HttpChecker, LineBuffer, Mark, Pending,
    Position as CorePosition, Range as CoreRange, ReplaceOutcome, Settings, TextBuffer,
    DEFAULT_CONFIG_FILE,
};
use serde_json::{json, Map, Value};
use tokio::sync::{oneshot, RwLock};
use tower_lsp::jsonrpc::{Error as RpcError, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const SOURCE: &str = "orthography";
const CMD_RUN: &str = "orthography.run";
const CMD_CLOSE: &str = "orthography.close";
const CMD_REPLACE: &str = "orthography.replace";
const CMD_FOCUS: &str = "orthography.focus";
const NOT_OPEN_FILE: &str = "Please open a file first.";

/// Document state cached by the server.
struct DocumentState {
    buffer: LineBuffer,
    version: i32,
}

/// The check cycle and the one document it is attached to.
struct Session {
    uri: Option<Url>,
    cycle: CheckCycle<HttpChecker>,
}

/// Orthography Language Server backend.
#[derive(Clone)]
struct Backend {
    client: Client,
    documents: Arc<DashMap<Url, DocumentState>>,
    session: Arc<Mutex<Session>>,
    settings: Arc<RwLock<Settings>>,
    exclude: Arc<RwLock<Option<GlobSet>>>,
    overrides: Arc<RwLock<Map<String, Value>>>,
    workspace_root: Arc<RwLock<Option<PathBuf>>>,
    config_path: Arc<RwLock<Option<PathBuf>>>,
    edit_debounce: Arc<Debouncer>,
    run_debounce: Arc<Debouncer>,
}

/// Records the edits the replacement engine makes so they can be sent to
/// the client.
struct RecordingBuffer<'a> {
    buffer: &'a mut LineBuffer,
    edits: Vec<TextEdit>,
}

impl TextBuffer for RecordingBuffer<'_> {
    fn line_count(&self) -> usize {
        self.buffer.line_count()
    }

    fn line(&self, index: usize) -> Option<&str> {
        self.buffer.line(index)
    }

    fn replace_range(&mut self, from: CorePosition, to: CorePosition, text: &str) {
        let clamp = |pos: CorePosition| {
            let column = pos.column.min(self.buffer.line_len(pos.line));
            to_lsp_position(CorePosition::new(pos.line, column))
        };
        let range = Range {
            start: clamp(from),
            end: clamp(to),
        };
        self.edits.push(TextEdit {
            range,
            new_text: text.to_string(),
        });
        self.buffer.replace_range(from, to, text);
    }

    fn add_highlight(&mut self, range: CoreRange, tag: &str) {
        self.buffer.add_highlight(range, tag);
    }

    fn remove_highlight(&mut self, tag: &str) {
        self.buffer.remove_highlight(tag);
    }

    fn set_highlight_focus(&mut self, tag: &str, focused: bool) {
        self.buffer.set_highlight_focus(tag, focused);
    }
}

fn to_lsp_position(pos: CorePosition) -> Position {
    Position {
        line: pos.line as u32,
        character: pos.column as u32,
    }
}

fn to_lsp_range(range: CoreRange) -> Range {
    Range {
        start: to_lsp_position(range.from),
        end: to_lsp_position(range.to),
    }
}

fn apply_overrides(settings: &mut Settings, map: &Map<String, Value>) {
    if let Some(Value::String(endpoint)) = map.get("endpoint") {
        if !endpoint.trim().is_empty() {
            settings.endpoint = endpoint.trim().to_string();
        }
    }
    if let Some(ms) = map.get("debounceMs").and_then(Value::as_u64) {
        settings.debounce_ms = ms;
    }
    if let Some(Value::Bool(enabled)) = map.get("autoCheck") {
        settings.auto_check = *enabled;
    }
    if let Some(Value::Bool(enabled)) = map.get("shiftPendingOffsets") {
        settings.shift_pending_offsets = *enabled;
    }
}

impl Backend {
    fn new(client: Client) -> Self {
        let settings = Settings::default();
        let checker = Arc::new(HttpChecker::new(settings.endpoint.clone()));
        let cycle = CheckCycle::new(checker, &settings);
        Self {
            client,
            documents: Arc::new(DashMap::new()),
            session: Arc::new(Mutex::new(Session { uri: None, cycle })),
            edit_debounce: Arc::new(Debouncer::new(settings.debounce())),
            run_debounce: Arc::new(Debouncer::new(settings.rerun_debounce())),
            exclude: Arc::new(RwLock::new(None)),
            settings: Arc::new(RwLock::new(settings)),
            overrides: Arc::new(RwLock::new(Map::new())),
            workspace_root: Arc::new(RwLock::new(None)),
            config_path: Arc::new(RwLock::new(None)),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn reload_settings(&self) -> anyhow::Result<()> {
        let configured = self.config_path.read().await.clone();
        let root = self.workspace_root.read().await.clone();
        let resolved = configured.or_else(|| root.map(|r| r.join(DEFAULT_CONFIG_FILE)));

        let mut settings = match &resolved {
            Some(path) => Settings::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => Settings::default(),
        };
        apply_overrides(&mut settings, &*self.overrides.read().await);
        let exclude = settings
            .exclude_set()
            .context("Invalid exclude patterns")?;

        self.edit_debounce.set_delay(settings.debounce());
        self.run_debounce.set_delay(settings.rerun_debounce());
        {
            let mut session = self.session();
            session
                .cycle
                .set_checker(Arc::new(HttpChecker::new(settings.endpoint.clone())));
            session.cycle.configure(&settings);
        }
        info!(endpoint = %settings.endpoint, debounce_ms = settings.debounce_ms, "settings loaded");
        *self.exclude.write().await = exclude;
        *self.settings.write().await = settings;

        if let Some(path) = resolved {
            self.client
                .log_message(
                    MessageType::INFO,
                    format!("Orthography settings: {}", path.display()),
                )
                .await;
        }
        Ok(())
    }

    async fn reload_and_report(&self) {
        if let Err(err) = self.reload_settings().await {
            warn!("{err:#}");
            self.client
                .log_message(MessageType::ERROR, format!("{err:#}"))
                .await;
        }
    }

    async fn is_excluded(&self, uri: &Url) -> bool {
        let exclude = self.exclude.read().await;
        let Some(set) = exclude.as_ref() else {
            return false;
        };
        let Ok(path) = uri.to_file_path() else {
            return false;
        };
        let root = self.workspace_root.read().await.clone();
        let relative: &Path = match &root {
            Some(root) => path.strip_prefix(root).unwrap_or(path.as_path()),
            None => path.as_path(),
        };
        set.is_match(relative)
    }

    /// Attach the session to `uri`, clearing whatever the previous document
    /// showed.
    async fn activate(&self, uri: &Url) {
        let previous = {
            let mut session = self.session();
            if session.uri.as_ref() == Some(uri) {
                return;
            }
            session.uri.replace(uri.clone())
        };
        let Some(previous) = previous else {
            return;
        };
        if let Some(mut doc) = self.documents.get_mut(&previous) {
            self.session().cycle.close(&mut doc.buffer);
        }
        self.client
            .publish_diagnostics(previous, Vec::new(), None)
            .await;
    }

    fn schedule(&self, debouncer: &Debouncer, uri: Url) {
        let this = self.clone();
        debouncer.trigger(async move {
            this.run_check(uri).await;
        });
    }

    /// One full check of `uri`. The session lock is released while the
    /// request is in flight.
    async fn run_check(&self, uri: Url) -> Option<CycleSignal> {
        self.activate(&uri).await;
        let pending = {
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                return None;
            };
            self.session().cycle.begin(&mut doc.buffer)
        };
        debug!(%uri, generation = pending.generation(), "check dispatched");
        let outcome = pending.run().await;

        let signal = {
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                return None;
            };
            let mut session = self.session();
            if session.uri.as_ref() != Some(&uri) {
                return Some(CycleSignal::Superseded);
            }
            session.cycle.complete(outcome, &mut doc.buffer)
        };

        match &signal {
            CycleSignal::Superseded => {}
            CycleSignal::Presented(_) => self.publish(&uri).await,
            CycleSignal::NoIssues => {
                self.publish(&uri).await;
                self.client
                    .show_message(MessageType::INFO, NO_ISSUES_NOTICE)
                    .await;
            }
            CycleSignal::ServiceUnreachable => {
                self.publish(&uri).await;
                self.client
                    .show_message(MessageType::ERROR, SERVER_ERROR_NOTICE)
                    .await;
            }
        }
        Some(signal)
    }

    /// Diagnostics for every painted highlight of the active document.
    fn diagnostics(&self, uri: &Url) -> (Vec<Diagnostic>, Option<i32>) {
        let Some(doc) = self.documents.get(uri) else {
            return (Vec::new(), None);
        };
        let session = self.session();
        if session.uri.as_ref() != Some(uri) {
            return (Vec::new(), Some(doc.version));
        }
        let generation = session.cycle.generation();
        let diagnostics = session
            .cycle
            .issues()
            .iter()
            .filter_map(|pending| {
                let id = pending.highlight?;
                let mark = doc.buffer.highlight(&id.tag())?;
                Some(to_diagnostic(pending, mark, generation))
            })
            .collect();
        (diagnostics, Some(doc.version))
    }

    async fn publish(&self, uri: &Url) {
        let (diagnostics, version) = self.diagnostics(uri);
        self.client
            .publish_diagnostics(uri.clone(), diagnostics, version)
            .await;
    }

    async fn active_uri(&self) -> Option<Url> {
        self.session().uri.clone()
    }

    async fn command_run(&self, args: &[Value]) -> Result<Option<Value>> {
        let uri = match args.first().and_then(|v| v.as_str()) {
            Some(raw) => Some(Url::parse(raw).map_err(|_| RpcError::invalid_params("bad uri"))?),
            None => self.active_uri().await,
        };
        let Some(uri) = uri.filter(|uri| self.documents.contains_key(uri)) else {
            self.client
                .show_message(MessageType::WARNING, NOT_OPEN_FILE)
                .await;
            return Ok(None);
        };
        // Answer with the list of the check this request started. A later
        // run aborts this one while it is still waiting out the debounce.
        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        self.run_debounce.trigger(async move {
            let _ = tx.send(this.run_check(uri).await);
        });
        match rx.await {
            Ok(Some(CycleSignal::Superseded)) | Ok(None) | Err(_) => Ok(None),
            Ok(Some(_)) => Ok(Some(issue_list(&self.session()))),
        }
    }

    async fn command_close(&self) -> Result<Option<Value>> {
        self.edit_debounce.cancel();
        self.run_debounce.cancel();
        let uri = self.session().uri.take();
        if let Some(uri) = uri {
            if let Some(mut doc) = self.documents.get_mut(&uri) {
                self.session().cycle.close(&mut doc.buffer);
            }
            self.client.publish_diagnostics(uri, Vec::new(), None).await;
        }
        Ok(None)
    }

    async fn command_replace(&self, args: &[Value]) -> Result<Option<Value>> {
        let (uri, slot, replacement, generation) = parse_replace_args(args)
            .ok_or_else(|| RpcError::invalid_params("expected [uri, slot, replacement, generation]"))?;

        let (outcome, edits, before) = {
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                return Ok(None);
            };
            let mut session = self.session();
            if session.uri.as_ref() != Some(&uri) || session.cycle.generation() != generation {
                debug!(%uri, slot, "replacement for a stale check ignored");
                return Ok(None);
            }
            let before = doc.buffer.text();
            let mut recorder = RecordingBuffer {
                buffer: &mut doc.buffer,
                edits: Vec::new(),
            };
            let outcome = session.cycle.replace(slot, &replacement, &mut recorder);
            (outcome, recorder.edits, before)
        };

        if !edits.is_empty() {
            let mut changes = HashMap::new();
            changes.insert(uri.clone(), edits);
            let applied = self
                .client
                .apply_edit(WorkspaceEdit {
                    changes: Some(changes),
                    ..Default::default()
                })
                .await;
            let rejected = match applied {
                Ok(response) if response.applied => None,
                Ok(response) => Some(response.failure_reason.unwrap_or_default()),
                Err(err) => Some(err.to_string()),
            };
            if let Some(reason) = rejected {
                warn!(%uri, %reason, "client rejected edit");
                if let Some(mut doc) = self.documents.get_mut(&uri) {
                    roll_back(&mut doc, &mut self.session(), &before);
                }
                self.publish(&uri).await;
                self.client
                    .show_message(
                        MessageType::WARNING,
                        "The replacement could not be applied; re-run the check.",
                    )
                    .await;
                return Ok(Some(json!({ "outcome": "Rejected" })));
            }
        }

        match outcome {
            ReplaceOutcome::Applied { .. } => self.publish(&uri).await,
            ReplaceOutcome::Exhausted => {
                self.publish(&uri).await;
                self.client
                    .log_message(
                        MessageType::INFO,
                        format!("All issues resolved; run `{CMD_RUN}` to check again."),
                    )
                    .await;
            }
            ReplaceOutcome::Missed => {
                self.client
                    .log_message(
                        MessageType::WARNING,
                        "The flagged text moved; re-run the check.",
                    )
                    .await;
            }
            ReplaceOutcome::Unknown => {}
        }
        Ok(Some(json!({ "outcome": format!("{outcome:?}") })))
    }

    async fn command_focus(&self, args: &[Value]) -> Result<Option<Value>> {
        let uri = args
            .first()
            .and_then(|v| v.as_str())
            .and_then(|raw| Url::parse(raw).ok());
        let slot = args.get(1).and_then(Value::as_u64).map(|s| s as usize);
        let (Some(uri), Some(slot)) = (uri, slot) else {
            return Err(RpcError::invalid_params("expected [uri, slot]"));
        };

        let selection = {
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                return Ok(None);
            };
            let mut session = self.session();
            if session.uri.as_ref() != Some(&uri) || !session.cycle.focus(slot, &mut doc.buffer) {
                return Ok(None);
            }
            session
                .cycle
                .issues()
                .get(slot)
                .and_then(|p| p.highlight)
                .and_then(|id| doc.buffer.highlight(&id.tag()))
                .map(|mark| to_lsp_range(mark.range))
        };

        if let Some(selection) = selection {
            let shown = self
                .client
                .show_document(ShowDocumentParams {
                    uri,
                    external: Some(false),
                    take_focus: Some(true),
                    selection: Some(selection),
                })
                .await;
            if let Err(err) = shown {
                debug!("show_document failed: {err}");
            }
        }
        Ok(None)
    }

}

/// Issue list for the presentation layer, including issues that could not
/// be highlighted.
fn issue_list(session: &Session) -> Value {
    let items: Vec<Value> = session
        .cycle
        .presented()
        .into_iter()
        .map(|pending| {
            json!({
                "slot": pending.slot,
                "highlight": pending.highlight.map(|id| id.tag()),
                "issue": pending.issue,
                "suggestions": pending.issue.suggestions(),
            })
        })
        .collect();
    json!({
        "uri": session.uri.as_ref().map(Url::to_string),
        "generation": session.cycle.generation(),
        "issues": items,
    })
}

/// Take a full-text change into `doc`. Returns `false` when the text is
/// what the buffer already holds, which is how the echo of a server-applied
/// replacement arrives; the presented issues stay then.
fn sync_document(
    doc: &mut DocumentState,
    session: &mut Session,
    uri: &Url,
    version: i32,
    text: &str,
) -> bool {
    doc.version = version;
    if doc.buffer.text() == text {
        return false;
    }
    if session.uri.as_ref() == Some(uri) {
        session.cycle.invalidate(&mut doc.buffer);
    }
    doc.buffer.set_text(text);
    true
}

/// Undo a replacement the client refused: drop the presentation and put
/// the text back to what the client still has.
fn roll_back(doc: &mut DocumentState, session: &mut Session, text: &str) {
    session.cycle.invalidate(&mut doc.buffer);
    doc.buffer.set_text(text);
}

fn parse_replace_args(args: &[Value]) -> Option<(Url, usize, String, u64)> {
    let uri = Url::parse(args.first()?.as_str()?).ok()?;
    let slot = args.get(1)?.as_u64()? as usize;
    let replacement = args.get(2)?.as_str()?.to_string();
    let generation = args.get(3)?.as_u64()?;
    Some((uri, slot, replacement, generation))
}

/// Convert a painted issue to an LSP diagnostic.
fn to_diagnostic(pending: &Pending, mark: &Mark, generation: u64) -> Diagnostic {
    let issue = &pending.issue;
    let severity = match issue.impact.as_str() {
        "critical" => DiagnosticSeverity::WARNING,
        _ => DiagnosticSeverity::INFORMATION,
    };

    let mut message = if issue.minicard_title.is_empty() {
        issue.explanation.clone()
    } else {
        format!("{}: {}", issue.minicard_title, issue.explanation)
    };
    if message.trim().is_empty() {
        message = format!("[{}] {}", issue.category, issue.highlight_text);
    }
    let suggestions: Vec<String> = issue
        .suggestions()
        .into_iter()
        .map(|s| s.replacement)
        .filter(|r| !r.is_empty())
        .collect();
    if !suggestions.is_empty() {
        message.push_str(" → ");
        message.push_str(&suggestions.join(" / "));
    }

    Diagnostic {
        range: to_lsp_range(mark.range),
        severity: Some(severity),
        code: Some(NumberOrString::String(issue.category.to_string())),
        code_description: None,
        source: Some(SOURCE.to_string()),
        message,
        related_information: None,
        tags: None,
        data: Some(json!({ "slot": pending.slot, "generation": generation })),
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(root_uri) = params.root_uri.or_else(|| {
            params
                .workspace_folders
                .as_ref()
                .and_then(|folders| folders.first().map(|f| f.uri.clone()))
        }) {
            if let Ok(path) = root_uri.to_file_path() {
                *self.workspace_root.write().await = Some(path);
            }
        }

        if let Some(Value::Object(map)) = params.initialization_options {
            self.apply_client_settings(map).await;
        }
        self.reload_and_report().await;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                        work_done_progress_options: WorkDoneProgressOptions {
                            work_done_progress: None,
                        },
                        resolve_provider: Some(false),
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![
                        CMD_RUN.to_string(),
                        CMD_CLOSE.to_string(),
                        CMD_REPLACE.to_string(),
                        CMD_FOCUS.to_string(),
                    ],
                    work_done_progress_options: WorkDoneProgressOptions {
                        work_done_progress: None,
                    },
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "Orthography Language Server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "Orthography LSP initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.edit_debounce.cancel();
        self.run_debounce.cancel();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.insert(
            uri.clone(),
            DocumentState {
                buffer: LineBuffer::new(&params.text_document.text),
                version: params.text_document.version,
            },
        );

        let auto_check = self.settings.read().await.auto_check;
        if auto_check && !self.is_excluded(&uri).await {
            self.schedule(&self.edit_debounce, uri);
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        // With FULL sync, we get the complete new content
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        let changed = {
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                return;
            };
            sync_document(&mut doc, &mut self.session(), &uri, version, &change.text)
        };
        if !changed {
            return;
        }

        self.publish(&uri).await;
        let auto_check = self.settings.read().await.auto_check;
        if auto_check && !self.is_excluded(&uri).await {
            self.schedule(&self.edit_debounce, uri);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some((_, mut doc)) = self.documents.remove(&uri) {
            let mut session = self.session();
            if session.uri.as_ref() == Some(&uri) {
                session.cycle.close(&mut doc.buffer);
                session.uri = None;
            }
        }
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        if let Value::Object(mut map) = params.settings {
            let map = match map.remove("orthography") {
                Some(Value::Object(nested)) => nested,
                _ => map,
            };
            self.apply_client_settings(map).await;
        }
        self.reload_and_report().await;
        if let Some(uri) = self.active_uri().await {
            self.publish(&uri).await;
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let config_path = self.config_path.read().await.clone();
        let touches_config = params.changes.iter().any(|change| match &config_path {
            Some(path) => change.uri.to_file_path().ok().as_ref() == Some(path),
            None => change.uri.path().ends_with(DEFAULT_CONFIG_FILE),
        });
        if touches_config {
            self.reload_and_report().await;
        }
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = &params.text_document.uri;
        let session = self.session();
        if session.uri.as_ref() != Some(uri) {
            return Ok(None);
        }

        let mut actions = Vec::new();
        for diag in &params.context.diagnostics {
            if diag.source.as_deref() != Some(SOURCE) {
                continue;
            }
            let Some(data) = diag.data.as_ref() else {
                continue;
            };
            let slot = data.get("slot").and_then(Value::as_u64).map(|s| s as usize);
            let generation = data.get("generation").and_then(Value::as_u64);
            let (Some(slot), Some(generation)) = (slot, generation) else {
                continue;
            };
            if generation != session.cycle.generation() {
                continue;
            }
            let Some(pending) = session.cycle.issues().get(slot) else {
                continue;
            };

            for (idx, suggestion) in pending.issue.suggestions().into_iter().enumerate() {
                let title = if suggestion.replacement.is_empty() {
                    format!("Remove \"{}\"", pending.issue.highlight_text)
                } else {
                    format!("Replace with \"{}\"", suggestion.replacement)
                };
                let command = Command {
                    title: title.clone(),
                    command: CMD_REPLACE.to_string(),
                    arguments: Some(vec![
                        json!(uri.to_string()),
                        json!(slot),
                        json!(suggestion.replacement),
                        json!(generation),
                    ]),
                };
                actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                    title,
                    kind: Some(CodeActionKind::QUICKFIX),
                    diagnostics: Some(vec![diag.clone()]),
                    edit: None,
                    command: Some(command),
                    is_preferred: Some(idx == 0),
                    disabled: None,
                    data: None,
                }));
            }
        }

        if actions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(actions))
        }
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        let args = params.arguments;
        match params.command.as_str() {
            CMD_RUN => self.command_run(&args).await,
            CMD_CLOSE => self.command_close().await,
            CMD_REPLACE => self.command_replace(&args).await,
            CMD_FOCUS => self.command_focus(&args).await,
            other => Err(RpcError::invalid_params(format!("unknown command `{other}`"))),
        }
    }
}

impl Backend {
    async fn apply_client_settings(&self, mut map: Map<String, Value>) {
        if let Some(Value::String(config_path)) = map.remove("configPath") {
            if config_path.trim().is_empty() {
                *self.config_path.write().await = None;
            } else {
                let configured = PathBuf::from(config_path);
                if configured.is_absolute() {
                    *self.config_path.write().await = Some(configured);
                } else if let Some(root) = self.workspace_root.read().await.clone() {
                    *self.config_path.write().await = Some(root.join(configured));
                }
            }
        }
        let mut overrides = self.overrides.write().await;
        for (key, value) in map {
            overrides.insert(key, value);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_env("ORTHO_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
