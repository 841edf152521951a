use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::capabilities::Capabilities;
use crate::config::ResourceConfig;
use crate::envelope;
use crate::query::{self, ListQueryState, SortDirection};
use crate::record::{self, RecordId, RecordStore, StoreError};
use crate::remote::{self, ActionKind, HttpOutcome, PendingAction, PendingFetch, SyncState};
use crate::session::{EditMode, EditSession};
use crate::AuthToken;

#[derive(Serialize, Deserialize)]
pub enum Event {
    // Page lifecycle
    PageMounted(Box<ResourceConfig>),
    PageClosed,
    AuthTokenProvided {
        token: Option<AuthToken>,
    },

    // Bulk fetch
    FetchRequested,

    // List controls
    SearchChanged {
        text: String,
    },
    SortRequested {
        key: String,
    },
    PageChanged {
        index: usize,
    },
    PageSizeChanged {
        size: usize,
    },

    // Modal editing
    CreateOpened,
    EditOpened {
        id: String,
    },
    FieldEdited {
        key: String,
        value: Value,
    },
    SaveRequested,
    EditCancelled,

    // Row actions
    DeleteRequested {
        id: String,
    },
    StatusChangeRequested {
        id: String,
        status: Value,
    },

    // Capability responses (boxed to keep the enum small; never sent by shells)
    #[serde(skip)]
    FetchResponse(Box<HttpOutcome>),
    #[serde(skip)]
    ActionResponse(Box<HttpOutcome>),
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PageMounted(_) => "page_mounted",
            Self::PageClosed => "page_closed",
            Self::AuthTokenProvided { .. } => "auth_token_provided",
            Self::FetchRequested => "fetch_requested",
            Self::SearchChanged { .. } => "search_changed",
            Self::SortRequested { .. } => "sort_requested",
            Self::PageChanged { .. } => "page_changed",
            Self::PageSizeChanged { .. } => "page_size_changed",
            Self::CreateOpened => "create_opened",
            Self::EditOpened { .. } => "edit_opened",
            Self::FieldEdited { .. } => "field_edited",
            Self::SaveRequested => "save_requested",
            Self::EditCancelled => "edit_cancelled",
            Self::DeleteRequested { .. } => "delete_requested",
            Self::StatusChangeRequested { .. } => "status_change_requested",
            Self::FetchResponse(_) => "fetch_response",
            Self::ActionResponse(_) => "action_response",
        }
    }
}

/// One page's entire state: its resource configuration, the record
/// store it exclusively owns, the derived-list controls, sync flags and
/// the modal session. Nothing here is shared across pages.
#[derive(Default)]
pub struct Model {
    pub config: Option<ResourceConfig>,
    /// Cleared on teardown; late responses are dropped once false.
    pub active: bool,
    pub auth_token: Option<AuthToken>,
    pub store: RecordStore,
    pub query: ListQueryState,
    pub sync: SyncState,
    pub session: EditSession,
    pub pending_fetch: Option<PendingFetch>,
    pub pending_action: Option<PendingAction>,
    /// Which route candidate last succeeded; non-zero values mean the
    /// backend is still serving a legacy route name.
    pub resolved_route: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnView {
    pub key: String,
    pub label: String,
    pub sorted: Option<SortDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowView {
    pub id: String,
    pub cells: Vec<String>,
    /// A mutation for this record is in flight; the shell must disable
    /// its row actions.
    pub busy: bool,
    /// False for placeholder-id records, which cannot be mutated.
    pub actionable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldView {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalView {
    pub mode: EditMode,
    pub fields: Vec<FieldView>,
    pub saving: bool,
    pub validation_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub title: String,
    pub configured: bool,
    pub columns: Vec<ColumnView>,
    pub rows: Vec<RowView>,
    pub total_count: usize,
    pub page_count: usize,
    pub page_index: usize,
    pub page_size: usize,
    pub search_text: String,
    pub loading: bool,
    pub fetch_error: Option<String>,
    pub can_retry: bool,
    /// The last fetch failed but earlier data is still on screen.
    pub showing_stale_data: bool,
    pub action_error: Option<String>,
    pub action_in_flight: bool,
    pub modal: Option<ModalView>,
}

fn display_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(other @ Value::Object(_)) => other.to_string(),
    }
}

fn display_form_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[derive(Default)]
pub struct App;

impl App {
    fn bearer(model: &Model) -> Option<String> {
        model
            .auth_token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose()))
    }

    fn send_fetch(model: &Model, caps: &Capabilities, candidate: usize) -> Result<(), String> {
        let config = model.config.as_ref().ok_or("page is not configured")?;
        let url = config
            .collection_url(candidate)
            .ok_or("no route candidate available")?;
        debug!(url = url.as_str(), "issuing bulk fetch");

        let mut builder = caps.http.get(&url);
        if let Some(bearer) = Self::bearer(model) {
            builder = builder.header("Authorization", bearer.as_str());
        }
        builder.send(|result| Event::FetchResponse(Box::new(result)));
        Ok(())
    }

    fn send_action(
        model: &Model,
        caps: &Capabilities,
        pending: &PendingAction,
    ) -> Result<(), String> {
        let config = model.config.as_ref().ok_or("page is not configured")?;
        let url = match (pending.kind, &pending.target_id) {
            (ActionKind::Create, _) => config.collection_url(pending.candidate),
            (_, Some(id)) => config.item_url(pending.candidate, id.as_str()),
            (_, None) => None,
        }
        .ok_or("no route candidate available")?;
        debug!(
            action = pending.kind.as_str(),
            url = url.as_str(),
            "issuing mutation"
        );

        let mut builder = match pending.kind {
            ActionKind::Create => caps.http.post(&url),
            ActionKind::Update | ActionKind::SetStatus => caps.http.put(&url),
            ActionKind::Remove => caps.http.delete(&url),
        };
        if let Some(bearer) = Self::bearer(model) {
            builder = builder.header("Authorization", bearer.as_str());
        }
        if pending.kind != ActionKind::Remove {
            builder = builder
                .body_json(&Value::Object(pending.payload.clone()))
                .map_err(|e| format!("could not serialize request body: {e}"))?;
        }
        builder.send(|result| Event::ActionResponse(Box::new(result)));
        Ok(())
    }

    fn begin_fetch(model: &mut Model, caps: &Capabilities) {
        if model.config.is_none() || model.pending_fetch.is_some() {
            return;
        }
        model.sync.begin_fetch();
        model.pending_fetch = Some(PendingFetch { candidate: 0 });
        if let Err(message) = Self::send_fetch(model, caps, 0) {
            model.pending_fetch = None;
            model.sync.fetch_failed(message);
        }
    }

    fn begin_action(model: &mut Model, caps: &Capabilities, pending: PendingAction) {
        model.sync.begin_action();
        model.pending_action = Some(pending.clone());
        if let Err(message) = Self::send_action(model, caps, &pending) {
            model.pending_action = None;
            Self::apply_action_failure(model, &pending, message);
        }
    }

    fn apply_action_success(model: &mut Model, pending: &PendingAction, body: &[u8]) {
        model.sync.action_succeeded();
        let Some(config) = &model.config else {
            return;
        };
        let server = envelope::record(body);

        match pending.kind {
            ActionKind::Create => {
                let merged = remote::reconcile(&pending.payload, server.as_ref());
                let id = record::resolve_id(&merged, model.store.id_aliases())
                    .map_or_else(RecordId::generate, RecordId::new);
                model.store.upsert(id, merged, config.insert_position());
                model.session.complete_save();
            }
            ActionKind::Update | ActionKind::SetStatus => {
                if let Some(id) = &pending.target_id {
                    let merged = remote::reconcile(&pending.payload, server.as_ref());
                    model.store.upsert(id.clone(), merged, config.insert_position());
                }
                if pending.kind.is_modal() {
                    model.session.complete_save();
                }
            }
            ActionKind::Remove => {
                if let Some(id) = &pending.target_id {
                    model.store.remove(id.as_str());
                }
            }
        }
    }

    fn apply_action_failure(model: &mut Model, pending: &PendingAction, message: String) {
        warn!(
            action = pending.kind.as_str(),
            error = message.as_str(),
            "mutation failed"
        );
        if pending.kind.is_modal() && model.session.is_saving() {
            model.session.fail_save(message.clone());
        }
        model.sync.action_failed(message);
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(event = event.name(), "handling event");

        match event {
            Event::PageMounted(config) => {
                model.store = RecordStore::new(config.id_aliases().to_vec());
                model.query = ListQueryState::new(config.page_size());
                model.sync = SyncState::default();
                model.session = EditSession::default();
                model.pending_fetch = None;
                model.pending_action = None;
                model.resolved_route = None;
                model.config = Some(*config);
                model.active = true;

                self.update(Event::FetchRequested, model, caps);
            }

            Event::PageClosed => {
                debug!("page torn down");
                model.active = false;
            }

            Event::AuthTokenProvided { token } => {
                model.auth_token = token;
            }

            Event::FetchRequested => {
                Self::begin_fetch(model, caps);
                caps.render.render();
            }

            Event::FetchResponse(result) => {
                if !model.active {
                    return;
                }
                let Some(pending) = model.pending_fetch.take() else {
                    return;
                };
                let candidate_count = model.config.as_ref().map_or(0, ResourceConfig::route_count);

                match remote::response_body(*result)
                    .and_then(|body| envelope::collection(&body))
                {
                    Ok(items) => {
                        model.store.replace_all(items);
                        model.sync.fetch_succeeded();
                        if pending.candidate > 0 {
                            warn!(
                                candidate = pending.candidate,
                                "bulk fetch succeeded via fallback route"
                            );
                        }
                        model.resolved_route = Some(pending.candidate);
                    }
                    Err(message) => {
                        let next = pending.candidate + 1;
                        if next < candidate_count {
                            warn!(
                                error = message.as_str(),
                                next_candidate = next,
                                "bulk fetch failed, trying next route"
                            );
                            model.pending_fetch = Some(PendingFetch { candidate: next });
                            if let Err(message) = Self::send_fetch(model, caps, next) {
                                model.pending_fetch = None;
                                model.sync.fetch_failed(message);
                            }
                        } else {
                            warn!(error = message.as_str(), "bulk fetch failed on every route");
                            model.sync.fetch_failed(message);
                        }
                    }
                }
                caps.render.render();
            }

            Event::SearchChanged { text } => {
                model.query.set_search(text);
                caps.render.render();
            }

            Event::SortRequested { key } => {
                model.query.toggle_sort(key);
                caps.render.render();
            }

            Event::PageChanged { index } => {
                model.query.set_page(index);
                caps.render.render();
            }

            Event::PageSizeChanged { size } => {
                model.query.set_page_size(size);
                caps.render.render();
            }

            Event::CreateOpened => {
                if model.sync.action_loading {
                    return;
                }
                let Some(config) = &model.config else {
                    return;
                };
                model.session.open_create(config.create_defaults());
                caps.render.render();
            }

            Event::EditOpened { id } => {
                if model.sync.action_loading {
                    return;
                }
                let Some(config) = &model.config else {
                    return;
                };
                match model.store.get(&id) {
                    Some(target) => model.session.open_edit(target, config.editable_fields()),
                    None => model.sync.action_error = Some(StoreError::NotFound(id).to_string()),
                }
                caps.render.render();
            }

            Event::FieldEdited { key, value } => {
                model.session.set_field(key, value);
                caps.render.render();
            }

            Event::SaveRequested => {
                if !model.session.is_open()
                    || model.session.is_saving()
                    || model.sync.action_loading
                {
                    return;
                }
                let Some(config) = model.config.clone() else {
                    return;
                };
                if model.session.validate(config.required_fields()).is_err() {
                    caps.render.render();
                    return;
                }

                let payload = model.session.form_values().clone();
                let pending = match model.session.mode() {
                    EditMode::Create => PendingAction {
                        kind: ActionKind::Create,
                        target_id: None,
                        payload,
                        candidate: 0,
                    },
                    EditMode::Edit => {
                        let Some(target) = model.session.target_id().cloned() else {
                            model.session.fail_save("no record selected for editing");
                            caps.render.render();
                            return;
                        };
                        if let Err(e) = model.store.require_actionable(target.as_str()) {
                            model.session.fail_save(e.to_string());
                            caps.render.render();
                            return;
                        }
                        PendingAction {
                            kind: ActionKind::Update,
                            target_id: Some(target),
                            payload,
                            candidate: 0,
                        }
                    }
                    EditMode::Closed => return,
                };

                model.session.begin_save();
                Self::begin_action(model, caps, pending);
                caps.render.render();
            }

            Event::EditCancelled => {
                model.session.close();
                caps.render.render();
            }

            Event::DeleteRequested { id } => {
                if model.sync.action_loading {
                    return;
                }
                match model.store.require_actionable(&id) {
                    Ok(_) => {
                        let pending = PendingAction {
                            kind: ActionKind::Remove,
                            target_id: Some(RecordId::new(id)),
                            payload: Map::new(),
                            candidate: 0,
                        };
                        Self::begin_action(model, caps, pending);
                    }
                    Err(e) => model.sync.action_error = Some(e.to_string()),
                }
                caps.render.render();
            }

            Event::StatusChangeRequested { id, status } => {
                if model.sync.action_loading {
                    return;
                }
                let Some(config) = &model.config else {
                    return;
                };
                match model.store.require_actionable(&id) {
                    Ok(_) => {
                        let mut payload = Map::new();
                        payload.insert(config.status_field().to_string(), status);
                        let pending = PendingAction {
                            kind: ActionKind::SetStatus,
                            target_id: Some(RecordId::new(id)),
                            payload,
                            candidate: 0,
                        };
                        Self::begin_action(model, caps, pending);
                    }
                    Err(e) => model.sync.action_error = Some(e.to_string()),
                }
                caps.render.render();
            }

            Event::ActionResponse(result) => {
                if !model.active {
                    return;
                }
                let Some(pending) = model.pending_action.take() else {
                    return;
                };
                let candidate_count = model.config.as_ref().map_or(0, ResourceConfig::route_count);

                match remote::response_body(*result) {
                    Ok(body) => {
                        if pending.candidate > 0 {
                            warn!(
                                candidate = pending.candidate,
                                action = pending.kind.as_str(),
                                "mutation succeeded via fallback route"
                            );
                        }
                        model.resolved_route = Some(pending.candidate);
                        Self::apply_action_success(model, &pending, &body);
                    }
                    Err(message) => {
                        let next = pending.candidate + 1;
                        if next < candidate_count {
                            warn!(
                                error = message.as_str(),
                                next_candidate = next,
                                "mutation failed, trying next route"
                            );
                            let retry = PendingAction {
                                candidate: next,
                                ..pending
                            };
                            model.pending_action = Some(retry.clone());
                            if let Err(message) = Self::send_action(model, caps, &retry) {
                                model.pending_action = None;
                                Self::apply_action_failure(model, &retry, message);
                            }
                        } else {
                            Self::apply_action_failure(model, &pending, message);
                        }
                    }
                }
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let Some(config) = &model.config else {
            return ViewModel {
                title: String::new(),
                configured: false,
                columns: Vec::new(),
                rows: Vec::new(),
                total_count: 0,
                page_count: 1,
                page_index: 1,
                page_size: model.query.page_size,
                search_text: model.query.search_text.clone(),
                loading: false,
                fetch_error: None,
                can_retry: false,
                showing_stale_data: false,
                action_error: None,
                action_in_flight: false,
                modal: None,
            };
        };

        let page = query::apply(&model.store, &model.query);
        let busy_id = model
            .pending_action
            .as_ref()
            .and_then(|pending| pending.target_id.as_ref())
            .map(RecordId::as_str);

        let columns: Vec<ColumnView> = config
            .columns()
            .iter()
            .map(|column| ColumnView {
                key: column.key.clone(),
                label: column.label.clone(),
                sorted: (model.query.sort_key.as_deref() == Some(column.key.as_str()))
                    .then_some(model.query.sort_direction),
            })
            .collect();

        let rows: Vec<RowView> = page
            .page_items
            .iter()
            .map(|item| RowView {
                id: item.id().as_str().to_string(),
                cells: config
                    .columns()
                    .iter()
                    .map(|column| display_cell(item.get(&column.key)))
                    .collect(),
                busy: busy_id == Some(item.id().as_str()),
                actionable: item.has_server_id(),
            })
            .collect();

        let modal = if model.session.is_open() {
            Some(ModalView {
                mode: model.session.mode(),
                fields: config
                    .editable_fields()
                    .iter()
                    .map(|field| FieldView {
                        key: field.clone(),
                        value: display_form_value(model.session.form_values().get(field)),
                    })
                    .collect(),
                saving: model.session.is_saving(),
                validation_error: model.session.validation_error().map(str::to_string),
            })
        } else {
            None
        };

        ViewModel {
            title: config.title().to_string(),
            configured: true,
            columns,
            rows,
            total_count: page.total_count,
            page_count: page.page_count,
            page_index: page.page_index,
            page_size: page.page_size,
            search_text: model.query.search_text.clone(),
            loading: model.sync.loading,
            fetch_error: model.sync.error.clone(),
            can_retry: model.sync.error.is_some() && !model.sync.loading,
            showing_stale_data: model.sync.error.is_some() && !model.store.is_empty(),
            action_error: model.sync.action_error.clone(),
            action_in_flight: model.sync.action_loading,
            modal,
        }
    }
}
