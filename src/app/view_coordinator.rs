//! Loads the active table's view and persists edits to it.
//!
//! Edits apply to the local [`ViewState`] at once. Each edit that changes
//! something sends the changed fields with `updateView` and bumps a revision;
//! only the response to the latest revision may roll the local state back.

use crate::model::{View, ViewConfig};
use crate::remote::{GetViewRequest, PendingCall, RemoteStore, UpdateViewRequest};
use crate::state::ViewState;
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of a view call, reported by [`ViewCoordinator::poll`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ViewEvent {
    Loaded { view_id: String },
    LoadFailed { message: String },
    Saved { view_id: String },
    /// The latest save failed; the last persisted configuration is back.
    Restored { message: String },
}

pub struct ViewCoordinator {
    store: Arc<dyn RemoteStore>,
    base_id: String,
    persisted: Option<View>,
    /// Revision of the save `persisted` came from.
    persisted_revision: u64,
    state: ViewState,
    revision: u64,
    loading: Option<PendingCall<View>>,
    saves: Vec<(u64, PendingCall<View>)>,
    /// Fields edited before the view loaded; they win over the loaded view.
    unsaved: UnsavedFields,
}

#[derive(Debug, Clone, Copy, Default)]
struct UnsavedFields {
    filters: bool,
    sorts: bool,
    hidden_columns: bool,
}

impl UnsavedFields {
    fn any(&self) -> bool {
        self.filters || self.sorts || self.hidden_columns
    }
}

impl ViewCoordinator {
    pub fn new(store: Arc<dyn RemoteStore>, base_id: &str) -> Self {
        Self {
            store,
            base_id: base_id.to_string(),
            persisted: None,
            persisted_revision: 0,
            state: ViewState::new(),
            revision: 0,
            loading: None,
            saves: Vec::new(),
            unsaved: UnsavedFields::default(),
        }
    }

    /// Fetches the default view of a table, dropping the current one.
    ///
    /// Edits made while the fetch is outstanding are applied on top of the
    /// loaded view and then saved.
    pub fn load(&mut self, table_id: &str) {
        self.reset();
        debug!("getTableView {}", table_id);
        self.loading = Some(self.store.get_table_view(GetViewRequest {
            base_id: self.base_id.clone(),
            table_id: table_id.to_string(),
        }));
    }

    /// Forgets the view; responses to earlier calls are ignored.
    pub fn reset(&mut self) {
        self.persisted = None;
        self.persisted_revision = 0;
        self.state = ViewState::new();
        self.revision = 0;
        self.loading = None;
        self.saves.clear();
        self.unsaved = UnsavedFields::default();
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn config(&self) -> &ViewConfig {
        self.state.config()
    }

    pub fn view_id(&self) -> Option<&str> {
        self.persisted.as_ref().map(|v| v.id.as_str())
    }

    pub fn persisted(&self) -> Option<&View> {
        self.persisted.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn has_pending_saves(&self) -> bool {
        !self.saves.is_empty()
    }

    /// Applies `edit` to the local view and persists whatever it changed.
    ///
    /// Before the view has loaded the change stays local until it loads.
    pub fn edit<R>(&mut self, edit: impl FnOnce(&mut ViewState) -> R) -> R {
        let before = self.state.config().clone();
        let out = edit(&mut self.state);
        let after = self.state.config();

        let filters = (after.filters != before.filters).then(|| after.filters.clone());
        let sorts = (after.sorts != before.sorts).then(|| after.sorts.clone());
        let hidden_columns = (after.hidden_columns != before.hidden_columns).then(|| after.hidden_columns.clone());
        if filters.is_none() && sorts.is_none() && hidden_columns.is_none() {
            return out;
        }
        let Some(view_id) = self.view_id().map(str::to_string) else {
            debug!("view not loaded; holding edit until it is");
            self.unsaved.filters |= filters.is_some();
            self.unsaved.sorts |= sorts.is_some();
            self.unsaved.hidden_columns |= hidden_columns.is_some();
            return out;
        };
        self.save(UpdateViewRequest {
            base_id: self.base_id.clone(),
            view_id,
            filters,
            sorts,
            hidden_columns,
        });
        out
    }

    fn save(&mut self, request: UpdateViewRequest) {
        self.revision += 1;
        debug!("updateView {} (revision {})", request.view_id, self.revision);
        let call = self.store.update_view(request);
        self.saves.push((self.revision, call));
    }

    /// Loaded configuration with the fields edited before the load kept.
    fn merge_unsaved(&mut self, view: &View) {
        let local = self.state.config().clone();
        let mut merged = view.config.clone();
        let unsaved = std::mem::take(&mut self.unsaved);
        if unsaved.filters {
            merged.filters = local.filters;
        }
        if unsaved.sorts {
            merged.sorts = local.sorts;
        }
        if unsaved.hidden_columns {
            merged.hidden_columns = local.hidden_columns;
        }
        if unsaved.any() {
            self.save(UpdateViewRequest {
                base_id: self.base_id.clone(),
                view_id: view.id.clone(),
                filters: unsaved.filters.then(|| merged.filters.clone()),
                sorts: unsaved.sorts.then(|| merged.sorts.clone()),
                hidden_columns: unsaved.hidden_columns.then(|| merged.hidden_columns.clone()),
            });
        }
        self.state = ViewState::from_config(merged);
    }

    /// Applies the results of view calls that have resolved.
    pub fn poll(&mut self) -> Vec<ViewEvent> {
        let mut events = Vec::new();

        if let Some(result) = self.loading.as_mut().and_then(PendingCall::try_take) {
            self.loading = None;
            match result {
                Ok(view) => {
                    debug!("view {} loaded for table {}", view.id, view.table_id);
                    self.merge_unsaved(&view);
                    events.push(ViewEvent::Loaded { view_id: view.id.clone() });
                    self.persisted = Some(view);
                }
                Err(err) => {
                    warn!("getTableView failed: {}", err);
                    events.push(ViewEvent::LoadFailed {
                        message: err.to_string(),
                    });
                }
            }
        }

        let mut done = Vec::new();
        self.saves.retain_mut(|(revision, call)| match call.try_take() {
            Some(result) => {
                done.push((*revision, result));
                false
            }
            None => true,
        });
        for (revision, result) in done {
            match result {
                Ok(view) => {
                    if revision > self.persisted_revision {
                        self.persisted_revision = revision;
                        events.push(ViewEvent::Saved { view_id: view.id.clone() });
                        self.persisted = Some(view);
                    }
                }
                Err(err) if revision == self.revision => {
                    warn!("updateView failed ({}); restoring the saved view", err);
                    if let Some(view) = &self.persisted {
                        self.state.set_config(view.config.clone());
                    }
                    events.push(ViewEvent::Restored {
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    debug!("superseded updateView (revision {}) failed: {}", revision, err);
                }
            }
        }
        events
    }
}
