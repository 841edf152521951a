use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope;
use crate::record::RecordId;

/// The mutation families RemoteSync issues. Bulk fetch is tracked
/// separately so a failed edit never blanks the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Remove,
    SetStatus,
}

impl ActionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::SetStatus => "set_status",
        }
    }

    /// Whether this action was initiated from the edit modal, so a
    /// failure must also surface inside the open session.
    #[must_use]
    pub const fn is_modal(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

/// `loading`/`error` describe the bulk fetch; `action_loading`/
/// `action_error` the in-flight mutation. Kept separate so stale-but-
/// present data beats a blank table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncState {
    pub loading: bool,
    pub error: Option<String>,
    pub action_loading: bool,
    pub action_error: Option<String>,
}

impl SyncState {
    pub fn begin_fetch(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn fetch_succeeded(&mut self) {
        self.loading = false;
        self.error = None;
    }

    pub fn fetch_failed(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    pub fn begin_action(&mut self) {
        self.action_loading = true;
        self.action_error = None;
    }

    pub fn action_succeeded(&mut self) {
        self.action_loading = false;
        self.action_error = None;
    }

    pub fn action_failed(&mut self, message: impl Into<String>) {
        self.action_loading = false;
        self.action_error = Some(message.into());
    }
}

/// Bookkeeping for the in-flight bulk fetch; `candidate` indexes the
/// route currently being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFetch {
    pub candidate: usize,
}

/// Bookkeeping for the in-flight mutation. The payload is retained so
/// the action can be replayed against the next route candidate and so
/// the submitted fields participate in reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub target_id: Option<RecordId>,
    pub payload: Map<String, Value>,
    pub candidate: usize,
}

/// Post-mutation merge: server-returned fields win over client-submitted
/// fields; fields the server left untouched keep the submitted value.
/// (The store's upsert then preserves prior fields absent from both.)
#[must_use]
pub fn reconcile(submitted: &Map<String, Value>, server: Option<&Map<String, Value>>) -> Map<String, Value> {
    let mut merged = submitted.clone();
    if let Some(server) = server {
        for (key, value) in server {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

pub type HttpOutcome = crux_http::Result<crux_http::Response<Vec<u8>>>;

/// Collapses transport failure, non-2xx status and malformed payload
/// into one human-readable message, per the uniform failure contract.
pub(crate) fn response_body(result: HttpOutcome) -> Result<Vec<u8>, String> {
    match result {
        Ok(mut response) => {
            let status = u16::from(response.status());
            let body = response.take_body().unwrap_or_default();
            if (200..300).contains(&status) {
                Ok(body)
            } else {
                Err(envelope::error_message(&body, status))
            }
        }
        Err(error) => Err(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_reconcile_server_wins() {
        let submitted = map(&[("status", json!("approved")), ("note", json!("manual"))]);
        let server = map(&[("status", json!("confirmed")), ("updatedAt", json!("2024-01-01"))]);

        let merged = reconcile(&submitted, Some(&server));
        assert_eq!(merged.get("status"), Some(&json!("confirmed")));
        assert_eq!(merged.get("note"), Some(&json!("manual")));
        assert_eq!(merged.get("updatedAt"), Some(&json!("2024-01-01")));
    }

    #[test]
    fn test_reconcile_without_server_payload() {
        let submitted = map(&[("amount", json!("5"))]);
        assert_eq!(reconcile(&submitted, None), submitted);
    }

    #[test]
    fn test_fetch_and_action_slots_are_independent() {
        let mut sync = SyncState::default();
        sync.begin_fetch();
        sync.fetch_failed("backend down");
        sync.begin_action();
        sync.action_failed("rejected");

        assert_eq!(sync.error.as_deref(), Some("backend down"));
        assert_eq!(sync.action_error.as_deref(), Some("rejected"));

        sync.begin_fetch();
        assert!(sync.error.is_none());
        assert_eq!(sync.action_error.as_deref(), Some("rejected"));
    }

    #[test]
    fn test_modal_action_kinds() {
        assert!(ActionKind::Create.is_modal());
        assert!(ActionKind::Update.is_modal());
        assert!(!ActionKind::Remove.is_modal());
        assert!(!ActionKind::SetStatus.is_modal());
    }
}
