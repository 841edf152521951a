#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod envelope;
pub mod query;
pub mod record;
pub mod remote;
pub mod session;

use serde::{Deserialize, Serialize};

pub use app::{App, ColumnView, Event, FieldView, ModalView, Model, RowView, ViewModel};
pub use capabilities::{Capabilities, Effect};
pub use config::{ColumnSpec, ConfigError, ResourceConfig};
pub use query::{ListPage, ListQueryState, SortDirection};
pub use record::{Record, RecordId, RecordStore, StoreError, UpsertPosition};
pub use remote::{ActionKind, PendingAction, PendingFetch, SyncState};
pub use session::{EditMode, EditSession, FormError};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 500;

/// Bearer token handed over by the shell's session layer. Redacts its
/// Debug output so tokens never land in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_token_debug_is_redacted() {
        let token = AuthToken::new("jwt-secret");
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(token.expose(), "jwt-secret");
    }
}
