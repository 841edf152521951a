use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::{Record, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    Closed,
    Create,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("'{0}' is required")]
    MissingRequired(String),
}

/// The record currently open for creation or editing in the page's one
/// modal, with its working form values.
///
/// Lifecycle: `closed → create|edit` on user action, back to `closed` on
/// cancel or successful save. A failed save keeps the session open in
/// the same mode with the error attached, so the user can correct input
/// without re-entering every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EditSession {
    mode: EditMode,
    target_id: Option<RecordId>,
    form_values: Map<String, Value>,
    saving: bool,
    validation_error: Option<String>,
}

impl EditSession {
    #[must_use]
    pub const fn mode(&self) -> EditMode {
        self.mode
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.mode, EditMode::Closed)
    }

    #[must_use]
    pub const fn is_saving(&self) -> bool {
        self.saving
    }

    #[must_use]
    pub const fn target_id(&self) -> Option<&RecordId> {
        self.target_id.as_ref()
    }

    #[must_use]
    pub const fn form_values(&self) -> &Map<String, Value> {
        &self.form_values
    }

    #[must_use]
    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    pub fn open_create(&mut self, defaults: &Map<String, Value>) {
        *self = Self {
            mode: EditMode::Create,
            target_id: None,
            form_values: defaults.clone(),
            saving: false,
            validation_error: None,
        };
    }

    /// Only declared-editable fields populate the form; read-only and
    /// system fields stay on the underlying record. Editable fields the
    /// record lacks are seeded empty so the form shape is stable.
    pub fn open_edit(&mut self, record: &Record, editable_fields: &[String]) {
        let mut form_values = Map::new();
        for field in editable_fields {
            let value = record
                .get(field)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            form_values.insert(field.clone(), value);
        }
        *self = Self {
            mode: EditMode::Edit,
            target_id: Some(record.id().clone()),
            form_values,
            saving: false,
            validation_error: None,
        };
    }

    /// Shallow form update; validation is deferred to save.
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        if !self.is_open() || self.saving {
            return;
        }
        self.form_values.insert(key.into(), value);
    }

    /// Every required field must hold a non-empty string. On violation
    /// the error is recorded and the caller must not submit.
    pub fn validate(&mut self, required_fields: &[String]) -> Result<(), FormError> {
        for field in required_fields {
            let filled = matches!(
                self.form_values.get(field),
                Some(Value::String(s)) if !s.trim().is_empty()
            );
            if !filled {
                let error = FormError::MissingRequired(field.clone());
                self.validation_error = Some(error.to_string());
                return Err(error);
            }
        }
        self.validation_error = None;
        Ok(())
    }

    pub fn begin_save(&mut self) {
        self.saving = true;
        self.validation_error = None;
    }

    /// Save failed: stay open in the same mode with the message attached.
    pub fn fail_save(&mut self, message: impl Into<String>) {
        self.saving = false;
        self.validation_error = Some(message.into());
    }

    /// Save confirmed by the server: the session closes.
    pub fn complete_save(&mut self) {
        *self = Self::default();
    }

    /// Explicit cancel; resets unconditionally.
    pub fn close(&mut self) {
        *self = Self::default();
    }
}
