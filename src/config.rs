use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::record::UpsertPosition;
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("page title cannot be empty")]
    EmptyTitle,
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("at least one route candidate is required")]
    NoRouteCandidates,
    #[error("route candidates cannot be empty")]
    EmptyRouteCandidate,
    #[error("identifier aliases cannot be empty")]
    EmptyIdAlias,
    #[error("invalid page size: {0}")]
    InvalidPageSize(usize),
    #[error("required field '{0}' is not editable")]
    RequiredFieldNotEditable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub key: String,
    pub label: String,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Per-page declaration of one resource family: where its collection
/// lives, how its records are identified, which columns the table shows
/// and which fields the modal edits. Columns are declared explicitly;
/// the table never introspects arbitrary record keys at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    title: String,
    base_url: String,
    /// Ordered route candidates; operations try them in declared order
    /// and accept the first non-error response. A compatibility
    /// affordance for historically-renamed backend routes, not a retry
    /// policy.
    route_candidates: Vec<String>,
    id_aliases: Vec<String>,
    columns: Vec<ColumnSpec>,
    editable_fields: Vec<String>,
    required_fields: Vec<String>,
    create_defaults: Map<String, Value>,
    status_field: String,
    page_size: usize,
    insert_position: UpsertPosition,
}

impl ResourceConfig {
    pub fn new(
        title: impl Into<String>,
        base_url: impl Into<String>,
        route_candidates: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ConfigError::EmptyTitle);
        }

        let base_url = base_url.into();
        let parsed = Url::parse(&base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url,
                reason: "missing host".to_string(),
            });
        }

        if route_candidates.is_empty() {
            return Err(ConfigError::NoRouteCandidates);
        }
        if route_candidates
            .iter()
            .any(|route| route.trim_matches('/').is_empty())
        {
            return Err(ConfigError::EmptyRouteCandidate);
        }

        Ok(Self {
            title,
            base_url,
            route_candidates,
            id_aliases: vec!["id".to_string()],
            columns: Vec::new(),
            editable_fields: Vec::new(),
            required_fields: Vec::new(),
            create_defaults: Map::new(),
            status_field: "status".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            insert_position: UpsertPosition::Front,
        })
    }

    pub fn with_id_aliases(mut self, aliases: Vec<String>) -> Result<Self, ConfigError> {
        if aliases.is_empty() || aliases.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigError::EmptyIdAlias);
        }
        self.id_aliases = aliases;
        Ok(self)
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self
    }

    #[must_use]
    pub fn with_editable_fields(mut self, fields: Vec<String>) -> Self {
        self.editable_fields = fields;
        self
    }

    /// Required fields must be declared editable first, or the form
    /// could never satisfy them.
    pub fn with_required_fields(mut self, fields: Vec<String>) -> Result<Self, ConfigError> {
        for field in &fields {
            if !self.editable_fields.contains(field) {
                return Err(ConfigError::RequiredFieldNotEditable(field.clone()));
            }
        }
        self.required_fields = fields;
        Ok(self)
    }

    #[must_use]
    pub fn with_create_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.create_defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_status_field(mut self, field: impl Into<String>) -> Self {
        self.status_field = field.into();
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::InvalidPageSize(size));
        }
        self.page_size = size.min(MAX_PAGE_SIZE);
        Ok(self)
    }

    #[must_use]
    pub fn with_insert_position(mut self, position: UpsertPosition) -> Self {
        self.insert_position = position;
        self
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.route_candidates.len()
    }

    #[must_use]
    pub fn id_aliases(&self) -> &[String] {
        &self.id_aliases
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    #[must_use]
    pub fn editable_fields(&self) -> &[String] {
        &self.editable_fields
    }

    #[must_use]
    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    #[must_use]
    pub fn create_defaults(&self) -> &Map<String, Value> {
        &self.create_defaults
    }

    #[must_use]
    pub fn status_field(&self) -> &str {
        &self.status_field
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn insert_position(&self) -> UpsertPosition {
        self.insert_position
    }

    /// Collection endpoint for the given route candidate.
    #[must_use]
    pub fn collection_url(&self, candidate: usize) -> Option<String> {
        let route = self.route_candidates.get(candidate)?;
        let mut url = Url::parse(&self.base_url).ok()?;
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments.pop_if_empty();
            segments.extend(route.split('/').filter(|s| !s.is_empty()));
        }
        Some(String::from(url))
    }

    /// Item endpoint (`<collection>/<id>`) for the given route candidate.
    /// The identifier is percent-encoded as a single path segment.
    #[must_use]
    pub fn item_url(&self, candidate: usize, id: &str) -> Option<String> {
        let route = self.route_candidates.get(candidate)?;
        let mut url = Url::parse(&self.base_url).ok()?;
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments.pop_if_empty();
            segments.extend(route.split('/').filter(|s| !s.is_empty()));
            segments.push(id);
        }
        Some(String::from(url))
    }
}
