use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Prefix for identifiers synthesized when a source record omits every
/// declared identifier field. Placeholder ids keep list rendering stable
/// but are never usable for mutations.
pub const PLACEHOLDER_PREFIX: &str = "row-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no record with identifier '{0}'")]
    NotFound(String),
    #[error("record '{0}' has no server identifier")]
    MissingIdentifier(String),
}

/// Renders an identifier value as an opaque string. Numeric ids are
/// stringified so client-generated and server-returned ids compare
/// equal regardless of JSON number/string drift.
#[must_use]
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolves a record's identifier through the declared alias list, in
/// declaration order.
#[must_use]
pub fn resolve_id(fields: &Map<String, Value>, aliases: &[String]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| fields.get(alias).and_then(id_text))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    placeholder_id: bool,
    fields: Map<String, Value>,
}

impl Record {
    fn from_value(value: Value, aliases: &[String], fallback_index: usize) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        match resolve_id(&fields, aliases) {
            Some(id) => Self {
                id: RecordId::new(id),
                placeholder_id: false,
                fields,
            },
            None => Self {
                id: RecordId::new(format!("{PLACEHOLDER_PREFIX}{fallback_index}")),
                placeholder_id: true,
                fields,
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// False when the identifier is a synthesized `row-<n>` placeholder.
    #[must_use]
    pub fn has_server_id(&self) -> bool {
        !self.placeholder_id
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn matches_id(&self, candidate: &str, aliases: &[String]) -> bool {
        if self.id.as_str() == candidate {
            return true;
        }
        aliases
            .iter()
            .filter_map(|alias| self.fields.get(alias).and_then(id_text))
            .any(|value| value == candidate)
    }

    fn merge(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpsertPosition {
    /// Newly created records surface first.
    #[default]
    Front,
    Back,
}

/// Ordered, identifier-unique collection of records for one resource on
/// one page. Mutation only through the operations below; never performs
/// I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordStore {
    id_aliases: Vec<String>,
    records: Vec<Record>,
    placeholder_seq: usize,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(vec!["id".to_string()])
    }
}

impl RecordStore {
    #[must_use]
    pub fn new(id_aliases: Vec<String>) -> Self {
        let id_aliases = if id_aliases.is_empty() {
            vec!["id".to_string()]
        } else {
            id_aliases
        };
        Self {
            id_aliases,
            records: Vec::new(),
            placeholder_seq: 0,
        }
    }

    #[must_use]
    pub fn id_aliases(&self) -> &[String] {
        &self.id_aliases
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Discards prior contents and loads a bulk payload in order.
    /// A later occurrence of an already-seen identifier merges into the
    /// first occurrence instead of duplicating it.
    pub fn replace_all(&mut self, items: Vec<Value>) {
        self.records = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let record = Record::from_value(item, &self.id_aliases, index);
            let existing = self
                .records
                .iter_mut()
                .find(|r| r.id.as_str() == record.id.as_str());
            match existing {
                Some(prior) => prior.merge(&record.fields),
                None => self.records.push(record),
            }
        }
        self.placeholder_seq = self.records.len();
    }

    /// Shallow-merges `fields` over the record with the given identifier,
    /// preserving fields absent from the patch; inserts a new record at
    /// `position` when the identifier is unknown.
    pub fn upsert(&mut self, id: RecordId, fields: Map<String, Value>, position: UpsertPosition) {
        let aliases = self.id_aliases.clone();
        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.matches_id(id.as_str(), &aliases))
        {
            existing.merge(&fields);
            return;
        }

        let record = Record {
            id,
            placeholder_id: false,
            fields,
        };
        match position {
            UpsertPosition::Front => self.records.insert(0, record),
            UpsertPosition::Back => self.records.push(record),
        }
    }

    /// Removes the record whose identifier (primary or alias) equals
    /// `id`, comparing as strings. No-op when absent.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        let aliases = self.id_aliases.clone();
        self.records.retain(|r| !r.matches_id(id, &aliases));
        before != self.records.len()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.matches_id(id, &self.id_aliases))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Pre-mutation guard: the record must exist and carry a usable
    /// (non-placeholder) identifier before any network call is issued.
    pub fn require_actionable(&self, id: &str) -> Result<&Record, StoreError> {
        let record = self.get(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !record.has_server_id() {
            return Err(StoreError::MissingIdentifier(id.to_string()));
        }
        Ok(record)
    }
}
