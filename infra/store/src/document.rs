//! The stored record type.
//!
//! A [`Document`] is a JSON object. The store owns exactly one field of it, the
//! version counter kept under [`VERSION_FIELD`]; every other field is opaque.

use crate::error::DocStoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Deref;

/// Reserved field holding the version counter inside the encoded document.
pub const VERSION_FIELD: &str = "_version";

/// A structured record persisted under a key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts any serializable value into a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Encode`] if serialization fails and
    /// [`DocStoreError::NotADocument`] if the value does not serialize to an object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, DocStoreError> {
        let value = serde_json::to_value(value)
            .map_err(|source| DocStoreError::Encode { source, context: None })?;
        Self::try_from(value)
    }

    /// Deserializes the document (version field included) into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Decode`] if the fields do not match `T`.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, DocStoreError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|source| DocStoreError::Decode {
            source,
            context: Some("Document does not match the requested type".into()),
        })
    }

    /// The version counter, if the document carries a usable one.
    ///
    /// Anything other than a non-negative integer counts as "no counter".
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.0.get(VERSION_FIELD).and_then(Value::as_u64)
    }

    /// Overwrites the version counter, e.g. to rebase a write onto a fresh read.
    pub fn set_version(&mut self, version: u64) {
        self.0.insert(VERSION_FIELD.to_owned(), Value::from(version));
    }

    /// Drops the version counter so the next write targets version 1.
    pub fn clear_version(&mut self) {
        self.0.remove(VERSION_FIELD);
    }

    /// Inserts a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Bumps the counter to the version this write intends to commit.
    pub(crate) fn advance_version(&mut self) -> u64 {
        let next = self.version().map_or(1, |v| v.saturating_add(1));
        self.set_version(next);
        next
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, DocStoreError> {
        serde_json::to_vec(&self.0).map_err(|source| DocStoreError::Encode { source, context: None })
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, DocStoreError> {
        serde_json::from_slice::<Map<String, Value>>(bytes)
            .map(Self)
            .map_err(|source| DocStoreError::Decode { source, context: None })
    }
}

impl Deref for Document {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Self::Object(document.0)
    }
}

impl TryFrom<Value> for Document {
    type Error = DocStoreError;

    fn try_from(value: Value) -> Result<Self, DocStoreError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DocStoreError::NotADocument {
                message: kind_of(&other).into(),
                context: Some("document must be an object".into()),
            }),
        }
    }
}

pub(crate) const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
