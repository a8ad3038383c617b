pub mod anchor;
pub mod coin;
pub mod memory;
pub mod postgres;
pub mod repository;

use alert_core::{outcome::UpdateOutcome, AlertError, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// A stored record: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Field holding the identifier assigned by the store itself, distinct from
/// the application `id`.
pub const STORAGE_ID_FIELD: &str = "_id";

/// Collection-scoped document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    async fn ping(&self) -> Result<()>;

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()>;

    /// Inserts every document or none of them.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64>;

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Shallow-merges `patch` into the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
    ) -> Result<UpdateOutcome>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Eq(String, Value),
    In(String, Vec<Value>),
    Exists(String),
}

/// Conjunction of field clauses. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    pub fn any_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            clauses: vec![Clause::In(
                field.into(),
                values.into_iter().map(Into::into).collect(),
            )],
        }
    }

    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(field.into(), value.into()));
        self
    }

    pub fn and_exists(mut self, field: impl Into<String>) -> Self {
        self.clauses.push(Clause::Exists(field.into()));
        self
    }

    /// Equality filter built from a partial record, one clause per field.
    pub fn from_document(document: Document) -> Self {
        Self {
            clauses: document
                .into_iter()
                .map(|(field, value)| Clause::Eq(field, value))
                .collect(),
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(field, expected) => document
                .get(field)
                .is_some_and(|actual| values_equal(actual, expected)),
            Clause::In(field, candidates) => document.get(field).is_some_and(|actual| {
                candidates
                    .iter()
                    .any(|candidate| values_equal(actual, candidate))
            }),
            Clause::Exists(field) => document.contains_key(field),
        })
    }
}

/// JSON equality that treats `105` and `105.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

pub fn to_document<T: Serialize>(record: &T) -> Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(document) => Ok(document),
        other => Err(AlertError::Serialization(serde::ser::Error::custom(
            format!("expected a JSON object, got {}", other),
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}
