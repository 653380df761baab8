//! Write payloads, atomic field sentinels and set options.
//!
//! Reads come back as plain [`bson::Document`]s. Writes go out as [`WriteData`],
//! whose values are either literal [`Bson`] or a [`Sentinel`] asking the store to
//! compute the value server-side.

use std::collections::{BTreeMap, btree_map};

use bson::{Bson, Document};

/// A numeric delta for [`Sentinel::Increment`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Double(f64),
}

impl From<i32> for Numeric {
    fn from(value: i32) -> Self {
        Numeric::Integer(value as i64)
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Numeric::Integer(value)
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Numeric::Double(value)
    }
}

impl From<Numeric> for Bson {
    fn from(value: Numeric) -> Self {
        match value {
            Numeric::Integer(i) => Bson::Int64(i),
            Numeric::Double(d) => Bson::Double(d),
        }
    }
}

/// Server-side atomic field operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Sentinel {
    /// Assign the store's current time.
    ServerTimestamp,
    /// Remove the field.
    Delete,
    /// Add the delta to the current numeric value.
    Increment(Numeric),
    /// Append each element not already present.
    ArrayUnion(Vec<Bson>),
    /// Remove every occurrence of each element.
    ArrayRemove(Vec<Bson>),
}

/// A value written to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Bson),
    Sentinel(Sentinel),
}

impl FieldValue {
    pub fn server_timestamp() -> Self {
        FieldValue::Sentinel(Sentinel::ServerTimestamp)
    }

    pub fn delete() -> Self {
        FieldValue::Sentinel(Sentinel::Delete)
    }

    pub fn increment(delta: impl Into<Numeric>) -> Self {
        FieldValue::Sentinel(Sentinel::Increment(delta.into()))
    }

    pub fn array_union(elements: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        FieldValue::Sentinel(Sentinel::ArrayUnion(elements.into_iter().map(Into::into).collect()))
    }

    pub fn array_remove(elements: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        FieldValue::Sentinel(Sentinel::ArrayRemove(elements.into_iter().map(Into::into).collect()))
    }

    /// Returns the literal value, if this is not a sentinel.
    pub fn as_value(&self) -> Option<&Bson> {
        match self {
            FieldValue::Value(value) => Some(value),
            FieldValue::Sentinel(_) => None,
        }
    }
}

impl<T: Into<Bson>> From<T> for FieldValue {
    fn from(value: T) -> Self {
        FieldValue::Value(value.into())
    }
}

impl From<Sentinel> for FieldValue {
    fn from(sentinel: Sentinel) -> Self {
        FieldValue::Sentinel(sentinel)
    }
}

/// A write payload: field name (or dotted field path, for updates) to value.
///
/// Keys are kept sorted so two payloads with the same content compare equal
/// regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteData {
    fields: BTreeMap<String, FieldValue>,
}

impl WriteData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, returning the payload for chaining.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Inserts a field, replacing and returning any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.fields.iter()
    }
}

impl IntoIterator for WriteData {
    type Item = (String, FieldValue);
    type IntoIter = btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a WriteData {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for WriteData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<Document> for WriteData {
    fn from(document: Document) -> Self {
        document.into_iter().collect()
    }
}

/// Options controlling how `set` treats an existing document.
///
/// The default is a full overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge the payload into the existing document instead of replacing it.
    pub merge: bool,
    /// Merge only these (dotted) field paths. Takes precedence over `merge`.
    pub merge_fields: Option<Vec<String>>,
}

impl SetOptions {
    pub fn merge_all() -> Self {
        Self { merge: true, merge_fields: None }
    }

    pub fn merge_fields(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            merge: false,
            merge_fields: Some(fields.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether the write behaves as a merge (flag or explicit field list).
    pub fn is_merge(&self) -> bool {
        self.merge || self.merge_fields.is_some()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn converts_documents_into_literal_fields() {
        let data = WriteData::from(doc! { "name": "x", "score": 3 });

        assert_eq!(data.len(), 2);
        assert_eq!(data.get("name"), Some(&FieldValue::Value(Bson::String("x".into()))));
        assert_eq!(data.get("score").and_then(FieldValue::as_value), Some(&Bson::Int32(3)));
    }

    #[test]
    fn merge_detection_covers_both_forms() {
        assert!(!SetOptions::default().is_merge());
        assert!(SetOptions::merge_all().is_merge());
        assert!(SetOptions::merge_fields(["score"]).is_merge());
    }
}
