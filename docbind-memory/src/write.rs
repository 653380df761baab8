//! Applying write payloads and sentinels to stored documents.

use bson::{Bson, DateTime, Document};

use docbind_core::{
    error::{StoreError, StoreResult},
    value::{FieldValue, Numeric, SetOptions, Sentinel, WriteData},
};

use crate::evaluator::values_equal;

/// Computes a sentinel's result from the field's current value.
///
/// `None` means the field is removed.
fn resolve(current: Option<&Bson>, sentinel: &Sentinel, now: DateTime) -> Option<Bson> {
    match sentinel {
        Sentinel::ServerTimestamp => Some(Bson::DateTime(now)),
        Sentinel::Delete => None,
        Sentinel::Increment(delta) => Some(increment(current, *delta)),
        Sentinel::ArrayUnion(elements) => {
            let mut items = current_array(current);
            for element in elements {
                if !items.iter().any(|item| values_equal(item, element)) {
                    items.push(element.clone());
                }
            }
            Some(Bson::Array(items))
        }
        Sentinel::ArrayRemove(elements) => {
            let mut items = current_array(current);
            items.retain(|item| !elements.iter().any(|element| values_equal(item, element)));
            Some(Bson::Array(items))
        }
    }
}

fn current_array(current: Option<&Bson>) -> Vec<Bson> {
    match current {
        Some(Bson::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Integer arithmetic (saturating) when both sides are integral, double otherwise.
/// A missing or non-numeric base counts as zero.
fn increment(current: Option<&Bson>, delta: Numeric) -> Bson {
    match (current, delta) {
        (Some(Bson::Int32(base)), Numeric::Integer(delta)) => {
            let sum = i64::from(*base).saturating_add(delta);
            i32::try_from(sum).map(Bson::Int32).unwrap_or(Bson::Int64(sum))
        }
        (Some(Bson::Int64(base)), Numeric::Integer(delta)) => Bson::Int64(base.saturating_add(delta)),
        (Some(Bson::Int32(base)), Numeric::Double(delta)) => Bson::Double(f64::from(*base) + delta),
        (Some(Bson::Int64(base)), Numeric::Double(delta)) => Bson::Double(*base as f64 + delta),
        (Some(Bson::Double(base)), Numeric::Integer(delta)) => Bson::Double(base + delta as f64),
        (Some(Bson::Double(base)), Numeric::Double(delta)) => Bson::Double(base + delta),
        (_, delta) => Bson::from(delta),
    }
}

fn is_delete(value: &FieldValue) -> bool {
    matches!(value, FieldValue::Sentinel(Sentinel::Delete))
}

fn apply_field(target: &mut Document, field: &str, value: FieldValue, now: DateTime) {
    match value {
        FieldValue::Value(value) => {
            target.insert(field, value);
        }
        FieldValue::Sentinel(sentinel) => match resolve(target.get(field), &sentinel, now) {
            Some(value) => {
                target.insert(field, value);
            }
            None => {
                target.remove(field);
            }
        },
    }
}

/// Writes `value` at the nested field `segments`, creating (or replacing
/// non-map) intermediate values as needed.
fn write_path(target: &mut Document, segments: &[&str], value: FieldValue, now: DateTime) {
    match segments {
        [] => {}
        [field] => apply_field(target, field, value, now),
        [head, rest @ ..] => {
            let is_map = matches!(target.get(*head), Some(Bson::Document(_)));

            if !is_map {
                if is_delete(&value) {
                    return;
                }
                target.insert(*head, Document::new());
            }

            if let Some(Bson::Document(child)) = target.get_mut(*head) {
                write_path(child, rest, value, now);
            }
        }
    }
}

fn merge_field(target: &mut Document, field: String, value: FieldValue, now: DateTime) {
    match value {
        FieldValue::Value(Bson::Document(incoming)) => match target.get_mut(&field) {
            Some(Bson::Document(existing)) => {
                for (key, value) in incoming {
                    merge_field(existing, key, FieldValue::Value(value), now);
                }
            }
            _ => {
                target.insert(field, incoming);
            }
        },
        value => apply_field(target, &field, value, now),
    }
}

/// Finds the value a merge mask entry selects from `data`.
fn masked_value(data: &WriteData, path: &str) -> Option<FieldValue> {
    if let Some(value) = data.get(path) {
        return Some(value.clone());
    }

    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?.as_value()?;
    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(FieldValue::Value(current.clone()))
}

/// Builds the document a `set` leaves behind.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] for a delete sentinel in an overwrite,
/// or for a merge mask entry the payload does not contain.
pub(crate) fn apply_set(
    existing: Option<Document>,
    data: WriteData,
    options: &SetOptions,
    now: DateTime,
) -> StoreResult<Document> {
    if let Some(fields) = &options.merge_fields {
        let mut document = existing.unwrap_or_default();

        for path in fields {
            let value = masked_value(&data, path).ok_or_else(|| {
                StoreError::InvalidArgument(format!(
                    "field {path} is in the merge mask but not in the data"
                ))
            })?;
            let segments = path.split('.').collect::<Vec<_>>();
            write_path(&mut document, &segments, value, now);
        }

        return Ok(document);
    }

    if options.merge {
        let mut document = existing.unwrap_or_default();
        for (field, value) in data {
            merge_field(&mut document, field, value, now);
        }
        return Ok(document);
    }

    create(data, now)
}

/// Builds a new document from `data`, as an overwrite or an `add`.
pub(crate) fn create(data: WriteData, now: DateTime) -> StoreResult<Document> {
    let mut document = Document::new();

    for (field, value) in data {
        if is_delete(&value) {
            return Err(StoreError::InvalidArgument(format!(
                "delete sentinel on field {field} requires a merge or an update"
            )));
        }
        apply_field(&mut document, &field, value, now);
    }

    Ok(document)
}

/// Rejects an update in which one field path is a prefix of another.
fn check_disjoint_paths(data: &WriteData) -> StoreResult<()> {
    for (path, _) in data {
        for (index, _) in path.match_indices('.') {
            let parent = &path[..index];
            if data.contains_field(parent) {
                return Err(StoreError::InvalidArgument(format!(
                    "field paths {parent} and {path} overlap in one update"
                )));
            }
        }
    }

    Ok(())
}

/// Applies a partial update keyed by dotted field paths.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] when one path is nested under another.
pub(crate) fn apply_update(mut document: Document, data: WriteData, now: DateTime) -> StoreResult<Document> {
    check_disjoint_paths(&data)?;

    for (path, value) in data {
        let segments = path.split('.').collect::<Vec<_>>();
        write_path(&mut document, &segments, value, now);
    }

    Ok(document)
}
