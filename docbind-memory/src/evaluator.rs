//! Query evaluation for in-memory documents.
//!
//! This module provides the native query type of the in-memory client,
//! [`MemoryQuery`], together with the total value ordering it sorts, filters and
//! positions cursors with.
//!
//! Values of different types order by type first:
//! null < boolean < number < timestamp < string < binary < array < map.
//! Integers and doubles compare numerically with each other, NaN sorts before
//! every other number, and maps compare entry by entry in key order.

use std::cmp::Ordering;

use bson::{Bson, Document};

use docbind_core::{
    client::NativeQuery,
    error::{StoreError, StoreResult},
    path::CollectionPath,
    query::{CursorAnchor, Direction, FilterOp, LimitEnd},
};

/// Totally ordered view of a BSON value.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    String(&'a str),
    Binary(&'a [u8]),
    Array(&'a [Bson]),
    Map(&'a Document),
    /// Types with no natural place in the ordering; compared by their text form.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Integer(i64::from(*value)),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::Timestamp(value.timestamp_millis()),
            Bson::Timestamp(value) => Comparable::Timestamp(i64::from(value.time) * 1000),
            Bson::String(value) | Bson::Symbol(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::Array(items) => Comparable::Array(items),
            Bson::Document(doc) => Comparable::Map(doc),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Integer(_) | Comparable::Double(_) => 2,
            Comparable::Timestamp(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Binary(_) => 5,
            Comparable::Array(_) => 6,
            Comparable::Map(_) => 7,
            Comparable::Other(_) => 8,
        }
    }

    /// Whether both values belong to the same type class (integers and doubles share one).
    pub(crate) fn same_type(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

fn compare_doubles(left: f64, right: f64) -> Ordering {
    match (left.is_nan(), right.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

/// Compares without rounding the integer to a double, so values above 2^53 keep their order.
fn compare_integer_to_double(int: i64, double: f64) -> Ordering {
    // 2^63, the first double past i64::MAX.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if double.is_nan() {
        return Ordering::Greater;
    }
    if double >= LIMIT {
        return Ordering::Less;
    }
    if double < -LIMIT {
        return Ordering::Greater;
    }

    let whole = double.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(double - whole)).unwrap_or(Ordering::Equal),
        other => other,
    }
}

fn compare_maps(left: &Document, right: &Document) -> Ordering {
    let mut left = left.iter().collect::<Vec<_>>();
    let mut right = right.iter().collect::<Vec<_>>();
    left.sort_by(|a, b| a.0.cmp(b.0));
    right.sort_by(|a, b| a.0.cmp(b.0));

    left.into_iter()
        .map(|(key, value)| (key.as_str(), Comparable::from(value)))
        .cmp(right.into_iter().map(|(key, value)| (key.as_str(), Comparable::from(value))))
}

impl Ord for Comparable<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Integer(a), Comparable::Integer(b)) => a.cmp(b),
            (Comparable::Integer(a), Comparable::Double(b)) => compare_integer_to_double(*a, *b),
            (Comparable::Double(a), Comparable::Integer(b)) => compare_integer_to_double(*b, *a).reverse(),
            (Comparable::Double(a), Comparable::Double(b)) => compare_doubles(*a, *b),
            (Comparable::Timestamp(a), Comparable::Timestamp(b)) => a.cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Binary(a), Comparable::Binary(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .map(Comparable::from)
                .cmp(b.iter().map(Comparable::from)),
            (Comparable::Map(a), Comparable::Map(b)) => compare_maps(a, b),
            (Comparable::Other(a), Comparable::Other(b)) => a.to_string().cmp(&b.to_string()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Comparable<'_> {}

/// Compares two values under the store's total ordering.
pub(crate) fn compare_values(left: &Bson, right: &Bson) -> Ordering {
    Comparable::from(left).cmp(&Comparable::from(right))
}

pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    compare_values(left, right) == Ordering::Equal
}

/// Resolves a dotted field path inside `document`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

fn listed(value: &Bson) -> &[Bson] {
    match value {
        Bson::Array(items) => items,
        _ => &[],
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FieldFilter {
    field: String,
    op: FilterOp,
    value: Bson,
}

impl FieldFilter {
    fn validate(&self) -> StoreResult<()> {
        match self.op {
            FilterOp::In | FilterOp::NotIn | FilterOp::ArrayContainsAny
                if !matches!(self.value, Bson::Array(_)) =>
            {
                Err(StoreError::InvalidArgument(format!(
                    "'{}' filter on field {} requires an array value",
                    self.op, self.field
                )))
            }
            _ => Ok(()),
        }
    }

    /// Documents missing the field never match, whatever the operator.
    fn matches(&self, document: &Document) -> bool {
        let Some(field_value) = lookup(document, &self.field) else {
            return false;
        };
        let left = Comparable::from(field_value);
        let right = Comparable::from(&self.value);

        match self.op {
            FilterOp::Equal => left == right,
            FilterOp::NotEqual => left != Comparable::Null && left != right,
            FilterOp::LessThan => left.same_type(&right) && left < right,
            FilterOp::LessThanOrEqual => left.same_type(&right) && left <= right,
            FilterOp::GreaterThan => left.same_type(&right) && left > right,
            FilterOp::GreaterThanOrEqual => left.same_type(&right) && left >= right,
            FilterOp::In => listed(&self.value).iter().any(|candidate| values_equal(field_value, candidate)),
            FilterOp::NotIn => {
                left != Comparable::Null
                    && !listed(&self.value).iter().any(|candidate| values_equal(field_value, candidate))
            }
            FilterOp::ArrayContains => listed(field_value).iter().any(|item| values_equal(item, &self.value)),
            FilterOp::ArrayContainsAny => listed(field_value).iter().any(|item| {
                listed(&self.value).iter().any(|candidate| values_equal(item, candidate))
            }),
        }
    }
}

#[derive(Debug, Clone)]
struct Bound {
    anchor: CursorAnchor,
    inclusive: bool,
}

/// A resolved cursor: one value per order-by field it covers, plus the document
/// id when the cursor came from a snapshot.
struct Position<'q> {
    values: Vec<&'q Bson>,
    id: Option<&'q str>,
}

/// The in-memory client's native query.
///
/// Calls are recorded as they arrive; a later limit or cursor of the same end
/// replaces an earlier one. Evaluation runs filters, drops documents missing an
/// order-by field, sorts by the order-by fields then document id, applies the
/// cursors and finally the limit.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    collection: CollectionPath,
    filters: Vec<FieldFilter>,
    orders: Vec<(String, Direction)>,
    limit: Option<(usize, LimitEnd)>,
    start: Option<Bound>,
    end: Option<Bound>,
}

impl MemoryQuery {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            start: None,
            end: None,
        }
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    fn validate(&self) -> StoreResult<()> {
        for filter in &self.filters {
            filter.validate()?;
        }

        if matches!(self.limit, Some((_, LimitEnd::Last))) && self.orders.is_empty() {
            return Err(StoreError::InvalidArgument(
                "limit_to_last requires at least one order_by".to_string(),
            ));
        }

        Ok(())
    }

    /// The direction of the implicit document id ordering: that of the last order-by.
    fn id_direction(&self) -> Direction {
        self.orders
            .last()
            .map(|(_, direction)| *direction)
            .unwrap_or_default()
    }

    fn position<'q>(&'q self, bound: &'q Bound) -> StoreResult<Position<'q>> {
        match &bound.anchor {
            CursorAnchor::Values(values) => {
                if values.len() > self.orders.len() {
                    return Err(StoreError::InvalidArgument(format!(
                        "cursor has {} value(s) but the query orders by {} field(s)",
                        values.len(),
                        self.orders.len()
                    )));
                }

                Ok(Position {
                    values: values.iter().collect(),
                    id: None,
                })
            }
            CursorAnchor::Snapshot(snapshot) => {
                let data = snapshot.data().ok_or_else(|| {
                    StoreError::InvalidArgument(format!(
                        "cursor document {} does not exist",
                        snapshot.path()
                    ))
                })?;
                let values = self
                    .orders
                    .iter()
                    .map(|(field, _)| {
                        lookup(data, field).ok_or_else(|| {
                            StoreError::InvalidArgument(format!(
                                "cursor document {} has no value for order-by field {field}",
                                snapshot.path()
                            ))
                        })
                    })
                    .collect::<StoreResult<Vec<_>>>()?;

                Ok(Position {
                    values,
                    id: Some(snapshot.id()),
                })
            }
        }
    }

    fn compare_documents(&self, left: (&str, &Document), right: (&str, &Document)) -> Ordering {
        for (field, direction) in &self.orders {
            let ordering = match (lookup(left.1, field), lookup(right.1, field)) {
                (Some(a), Some(b)) => compare_values(a, b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            };

            if ordering != Ordering::Equal {
                return directed(ordering, *direction);
            }
        }

        directed(left.0.cmp(right.0), self.id_direction())
    }

    /// Where a document sits relative to a cursor position, in result order.
    fn compare_to_position(&self, (id, document): (&str, &Document), position: &Position<'_>) -> Ordering {
        for ((field, direction), anchor) in self.orders.iter().zip(&position.values) {
            let ordering = match lookup(document, field) {
                Some(value) => compare_values(value, anchor),
                None => Ordering::Less,
            };

            if ordering != Ordering::Equal {
                return directed(ordering, *direction);
            }
        }

        match position.id {
            Some(anchor_id) => directed(id.cmp(anchor_id), self.id_direction()),
            None => Ordering::Equal,
        }
    }

    /// Runs the query over `documents`, returning the matches in result order.
    pub(crate) fn evaluate<'a>(
        &self,
        documents: impl IntoIterator<Item = (&'a str, &'a Document)>,
    ) -> StoreResult<Vec<(&'a str, &'a Document)>> {
        self.validate()?;

        let start = self
            .start
            .as_ref()
            .map(|bound| Ok::<_, StoreError>((self.position(bound)?, bound.inclusive)))
            .transpose()?;
        let end = self
            .end
            .as_ref()
            .map(|bound| Ok::<_, StoreError>((self.position(bound)?, bound.inclusive)))
            .transpose()?;

        let mut matched = documents
            .into_iter()
            .filter(|(_, document)| self.filters.iter().all(|filter| filter.matches(document)))
            .filter(|(_, document)| {
                self.orders
                    .iter()
                    .all(|(field, _)| lookup(document, field).is_some())
            })
            .collect::<Vec<_>>();

        matched.sort_by(|left, right| self.compare_documents(*left, *right));

        matched.retain(|entry| {
            let after_start = start.as_ref().is_none_or(|(position, inclusive)| {
                match self.compare_to_position(*entry, position) {
                    Ordering::Greater => true,
                    Ordering::Equal => *inclusive,
                    Ordering::Less => false,
                }
            });
            let before_end = end.as_ref().is_none_or(|(position, inclusive)| {
                match self.compare_to_position(*entry, position) {
                    Ordering::Less => true,
                    Ordering::Equal => *inclusive,
                    Ordering::Greater => false,
                }
            });

            after_start && before_end
        });

        match self.limit {
            Some((count, LimitEnd::First)) => matched.truncate(count),
            Some((count, LimitEnd::Last)) => {
                let skip = matched.len().saturating_sub(count);
                matched.drain(..skip);
            }
            None => {}
        }

        Ok(matched)
    }
}

impl NativeQuery for MemoryQuery {
    fn filter(mut self, field: &str, op: FilterOp, value: Bson) -> Self {
        self.filters.push(FieldFilter {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.orders.push((field.to_string(), direction));
        self
    }

    fn limit(mut self, count: usize) -> Self {
        self.limit = Some((count, LimitEnd::First));
        self
    }

    fn limit_to_last(mut self, count: usize) -> Self {
        self.limit = Some((count, LimitEnd::Last));
        self
    }

    fn start_at(mut self, anchor: CursorAnchor) -> Self {
        self.start = Some(Bound { anchor, inclusive: true });
        self
    }

    fn start_after(mut self, anchor: CursorAnchor) -> Self {
        self.start = Some(Bound { anchor, inclusive: false });
        self
    }

    fn end_at(mut self, anchor: CursorAnchor) -> Self {
        self.end = Some(Bound { anchor, inclusive: true });
        self
    }

    fn end_before(mut self, anchor: CursorAnchor) -> Self {
        self.end = Some(Bound { anchor, inclusive: false });
        self
    }
}
