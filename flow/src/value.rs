// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Payload values
//!
//! The `value` module provides the `Value` type carried inside every
//! [`Envelope`](crate::Envelope) and the `Segment` type used to address parts
//! of it. Containers are reference counted, so cloning a `Value` shares every
//! nested map and sequence. Updates never touch an existing container: they
//! rebuild the chain of containers along the updated path and reuse the rest.
//!

use crate::Error;

use serde::{Deserialize, Serialize};

use std::{collections::BTreeMap, fmt, sync::Arc};

/// Structured payload value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// No value.
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence, shared between clones.
    Seq(Arc<Vec<Value>>),
    /// String keyed map, shared between clones.
    Map(Arc<BTreeMap<String, Value>>),
}

/// One step of a path into a [`Value`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Map key (or field name).
    Key(String),
    /// Sequence index.
    Index(usize),
}

impl Segment {
    /// Index this segment denotes, if any. Numeric keys count as indexes.
    fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(index) => Some(*index),
            Segment::Key(key) => key.parse().ok(),
        }
    }

    /// Map key this segment denotes.
    fn as_key(&self) -> String {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string(),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = s.parse() {
                return Segment::Index(index);
            }
        }
        Segment::Key(s.to_owned())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::from(s.as_str())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{}", key),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Parses a textual path such as `a.b.0` or `a/b/0` into segments.
/// Empty segments are ignored.
pub fn parse_path(path: &str) -> Vec<Segment> {
    path.split(['.', '/'])
        .filter(|s| !s.trim().is_empty())
        .map(|s| Segment::from(s.trim()))
        .collect()
}

impl Value {
    /// Builds a sequence value.
    pub fn seq<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Seq(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Builds a map value.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries.as_ref()),
            _ => None,
        }
    }

    /// True when both values are the same shared container (or equal
    /// scalars). Used to observe structural sharing.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Seq(a), Value::Seq(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (a, b) => a == b,
        }
    }

    /// Looks up the value at `path`. Returns `None` on a missing key, an out
    /// of range index or an attempt to index a scalar.
    pub fn get(&self, path: &[Segment]) -> Option<&Value> {
        let mut current = self;
        for segment in path {
            current = match current {
                Value::Map(entries) => entries.get(&segment.as_key())?,
                Value::Seq(items) => items.get(segment.as_index()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns a new value with `value` placed at `path`. Only the
    /// containers along `path` are copied. Missing intermediates are
    /// synthesized as a sequence when the segment is an index and as a map
    /// otherwise.
    pub fn set(&self, path: &[Segment], value: Value) -> Result<Value, Error> {
        set_in(Some(self), path, value)
    }

    /// Returns a copy that shares no container with `self`.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Seq(items) => Value::Seq(Arc::new(
                items.iter().map(Value::deep_copy).collect(),
            )),
            Value::Map(entries) => Value::Map(Arc::new(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            )),
            other => other.clone(),
        }
    }

    /// Mutable access to the value at `path`, cloning shared containers on
    /// the way down.
    pub(crate) fn get_mut(&mut self, path: &[Segment]) -> Option<&mut Value> {
        let mut current = self;
        for segment in path {
            current = match current {
                Value::Map(entries) => {
                    Arc::make_mut(entries).get_mut(&segment.as_key())?
                }
                Value::Seq(items) => {
                    Arc::make_mut(items).get_mut(segment.as_index()?)?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

fn set_in(
    current: Option<&Value>,
    path: &[Segment],
    value: Value,
) -> Result<Value, Error> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(value);
    };
    match current {
        None | Some(Value::Nil) => {
            let child = set_in(None, rest, value)?;
            match head {
                Segment::Index(index) => {
                    Ok(Value::Seq(Arc::new(place(Vec::new(), *index, child)?)))
                }
                Segment::Key(key) => {
                    let mut entries = BTreeMap::new();
                    entries.insert(key.clone(), child);
                    Ok(Value::Map(Arc::new(entries)))
                }
            }
        }
        Some(Value::Map(entries)) => {
            let key = head.as_key();
            let child = set_in(entries.get(&key), rest, value)?;
            let mut copy = entries.as_ref().clone();
            copy.insert(key, child);
            Ok(Value::Map(Arc::new(copy)))
        }
        Some(Value::Seq(items)) => {
            let Some(index) = head.as_index() else {
                return Err(Error::Frozen(format!(
                    "sequence can not be indexed by '{}'",
                    head
                )));
            };
            let child = set_in(items.get(index), rest, value)?;
            let copy = place(items.as_ref().clone(), index, child)?;
            Ok(Value::Seq(Arc::new(copy)))
        }
        Some(scalar) => Err(Error::Frozen(format!(
            "{} can not contain '{}'",
            scalar, head
        ))),
    }
}

/// Puts `child` at `index`, padding with `Nil` past the end. Indexes that
/// can not be allocated are refused instead of aborting.
fn place(mut items: Vec<Value>, index: usize, child: Value) -> Result<Vec<Value>, Error> {
    if let Some(slot) = items.get_mut(index) {
        *slot = child;
        return Ok(items);
    }
    let additional = index
        .checked_add(1)
        .map(|len| len - items.len())
        .ok_or_else(|| Error::Frozen(format!("index {} is out of range", index)))?;
    items
        .try_reserve_exact(additional)
        .map_err(|_| Error::Frozen(format!("index {} is out of range", index)))?;
    items.resize(index, Value::Nil);
    items.push(child);
    Ok(items)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, item)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(Arc::new(items))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(entries))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::seq(items.into_iter().map(Value::from))
            }
            serde_json::Value::Object(entries) => {
                Value::map(entries.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use serde_json::json;

    fn sample() -> Value {
        Value::from(json!({
            "a": [1, "first"],
            "b": true,
            "c": {"d": {"e": 3}}
        }))
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("a.b/0"),
            vec![
                Segment::Key("a".to_owned()),
                Segment::Key("b".to_owned()),
                Segment::Index(0)
            ]
        );
        assert!(parse_path("").is_empty());
    }

    #[test]
    fn test_get() {
        let value = sample();
        assert_eq!(value.get(&parse_path("a.1")), Some(&Value::from("first")));
        assert_eq!(value.get(&parse_path("c.d.e")), Some(&Value::Int(3)));
        assert_eq!(value.get(&[]), Some(&value));
        assert_eq!(value.get(&parse_path("a.7")), None);
        assert_eq!(value.get(&parse_path("b.x")), None);
        assert_eq!(value.get(&parse_path("missing.x")), None);
    }

    #[test]
    fn test_set_shares_untouched_branches() {
        let value = sample();
        let updated = value.set(&parse_path("c.d.e"), Value::Int(4)).unwrap();
        assert_eq!(updated.get(&parse_path("c.d.e")), Some(&Value::Int(4)));
        assert_eq!(value.get(&parse_path("c.d.e")), Some(&Value::Int(3)));

        let before = value.get(&parse_path("a")).unwrap();
        let after = updated.get(&parse_path("a")).unwrap();
        assert!(before.ptr_eq(after));
        assert!(!value
            .get(&parse_path("c"))
            .unwrap()
            .ptr_eq(updated.get(&parse_path("c")).unwrap()));
    }

    #[test]
    fn test_set_synthesizes_containers() {
        let value = Value::Nil;
        let updated = value.set(&parse_path("x.2.y"), Value::from("z")).unwrap();
        assert_eq!(updated.get(&parse_path("x.2.y")), Some(&Value::from("z")));
        assert_eq!(updated.get(&parse_path("x.0")), Some(&Value::Nil));
        assert_eq!(updated.get(&parse_path("x")).unwrap().as_seq().unwrap().len(), 3);
    }

    #[test]
    fn test_set_appends_and_pads() {
        let value = Value::seq([1, 2]);
        let updated = value.set(&[Segment::Index(4)], Value::Int(5)).unwrap();
        assert_eq!(
            updated,
            Value::seq([Value::Int(1), Value::Int(2), Value::Nil, Value::Nil, Value::Int(5)])
        );
    }

    #[test]
    fn test_set_huge_index_fails() {
        let result = Value::Nil.set(&parse_path("a.18446744073709551615"), Value::Int(1));
        assert!(matches!(result, Err(Error::Frozen(_))));
        let result = Value::seq([1]).set(&[Segment::Index(usize::MAX - 1)], Value::Int(1));
        assert!(matches!(result, Err(Error::Frozen(_))));
        let result = Value::Nil.set(&[Segment::Index(usize::MAX / 2)], Value::Int(1));
        assert!(matches!(result, Err(Error::Frozen(_))));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let value = sample();
        let result = value.set(&parse_path("b.x"), Value::Int(1));
        assert!(matches!(result, Err(Error::Frozen(_))));
        let result = value.set(&parse_path("a.name"), Value::Int(1));
        assert!(matches!(result, Err(Error::Frozen(_))));
    }

    #[test]
    fn test_deep_copy_is_unshared() {
        let value = sample();
        let copy = value.deep_copy();
        assert_eq!(value, copy);
        assert!(!value.ptr_eq(&copy));
        assert!(!value
            .get(&parse_path("c.d"))
            .unwrap()
            .ptr_eq(copy.get(&parse_path("c.d")).unwrap()));
    }

    #[test]
    fn test_display() {
        let value = Value::from(json!({"a": [1, "x"], "b": null}));
        assert_eq!(value.to_string(), "{a: [1, x], b: nil}");
    }
}
