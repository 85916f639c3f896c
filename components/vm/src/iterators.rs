//! Iterator state for `get-iter`/`iter-next`/`iter-has-next`.

use core_types::Value;
use std::collections::HashMap;

/// A single live iterator: a snapshot of the collection taken at `get-iter`
/// time plus a cursor into it.
///
/// Per the data model's invariant (v), an object's key snapshot is never
/// re-read and the collection may grow without affecting an iterator
/// already in flight; snapshotting the whole collection at creation gives
/// us that for free.
#[derive(Debug, Clone)]
enum IterState {
    Array(Vec<Value>),
    Object {
        keys: Vec<String>,
        values: HashMap<String, Value>,
    },
}

impl IterState {
    fn len(&self) -> usize {
        match self {
            IterState::Array(items) => items.len(),
            IterState::Object { keys, .. } => keys.len(),
        }
    }

    /// The `(key, value)` pair at `index`. The key is the array index
    /// rendered as an int, or the object's snapshotted key.
    fn at(&self, index: usize) -> (Value, Value) {
        match self {
            IterState::Array(items) => (Value::Int(index as i64), items[index].clone()),
            IterState::Object { keys, values } => {
                let key = &keys[index];
                let value = values.get(key).cloned().unwrap_or(Value::Null);
                (Value::Str(key.clone()), value)
            }
        }
    }
}

/// A live iterator plus its cursor.
#[derive(Debug, Clone)]
struct Iterator {
    state: IterState,
    index: usize,
}

/// The table of live iterators a single execution owns, keyed by the
/// integer id the `get-iter` opcode hands back to bytecode.
#[derive(Debug, Clone, Default)]
pub struct IteratorTable {
    next_id: i64,
    live: HashMap<i64, Iterator>,
}

/// Why an iterator operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterError {
    /// No live iterator exists under the given id.
    InvalidId,
    /// `iter-next` was called past the iterator's last element.
    Exhausted,
}

impl IteratorTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        IteratorTable::default()
    }

    /// Snapshots `collection` (an array or object `Value`) and returns a
    /// fresh iterator id. Panics if `collection` is neither — callers are
    /// expected to type-check before calling this.
    pub fn create(&mut self, collection: &Value) -> i64 {
        let state = match collection {
            Value::Array(items) => IterState::Array(items.clone()),
            Value::Object(map) => IterState::Object {
                keys: map.keys().cloned().collect(),
                values: map.clone(),
            },
            other => panic!("iterator snapshot of non-collection value: {:?}", other),
        };
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, Iterator { state, index: 0 });
        id
    }

    /// Whether the iterator still has elements left. Evicts the iterator
    /// eagerly when it reports `false`, per the data model.
    pub fn has_next(&mut self, id: i64) -> Result<bool, IterError> {
        let iter = self.live.get(&id).ok_or(IterError::InvalidId)?;
        let has_next = iter.index < iter.state.len();
        if !has_next {
            self.live.remove(&id);
        }
        Ok(has_next)
    }

    /// Advances the iterator and returns `(key, value)`. `key` is only
    /// meaningful to the caller when `iter-next`'s operand requested it.
    pub fn next(&mut self, id: i64) -> Result<(Value, Value), IterError> {
        let iter = self.live.get_mut(&id).ok_or(IterError::InvalidId)?;
        if iter.index >= iter.state.len() {
            return Err(IterError::Exhausted);
        }
        let pair = iter.state.at(iter.index);
        iter.index += 1;
        Ok(pair)
    }

    /// Removes every live iterator (used by `reset`).
    pub fn clear(&mut self) {
        self.live.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_iteration_produces_index_and_value() {
        let mut table = IteratorTable::new();
        let id = table.create(&Value::Array(vec![Value::Int(10), Value::Int(20)]));
        assert!(table.has_next(id).unwrap());
        assert_eq!(table.next(id).unwrap(), (Value::Int(0), Value::Int(10)));
        assert!(table.has_next(id).unwrap());
        assert_eq!(table.next(id).unwrap(), (Value::Int(1), Value::Int(20)));
        assert!(!table.has_next(id).unwrap());
    }

    #[test]
    fn exhausted_iterator_evicted_then_invalid() {
        let mut table = IteratorTable::new();
        let id = table.create(&Value::Array(vec![]));
        assert!(!table.has_next(id).unwrap());
        assert_eq!(table.has_next(id).unwrap_err(), IterError::InvalidId);
    }

    #[test]
    fn next_past_end_is_exhausted_error() {
        let mut table = IteratorTable::new();
        let id = table.create(&Value::Array(vec![Value::Int(1)]));
        table.next(id).unwrap();
        assert_eq!(table.next(id).unwrap_err(), IterError::Exhausted);
    }

    #[test]
    fn object_keys_are_snapshotted_at_creation() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), Value::Int(1));
        let mut table = IteratorTable::new();
        let id = table.create(&Value::Object(map));
        let (key, value) = table.next(id).unwrap();
        assert_eq!(key, Value::Str("a".to_string()));
        assert_eq!(value, Value::Int(1));
    }
}
