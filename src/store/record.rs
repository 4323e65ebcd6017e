//! Storage-owned record: attribute map plus persistence state.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    attributes: Map<String, Value>,
    exists: bool,
    dirty: BTreeSet<String>,
}

impl Record {
    /// Unsaved record; every attribute counts as changed.
    pub fn new(attributes: Map<String, Value>) -> Self {
        let dirty = attributes.keys().cloned().collect();
        Record {
            attributes,
            exists: false,
            dirty,
        }
    }

    /// Record as read back from storage.
    pub fn stored(attributes: Map<String, Value>) -> Self {
        Record {
            attributes,
            exists: true,
            dirty: BTreeSet::new(),
        }
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if self.attributes.get(&key) != Some(&value) {
            self.dirty.insert(key.clone());
        }
        self.attributes.insert(key, value);
    }

    /// Merge payload fields onto the record.
    pub fn fill(&mut self, payload: &Map<String, Value>) {
        for (k, v) in payload {
            self.set(k.clone(), v.clone());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.dirty.remove(key);
        self.attributes.remove(key)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Changed attributes, in key order.
    pub fn changes(&self) -> Map<String, Value> {
        self.dirty
            .iter()
            .filter_map(|k| self.attributes.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Replace attributes with the stored row after a successful save.
    pub fn mark_persisted(&mut self, attributes: Map<String, Value>) {
        self.attributes = attributes;
        self.exists = true;
        self.dirty.clear();
    }

    /// Primary-key value rendered as a path id.
    pub fn key_string(&self, primary_key: &str) -> Option<String> {
        match self.attributes.get(primary_key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}
