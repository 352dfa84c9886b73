//! Dynamic manifest documents
//!
//! A [`Document`] wraps one parsed YAML document and exposes structural
//! accessors addressed by key paths (`&["spec", "source", "path"]`). Lookups
//! are total: a missing or mistyped segment yields `None` rather than a panic,
//! and writes report the segment that blocked them.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A write could not be performed because an intermediate node is not a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

impl std::error::Error for PathError {}

/// Remove `key` from `mapping` while keeping the order of the remaining entries.
pub fn remove_key(mapping: &mut Mapping, key: &str) -> Option<Value> {
    if !mapping.contains_key(key) {
        return None;
    }
    let mut removed = None;
    let rebuilt: Mapping = std::mem::take(mapping)
        .into_iter()
        .filter_map(|(k, v)| {
            if removed.is_none() && k.as_str() == Some(key) {
                removed = Some(v);
                None
            } else {
                Some((k, v))
            }
        })
        .collect();
    *mapping = rebuilt;
    removed
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document(Value);

impl Document {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content).map(Self)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// True when the document is a map with at least one entry.
    pub fn is_object(&self) -> bool {
        self.0.as_mapping().is_some_and(|m| !m.is_empty())
    }

    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.0, |node, key| node.as_mapping()?.get(*key))
    }

    pub fn get_mut(&mut self, path: &[&str]) -> Option<&mut Value> {
        path.iter().try_fold(&mut self.0, |node, key| node.as_mapping_mut()?.get_mut(*key))
    }

    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_mapping(&self, path: &[&str]) -> Option<&Mapping> {
        self.get(path).and_then(Value::as_mapping)
    }

    pub fn get_sequence(&self, path: &[&str]) -> Option<&Vec<Value>> {
        self.get(path).and_then(Value::as_sequence)
    }

    /// String-valued entries of the map at `path`. Non-string values are skipped.
    pub fn string_map(&self, path: &[&str]) -> BTreeMap<String, String> {
        self.get_mapping(path)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set `value` at `path`, creating intermediate maps as needed.
    ///
    /// Fails when an existing intermediate node is a scalar or a sequence.
    pub fn set(&mut self, path: &[&str], value: Value) -> Result<(), PathError> {
        let Some((last, parents)) = path.split_last() else {
            self.0 = value;
            return Ok(());
        };

        let mut node = &mut self.0;
        for (depth, key) in parents.iter().enumerate() {
            if node.is_null() {
                *node = Value::Mapping(Mapping::new());
            }
            let mapping = node.as_mapping_mut().ok_or_else(|| PathError {
                path: path[..depth].join("."),
                reason: "value is not a map".to_string(),
            })?;
            if !mapping.contains_key(*key) {
                mapping.insert(Value::String((*key).to_string()), Value::Mapping(Mapping::new()));
            }
            node = mapping.get_mut(*key).ok_or_else(|| PathError {
                path: path[..=depth].join("."),
                reason: "value disappeared while writing".to_string(),
            })?;
        }

        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        let mapping = node.as_mapping_mut().ok_or_else(|| PathError {
            path: parents.join("."),
            reason: "value is not a map".to_string(),
        })?;
        mapping.insert(Value::String((*last).to_string()), value);
        Ok(())
    }

    /// Delete the entry at `path`, returning it if it existed.
    pub fn remove(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let parent = if parents.is_empty() { Some(&mut self.0) } else { self.get_mut(parents) };
        remove_key(parent?.as_mapping_mut()?, last)
    }

    fn non_empty_str(&self, path: &[&str]) -> Option<&str> {
        self.get_str(path).filter(|s| !s.is_empty())
    }

    pub fn kind(&self) -> Option<&str> {
        self.non_empty_str(&["kind"])
    }

    pub fn api_version(&self) -> Option<&str> {
        self.non_empty_str(&["apiVersion"])
    }

    pub fn name(&self) -> Option<&str> {
        self.non_empty_str(&["metadata", "name"])
    }

    pub fn namespace(&self) -> Option<&str> {
        self.non_empty_str(&["metadata", "namespace"])
    }

    /// API group portion of `apiVersion`; empty for the core group.
    pub fn group(&self) -> &str {
        match self.api_version() {
            Some(api) => api.split_once('/').map(|(group, _)| group).unwrap_or(""),
            None => "",
        }
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), PathError> {
        self.set(&["metadata", "name"], Value::String(name.to_string()))
    }

    pub fn set_namespace(&mut self, namespace: &str) -> Result<(), PathError> {
        self.set(&["metadata", "namespace"], Value::String(namespace.to_string()))
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map(&["metadata", "annotations"])
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map(&["metadata", "labels"])
    }

    pub fn finalizers(&self) -> Option<Vec<String>> {
        self.get_sequence(&["metadata", "finalizers"])
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.0)
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
