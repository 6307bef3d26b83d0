//! Field presence for partial updates.
//!
//! JSON distinguishes an omitted key from an explicit `null`; `Patch<T>` keeps that
//! distinction instead of collapsing both into `None`. Struct fields of this type must
//! carry `#[serde(default)]` so that an absent key deserializes to `Missing`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Missing,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            Patch::Missing | Patch::Null => None,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Patch::Missing)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Patch::Null)
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Patch::Null, Patch::Value)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

/// Collects the supplied fields of an update DTO into a column map.
pub struct PatchMap {
    include_nulls: bool,
    map: Map<String, Value>,
}

impl PatchMap {
    #[must_use]
    pub fn new(include_nulls: bool) -> Self {
        Self {
            include_nulls,
            map: Map::new(),
        }
    }

    #[must_use]
    pub fn field<T: Serialize>(mut self, name: &str, patch: &Patch<T>) -> Self {
        match patch {
            Patch::Missing => {}
            Patch::Null => {
                if self.include_nulls {
                    self.map.insert(name.to_string(), Value::Null);
                }
            }
            Patch::Value(v) => {
                if let Ok(value) = serde_json::to_value(v) {
                    self.map.insert(name.to_string(), value);
                }
            }
        }
        self
    }

    #[must_use]
    pub fn finish(self) -> Map<String, Value> {
        self.map
    }
}
