//! Request parameters that distinguish "omitted" from "explicitly null".
//!
//! Chat-completion endpoints treat a missing field and a `null` field
//! differently, so provider requests carry [`Param`] instead of `Option`.
//! Struct fields should be annotated with
//! `#[serde(default, skip_serializing_if = "Param::is_omitted")]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Param<T> {
    /// Field is left out of the request entirely
    #[default]
    Omitted,
    /// Field is sent as `null`
    Null,
    Value(T),
}

impl<T> Param<T> {
    pub fn is_omitted(&self) -> bool {
        matches!(self, Param::Omitted)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Param::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// `None` maps to `Omitted`; use [`Param::Null`] to send an explicit null.
impl<T> From<Option<T>> for Param<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Param::Value(v),
            None => Param::Omitted,
        }
    }
}

impl<T: Serialize> Serialize for Param<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Param::Value(v) => v.serialize(serializer),
            // Omitted fields are skipped by `skip_serializing_if`; if a
            // caller forgets the attribute, null is the closest wire form.
            Param::Omitted | Param::Null => serializer.serialize_none(),
        }
    }
}

/// A present field deserializes to `Null` or `Value`; an absent one falls
/// back to `Omitted` through `#[serde(default)]`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Param<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Param::Value(v),
            None => Param::Null,
        })
    }
}

/// A single stop sequence or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for StopSequences {
    fn from(value: &str) -> Self {
        StopSequences::One(value.to_string())
    }
}

impl From<Vec<String>> for StopSequences {
    fn from(value: Vec<String>) -> Self {
        StopSequences::Many(value)
    }
}
