//! Individual setting values
//!
//! Individual keys carry one of a closed set of value kinds. Anything richer
//! (a whole section, a whole tree) travels as an encoded blob and is decoded
//! only at the repository boundary.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::error::{SettingsError, SettingsResult};

/// Value of a single setting key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SettingValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Date(DateTime<Utc>),
    /// Encoded bytes, base64 in JSON
    Blob(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl SettingValue {
    /// Encode any serializable value as a JSON blob
    pub fn encode<T: Serialize>(value: &T) -> SettingsResult<Self> {
        Ok(SettingValue::Blob(serde_json::to_vec(value)?))
    }

    /// Decode a blob produced by [`SettingValue::encode`]
    pub fn decode<T: DeserializeOwned>(&self) -> SettingsResult<T> {
        match self {
            SettingValue::Blob(bytes) => Ok(serde_json::from_slice(bytes)?),
            other => Err(SettingsError::Serialization(format!(
                "expected blob value, found {}",
                other.kind()
            ))),
        }
    }

    /// Reject values JSON cannot carry. NaN and infinities serialize as
    /// `null` and would not read back as a double.
    pub fn ensure_encodable(&self) -> SettingsResult<()> {
        match self {
            SettingValue::Double(d) if !d.is_finite() => Err(SettingsError::Serialization(
                format!("non-finite double {} cannot be stored", d),
            )),
            _ => Ok(()),
        }
    }

    /// Name of the value kind
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::String(_) => "string",
            SettingValue::Bool(_) => "bool",
            SettingValue::Int(_) => "int",
            SettingValue::Double(_) => "double",
            SettingValue::Date(_) => "date",
            SettingValue::Blob(_) => "blob",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Double(d) => Some(*d),
            SettingValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Double(value)
    }
}

impl From<DateTime<Utc>> for SettingValue {
    fn from(value: DateTime<Utc>) -> Self {
        SettingValue::Date(value)
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
