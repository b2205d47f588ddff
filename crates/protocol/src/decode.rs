//! Field accessors for validating decoders.
//!
//! serde's derived `Deserialize` reports failures as free text; the protocol
//! needs the offending field name in a typed error, so payloads are decoded
//! by hand through [`Fields`].

use serde_json::{Map, Value};

use crate::error::DecodeError;

pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub(crate) fn of(value: &'a Value, context: &'static str) -> Result<Self, DecodeError> {
        value
            .as_object()
            .map(|map| Self { map })
            .ok_or(DecodeError::NotAnObject(context))
    }

    pub(crate) fn get(&self, key: &str) -> Result<&'a Value, DecodeError> {
        self.map.get(key).ok_or_else(|| DecodeError::missing(key))
    }

    pub(crate) fn string(&self, key: &str) -> Result<String, DecodeError> {
        self.get(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DecodeError::wrong_type(key))
    }

    /// Like [`string`](Self::string) but an absent key yields an empty string.
    pub(crate) fn string_or_empty(&self, key: &str) -> Result<String, DecodeError> {
        match self.map.get(key) {
            None => Ok(String::new()),
            Some(v) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| DecodeError::wrong_type(key)),
        }
    }

    pub(crate) fn f32(&self, key: &str) -> Result<f32, DecodeError> {
        self.get(key)?
            .as_f64()
            .map(|n| n as f32)
            .ok_or_else(|| DecodeError::wrong_type(key))
    }

    pub(crate) fn i32(&self, key: &str) -> Result<i32, DecodeError> {
        self.get(key)?
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| DecodeError::wrong_type(key))
    }

    pub(crate) fn object(&self, key: &str) -> Result<&'a Value, DecodeError> {
        let value = self.get(key)?;
        if value.is_object() {
            Ok(value)
        } else {
            Err(DecodeError::wrong_type(key))
        }
    }

    pub(crate) fn array(&self, key: &str) -> Result<&'a [Value], DecodeError> {
        self.get(key)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| DecodeError::wrong_type(key))
    }
}
