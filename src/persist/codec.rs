use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    value: Value,
}

/// JSON encoding of persisted values.
///
/// Without a format version the entry is the plain JSON of the value. With one,
/// the entry is `{"version": N, "value": ...}` and only entries carrying exactly
/// that version decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Codec {
    version: Option<u32>,
}

impl Codec {
    pub(crate) fn new(version: Option<u32>) -> Self {
        Self { version }
    }

    pub(crate) fn encode<T: Serialize>(&self, value: &T) -> Result<String, serde_json::Error> {
        match self.version {
            None => serde_json::to_string(value),
            Some(version) => serde_json::to_string(&EnvelopeRef { version, value }),
        }
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T, DecodeError> {
        let Some(expected) = self.version else {
            return Ok(serde_json::from_str(raw)?);
        };

        let document: Value = serde_json::from_str(raw)?;
        let found = document
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|version| u32::try_from(version).ok());
        if found != Some(expected) {
            return Err(DecodeError::VersionMismatch { expected, found });
        }

        let envelope: Envelope = serde_json::from_value(document)?;
        Ok(serde_json::from_value(envelope.value)?)
    }
}
