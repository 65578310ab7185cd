//! Billing record type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{FIELD_DATE, FIELD_ID, FIELD_PARTITION_KEY};
use crate::error::{ColdVaultError, ColdVaultResult, ValidationError};
use crate::location::ArchiveLocation;

/// A record as stored in the operational store: an arbitrary JSON object
/// that carries at least `id`, `partitionKey` and `date`.
///
/// Field order is preserved so that a record parsed from an archived blob
/// serializes back to the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wrap an existing JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record holding only the three well-known fields.
    pub fn from_keys(
        id: impl Into<String>,
        partition_key: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert(FIELD_ID.to_string(), Value::String(id.into()));
        fields.insert(
            FIELD_PARTITION_KEY.to_string(),
            Value::String(partition_key.into()),
        );
        fields.insert(FIELD_DATE.to_string(), Value::String(date.into()));
        Self(fields)
    }

    /// Convert a JSON value; anything but an object is rejected.
    pub fn from_value(value: Value) -> ColdVaultResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(ValidationError::InvalidValue {
                field: "record".to_string(),
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }
            .into()),
        }
    }

    /// Parse a record from UTF-8 JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> ColdVaultResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Compact JSON serialization, as written to the archive.
    pub fn to_json_bytes(&self) -> ColdVaultResult<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(ColdVaultError::from)
    }

    pub fn id(&self) -> ColdVaultResult<&str> {
        self.str_field(FIELD_ID)
    }

    pub fn partition_key(&self) -> ColdVaultResult<&str> {
        self.str_field(FIELD_PARTITION_KEY)
    }

    pub fn date(&self) -> ColdVaultResult<&str> {
        self.str_field(FIELD_DATE)
    }

    /// Where this record lives once archived.
    pub fn archive_location(&self) -> ColdVaultResult<ArchiveLocation> {
        ArchiveLocation::for_record(self)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    fn str_field(&self, field: &str) -> ColdVaultResult<&str> {
        match self.0.get(field) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(ValidationError::InvalidValue {
                field: field.to_string(),
                reason: format!("expected a string, got {}", json_kind(other)),
            }
            .into()),
            None => Err(ValidationError::RequiredFieldMissing {
                field: field.to_string(),
            }
            .into()),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors_read_well_known_fields() {
        let record = Record::from_keys("r1", "r1", "2024-01-01T00:00:00");
        assert_eq!(record.id().unwrap(), "r1");
        assert_eq!(record.partition_key().unwrap(), "r1");
        assert_eq!(record.date().unwrap(), "2024-01-01T00:00:00");
    }

    #[test]
    fn test_missing_field_is_validation_error() {
        let record = Record::from_value(json!({"id": "r1"})).unwrap();
        let err = record.partition_key().unwrap_err();
        assert_eq!(
            err,
            ColdVaultError::Validation(ValidationError::RequiredFieldMissing {
                field: "partitionKey".to_string()
            })
        );
    }

    #[test]
    fn test_non_string_field_is_invalid() {
        let record = Record::from_value(json!({"id": 42})).unwrap();
        assert!(matches!(
            record.id(),
            Err(ColdVaultError::Validation(ValidationError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2, 3])).is_err());
        assert!(Record::from_slice(b"\"just a string\"").is_err());
    }

    #[test]
    fn test_bytes_survive_parse_and_reserialize() {
        let body = br#"{"partitionKey":"acct-9","id":"r7","date":"2023-05-06T07:08:09","amount":{"value":12.5,"currency":"EUR"},"_etag":"\"0a00\""}"#;
        let record = Record::from_slice(body).unwrap();
        assert_eq!(record.to_json_bytes().unwrap(), body.to_vec());
    }
}
