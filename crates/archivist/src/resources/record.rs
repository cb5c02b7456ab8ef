//! Schemaless resource records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::confirm::CONFIRMATION_STATUS;
use crate::error::Error;

/// Attribute under which a record's display name is stored.
const DISPLAY_NAME_ATTRIBUTE: &str = "arc_display_name";

/// Display name marking an attachment as the record's primary image.
const PRIMARY_IMAGE_NAME: &str = "arc_primary_image";

/// One JSON entity returned by the service.
///
/// Records are schemaless key-value mappings; beyond requiring a JSON
/// object no client-side validation is applied, so new server fields
/// flow through untouched. Accessors for the well-known fields return
/// `None` when absent.
///
/// # Example
///
/// ```
/// use archivist::ResourceRecord;
/// use serde_json::json;
///
/// let record = ResourceRecord::new(json!({
///     "identity": "assets/2340c16b-...",
///     "attributes": {"arc_display_name": "Front door"},
/// })).unwrap();
///
/// assert_eq!(record.name(), Some("Front door"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord(Value);

impl ResourceRecord {
    /// Wrap a decoded JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON object.
    pub fn new(value: Value) -> Result<Self, Error> {
        if !value.is_object() {
            return Err(Error::IllegalArgument {
                message: "resource record must be a JSON object".to_owned(),
            });
        }
        Ok(Self(value))
    }

    /// Wrap a value already known to be an object.
    pub(crate) fn raw(value: Value) -> Self {
        Self(value)
    }

    /// The server-assigned identity, e.g. `assets/2340c16b-...`.
    pub fn identity(&self) -> Option<&str> {
        self.get("identity").and_then(Value::as_str)
    }

    /// The record's attribute mapping.
    pub fn attributes(&self) -> Option<&Map<String, Value>> {
        self.get("attributes").and_then(Value::as_object)
    }

    /// The display name attribute, when one is set.
    pub fn name(&self) -> Option<&str> {
        self.attributes()?
            .get(DISPLAY_NAME_ATTRIBUTE)
            .and_then(Value::as_str)
    }

    /// The confirmation state, when the family carries one.
    pub fn confirmation_status(&self) -> Option<&str> {
        self.get(CONFIRMATION_STATUS).and_then(Value::as_str)
    }

    /// The attachment designated as this record's primary image.
    pub fn primary_image(&self) -> Option<&Value> {
        self.attributes()?
            .get("attachments")
            .and_then(Value::as_array)?
            .iter()
            .find(|attachment| {
                attachment
                    .get(DISPLAY_NAME_ATTRIBUTE)
                    .and_then(Value::as_str)
                    == Some(PRIMARY_IMAGE_NAME)
            })
    }

    /// Any top-level field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the record, returning the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Serialize for ResourceRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        ResourceRecord::new(value).map_err(serde::de::Error::custom)
    }
}
