use miette::Diagnostic;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A point in time as the calendar API expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EventDateTime {
    /// ISO 8601 timestamp with UTC designator, e.g. "2024-03-22T15:30:00Z"
    #[serde(rename = "dateTime")]
    pub date_time: String,
    /// IANA timezone name, "UTC" unless the image says otherwise
    #[serde(rename = "timeZone")]
    pub time_zone: String,
}

/// An event extracted from an image.
///
/// The serialized form is exactly the body accepted by the Google Calendar
/// `events.insert` call. Nothing here guarantees that `end` is after `start`
/// or that the timestamps parse; only the shape is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "A single calendar event described by the image")]
pub struct EventRecord {
    /// Brief title suitable for a calendar view
    pub summary: String,
    /// All text visible in the image that gives the event context
    pub description: String,
    /// When the event starts
    pub start: EventDateTime,
    /// When the event ends
    pub end: EventDateTime,
}

/// Structural problems with a mapping that should describe an event
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SchemaError {
    #[error("Expected `{field}` to be a JSON object")]
    #[diagnostic(code(calvert::schema::not_an_object))]
    NotAnObject { field: String },

    #[error("Missing required field `{field}`")]
    #[diagnostic(code(calvert::schema::missing_field))]
    MissingField { field: String },

    #[error("Field `{field}` must be a {expected}")]
    #[diagnostic(code(calvert::schema::invalid_type))]
    InvalidType {
        field: String,
        expected: &'static str,
    },
}

impl EventRecord {
    /// Build an event from a parsed JSON value, naming the first field that is
    /// absent or has the wrong shape.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let object = as_object(value, "<root>")?;

        Ok(Self {
            summary: required_str(object, "summary", "summary")?,
            description: required_str(object, "description", "description")?,
            start: EventDateTime::from_field(object, "start")?,
            end: EventDateTime::from_field(object, "end")?,
        })
    }
}

impl EventDateTime {
    fn from_field(parent: &Map<String, Value>, key: &str) -> Result<Self, SchemaError> {
        let value = parent.get(key).ok_or_else(|| SchemaError::MissingField {
            field: key.to_string(),
        })?;
        let object = as_object(value, key)?;

        Ok(Self {
            date_time: required_str(object, "dateTime", &format!("{}.dateTime", key))?,
            time_zone: required_str(object, "timeZone", &format!("{}.timeZone", key))?,
        })
    }
}

fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| SchemaError::NotAnObject {
        field: field.to_string(),
    })
}

fn required_str(object: &Map<String, Value>, key: &str, path: &str) -> Result<String, SchemaError> {
    match object.get(key) {
        None => Err(SchemaError::MissingField {
            field: path.to_string(),
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::InvalidType {
            field: path.to_string(),
            expected: "string",
        }),
    }
}
