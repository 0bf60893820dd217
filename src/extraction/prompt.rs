use schemars::schema_for;

use crate::models::EventRecord;

/// Instructions for the model. `{year}` and `{schema}` are filled in per call.
const SYSTEM_PROMPT_TEMPLATE: &str = "Analyze the provided image of an event flyer or notice and extract the event details as JSON.
All dateTime values must be in ISO 8601 format with the UTC designator (e.g. \"{year}-03-22T15:30:00Z\").

Return strictly valid JSON matching this JSON Schema exactly:
{schema}

Rules:
- If no end time is specified, assume the event lasts 1 hour
- If no timezone is specified, use UTC and set timeZone to \"UTC\"
- If a date is mentioned without a year, use {year}
- If a time is ambiguous (e.g. \"5pm\"), read it on the 24-hour clock, so \"5pm\" becomes 17:00 UTC
- description must include all text visible in the image that provides context
- summary must be a concise title suitable for a calendar view

Return only the JSON object, no other text.";

/// Build the system prompt for extracting one event, resolving yearless
/// dates against `current_year`.
pub fn build_system_prompt(current_year: i32) -> String {
    let schema = serde_json::json!(schema_for!(EventRecord));

    SYSTEM_PROMPT_TEMPLATE
        .replace("{schema}", &format!("{:#}", schema))
        .replace("{year}", &current_year.to_string())
}
