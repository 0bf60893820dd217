use serde_json::Value;
use tracing::debug;

/// Parse a model reply as a JSON value.
///
/// Parsing is strict. The only leniency is a surrounding Markdown code fence
/// (```` ```json ... ``` ```` or a bare ```` ``` ````), which is stripped
/// first. Prose around the JSON makes the reply invalid.
pub fn parse_reply(reply: &str) -> Result<Value, serde_json::Error> {
    let trimmed = reply.trim();
    let body = strip_code_fence(trimmed).unwrap_or(trimmed);
    serde_json::from_str::<Value>(body)
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("```")?.strip_suffix("```")?;
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    debug!("Stripped code fence from the model reply");
    Some(inner.trim())
}
