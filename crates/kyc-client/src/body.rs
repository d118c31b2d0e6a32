//! Response capture and lenient body parsing.

use serde_json::Value;

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// JSON reply, as most endpoints send.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, Some("application/json"), body.to_string())
    }

    /// Read status, content type and body from a reqwest response.
    pub async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(Self {
            status,
            content_type,
            body,
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn parsed(&self) -> ParsedBody {
        parse_lenient(self.content_type.as_deref(), &self.body)
    }
}

/// Outcome of lenient body parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Text(String),
    Empty,
}

impl ParsedBody {
    pub fn into_json(self) -> Option<Value> {
        match self {
            ParsedBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Parse a body as JSON whenever possible.
///
/// Some endpoints label JSON as `text/plain` or send no content type, so a
/// non-empty body is tried as JSON regardless of the declared type and only
/// kept as text when that fails.
pub fn parse_lenient(content_type: Option<&str>, body: &str) -> ParsedBody {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return ParsedBody::Empty;
    }

    let declared_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ParsedBody::Json(value),
        Err(e) => {
            if declared_json {
                tracing::debug!("Body declared as JSON failed to parse: {}", e);
            }
            ParsedBody::Text(trimmed.to_string())
        }
    }
}

/// Human-readable detail carried by an error body.
pub fn error_detail(parsed: &ParsedBody) -> Option<String> {
    match parsed {
        ParsedBody::Json(value) => ["detail", "error", "message"]
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(detail_text),
        ParsedBody::Text(text) => Some(text.clone()),
        ParsedBody::Empty => None,
    }
}

fn detail_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::String(_) | Value::Null => None,
        // FastAPI validation errors arrive as a list of objects with `msg`
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                Some(value.to_string())
            } else {
                Some(msgs.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}
