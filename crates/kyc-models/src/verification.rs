//! Verification reports returned by the detection endpoints.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::job_status::JobId;

/// Which detector produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Video,
    Document,
    Face,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Video => "video",
            AnalysisKind::Document => "document",
            AnalysisKind::Face => "face",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Usage log identifier. The API has returned both numbers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum UsageLogId {
    Int(i64),
    Text(String),
}

impl UsageLogId {
    /// Read an id from a JSON number or non-blank string. Integral floats
    /// such as `42.0` become `Int`; other numbers keep their text form.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(id) = n.as_i64() {
                    return Some(UsageLogId::Int(id));
                }
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                        Some(UsageLogId::Int(f as i64))
                    }
                    _ => Some(UsageLogId::Text(n.to_string())),
                }
            }
            Value::String(id) if !id.trim().is_empty() => Some(UsageLogId::Text(id.clone())),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for UsageLogId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        UsageLogId::from_value(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid usage_log_id: {}", value)))
    }
}

impl fmt::Display for UsageLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageLogId::Int(id) => write!(f, "{}", id),
            UsageLogId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for UsageLogId {
    fn from(id: i64) -> Self {
        UsageLogId::Int(id)
    }
}

impl From<String> for UsageLogId {
    fn from(id: String) -> Self {
        match id.parse::<i64>() {
            Ok(n) => UsageLogId::Int(n),
            Err(_) => UsageLogId::Text(id),
        }
    }
}

/// Verdict shown to the user for a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Display label (e.g. `REAL`, `FAKE`, `MATCH`)
    pub label: String,
    /// Whether the outcome is favourable (genuine media or a face match)
    pub positive: bool,
}

/// Lenient view of a verification result.
///
/// Only the fields the client interprets are typed; everything else the
/// detector returns is kept in `extra`. Typed fields accept the loose
/// encodings detectors emit (`"0.87"`, `"true"`, `1`, `42.0`); a value that
/// cannot be read is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    #[serde(default, deserialize_with = "lenient_usage_log_id", skip_serializing_if = "Option::is_none")]
    pub usage_log_id: Option<UsageLogId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub is_real: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(
        default,
        rename = "match",
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub matched: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub is_match: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetectionReport {
    /// Read a report from a JSON payload.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Whether the report can be rated through the feedback endpoint.
    pub fn accepts_feedback(&self) -> bool {
        self.usage_log_id.is_some()
    }

    /// Compute the verdict for display.
    pub fn verdict(&self, kind: AnalysisKind) -> Verdict {
        if kind == AnalysisKind::Face {
            let matched = self.matched.unwrap_or(false)
                || self.verified.unwrap_or(false)
                || self.is_match.unwrap_or(false);
            let label = if matched { "MATCH" } else { "NO MATCH" };
            return Verdict {
                label: label.to_string(),
                positive: matched,
            };
        }

        let server_verdict = self.verdict.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let positive = self.is_real.unwrap_or(false)
            || server_verdict
                .map(|v| v.eq_ignore_ascii_case("GENUINE") || v.eq_ignore_ascii_case("REAL"))
                .unwrap_or(false);
        let fallback = if positive { "REAL" } else { "FAKE" };

        Verdict {
            label: server_verdict.unwrap_or(fallback).to_string(),
            positive,
        }
    }
}

fn lenient_usage_log_id<'de, D>(deserializer: D) -> Result<Option<UsageLogId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(UsageLogId::from_value(&value))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Outcome of `POST /api/v1/video-deepfake/verify`.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSubmission {
    /// The server analyzed the video inline
    Completed(DetectionReport),
    /// The server queued the video; poll the job for the result
    Queued(JobId),
}

impl VideoSubmission {
    /// Interpret a verify response body.
    pub fn from_body(body: Value) -> Result<Self, serde_json::Error> {
        let job_id = match body.get("job_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        match job_id {
            Some(id) => Ok(VideoSubmission::Queued(JobId::from_string(id))),
            None => DetectionReport::from_value(body).map(VideoSubmission::Completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_keeps_unknown_fields() {
        let report = DetectionReport::from_value(json!({
            "confidence": 0.87,
            "usage_log_id": 42,
            "frames_analyzed": 120
        }))
        .unwrap();

        assert_eq!(report.confidence, Some(0.87));
        assert_eq!(report.usage_log_id, Some(UsageLogId::Int(42)));
        assert_eq!(report.extra.get("frames_analyzed"), Some(&json!(120)));
        assert!(report.accepts_feedback());
    }

    #[test]
    fn test_usage_log_id_as_string() {
        let report = DetectionReport::from_value(json!({"usage_log_id": "log-7"})).unwrap();
        assert_eq!(report.usage_log_id, Some(UsageLogId::Text("log-7".into())));
        assert_eq!(UsageLogId::from("15".to_string()), UsageLogId::Int(15));
    }

    #[test]
    fn test_loose_field_encodings() {
        let report = DetectionReport::from_value(json!({
            "confidence": "0.87",
            "usage_log_id": 42.0,
            "is_real": "true",
            "match": 1,
            "verified": "no"
        }))
        .unwrap();

        assert_eq!(report.confidence, Some(0.87));
        assert_eq!(report.usage_log_id, Some(UsageLogId::Int(42)));
        assert_eq!(report.is_real, Some(true));
        assert_eq!(report.matched, Some(true));
        assert_eq!(report.verified, Some(false));
        assert_eq!(report.verdict(AnalysisKind::Video).label, "REAL");

        let fractional = DetectionReport::from_value(json!({"usage_log_id": 42.5})).unwrap();
        assert_eq!(fractional.usage_log_id, Some(UsageLogId::Text("42.5".into())));
    }

    #[test]
    fn test_unreadable_fields_are_absent() {
        let report = DetectionReport::from_value(json!({
            "confidence": "high",
            "usage_log_id": {"id": 3},
            "is_real": "maybe",
            "is_match": null
        }))
        .unwrap();

        assert_eq!(report.confidence, None);
        assert_eq!(report.usage_log_id, None);
        assert_eq!(report.is_real, None);
        assert_eq!(report.is_match, None);
        assert!(!report.accepts_feedback());
    }

    #[test]
    fn test_usage_log_id_rejects_non_ids() {
        assert!(serde_json::from_value::<UsageLogId>(json!(true)).is_err());
        assert!(serde_json::from_value::<UsageLogId>(json!("  ")).is_err());
        assert_eq!(serde_json::from_value::<UsageLogId>(json!(7)).unwrap(), UsageLogId::Int(7));
    }

    #[test]
    fn test_media_verdicts() {
        let genuine = DetectionReport {
            verdict: Some("GENUINE".into()),
            ..Default::default()
        };
        assert_eq!(
            genuine.verdict(AnalysisKind::Document),
            Verdict { label: "GENUINE".into(), positive: true }
        );

        let real_flag = DetectionReport {
            is_real: Some(true),
            ..Default::default()
        };
        assert_eq!(real_flag.verdict(AnalysisKind::Video).label, "REAL");

        let empty = DetectionReport::default();
        let verdict = empty.verdict(AnalysisKind::Video);
        assert_eq!(verdict.label, "FAKE");
        assert!(!verdict.positive);

        let deepfake = DetectionReport {
            verdict: Some("DEEPFAKE".into()),
            ..Default::default()
        };
        assert_eq!(
            deepfake.verdict(AnalysisKind::Video),
            Verdict { label: "DEEPFAKE".into(), positive: false }
        );
    }

    #[test]
    fn test_face_verdicts() {
        let report = DetectionReport::from_value(json!({"match": true})).unwrap();
        assert_eq!(report.verdict(AnalysisKind::Face).label, "MATCH");

        let report = DetectionReport::from_value(json!({"is_match": false})).unwrap();
        let verdict = report.verdict(AnalysisKind::Face);
        assert_eq!(verdict.label, "NO MATCH");
        assert!(!verdict.positive);
    }

    #[test]
    fn test_video_submission_modes() {
        let queued = VideoSubmission::from_body(json!({"job_id": "abc123"})).unwrap();
        assert_eq!(queued, VideoSubmission::Queued(JobId::from_string("abc123")));

        let inline = VideoSubmission::from_body(json!({"is_real": true, "job_id": ""})).unwrap();
        assert!(matches!(inline, VideoSubmission::Completed(r) if r.is_real == Some(true)));

        assert!(VideoSubmission::from_body(json!("oops")).is_err());
    }
}
