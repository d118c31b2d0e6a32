//! Beta feedback on verification results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::verification::UsageLogId;

/// User rating of a verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackChoice {
    Correct,
    Wrong,
    Unsure,
}

impl FeedbackChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackChoice::Correct => "correct",
            FeedbackChoice::Wrong => "wrong",
            FeedbackChoice::Unsure => "unsure",
        }
    }
}

impl fmt::Display for FeedbackChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeedbackChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "correct" => Ok(FeedbackChoice::Correct),
            "wrong" => Ok(FeedbackChoice::Wrong),
            "unsure" => Ok(FeedbackChoice::Unsure),
            other => Err(format!(
                "Unknown feedback '{}', expected correct, wrong or unsure",
                other
            )),
        }
    }
}

/// Body of `POST /api/v1/beta/feedback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub usage_log_id: UsageLogId,
    pub user_feedback: FeedbackChoice,
    /// What the media actually was, when the user knows it
    pub user_actual_label: Option<String>,
}

/// Response of the feedback endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feedback_request_wire_format() {
        let req = FeedbackRequest {
            usage_log_id: UsageLogId::Int(42),
            user_feedback: FeedbackChoice::Wrong,
            user_actual_label: Some("fake".into()),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"usage_log_id": 42, "user_feedback": "wrong", "user_actual_label": "fake"})
        );

        let no_label = FeedbackRequest {
            user_actual_label: None,
            ..req
        };
        assert_eq!(serde_json::to_value(&no_label).unwrap()["user_actual_label"], json!(null));
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!("Correct".parse::<FeedbackChoice>(), Ok(FeedbackChoice::Correct));
        assert_eq!("unsure".parse::<FeedbackChoice>(), Ok(FeedbackChoice::Unsure));
        assert!("maybe".parse::<FeedbackChoice>().is_err());
    }

    #[test]
    fn test_response_defaults() {
        let resp: FeedbackResponse = serde_json::from_str("{}").unwrap();
        assert!(!resp.success);
        assert!(resp.detail.is_none());
    }
}
