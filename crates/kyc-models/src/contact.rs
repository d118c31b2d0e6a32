//! Contact and demo request form.

use serde::{Deserialize, Serialize};

/// Maximum accepted message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Body of `POST /api/v1/contact/submit`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub industry: String,
    pub message: String,
    /// Which form was used (`contact`, `demo`, ...)
    pub form_type: String,
}

impl ContactSubmission {
    /// Validate the submission.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }

        if !is_plausible_email(&self.email) {
            return Err("A valid email address is required".to_string());
        }

        if self.message.trim().is_empty() {
            return Err("Message is required".to_string());
        }

        if self.message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            ));
        }

        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Response of the contact endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ContactSubmission {
        ContactSubmission {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            company: "Analytical".into(),
            industry: "fintech".into(),
            message: "We would like a demo.".into(),
            form_type: "demo".into(),
        }
    }

    #[test]
    fn test_valid_submission() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_required_fields() {
        let mut s = valid();
        s.name = "  ".into();
        assert!(s.validate().is_err());

        let mut s = valid();
        s.message = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_email_shape() {
        for bad in ["", "ada", "ada@", "@example.com", "ada@example", "ada@.com", "a@b@c.com"] {
            let mut s = valid();
            s.email = bad.into();
            assert!(s.validate().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_message_limit() {
        let mut s = valid();
        s.message = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(s.validate().is_err());
    }
}
