use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contact message left through the public form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    /// `User-Agent` of the submitting browser
    pub device: Option<String>,
    pub read: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitMessageRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug)]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub device: Option<String>,
}

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_MESSAGE_LEN: usize = 5000;

impl SubmitMessageRequest {
    /// Trim and validate the form fields.
    pub fn validate(self, device: Option<String>) -> Result<NewMessage, String> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_string();
        let message = self.message.trim().to_string();

        if name.is_empty() {
            return Err("Please add a name".to_string());
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(format!("Name can not be more than {} characters", MAX_NAME_LEN));
        }
        if !is_valid_email(&email) {
            return Err("Please add a valid email".to_string());
        }
        if message.is_empty() {
            return Err("Please add a message".to_string());
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(format!(
                "Message can not be more than {} characters",
                MAX_MESSAGE_LEN
            ));
        }

        Ok(NewMessage {
            name,
            email,
            message,
            device,
        })
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, message: &str) -> SubmitMessageRequest {
        SubmitMessageRequest {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_validate_trims_fields() {
        let msg = request("  Ada ", " ada@example.com ", " hello ")
            .validate(Some("curl/8".to_string()))
            .unwrap();
        assert_eq!(msg.name, "Ada");
        assert_eq!(msg.email, "ada@example.com");
        assert_eq!(msg.message, "hello");
        assert_eq!(msg.device.as_deref(), Some("curl/8"));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(request("", "ada@example.com", "hi").validate(None).is_err());
        assert!(request("Ada", "ada@example.com", "   ").validate(None).is_err());
        assert!(request("Ada", "not-an-email", "hi").validate(None).is_err());
        assert!(request("Ada", "ada@localhost", "hi").validate(None).is_err());
        assert!(request("Ada", "a b@example.com", "hi").validate(None).is_err());
        assert!(request(&"x".repeat(MAX_NAME_LEN + 1), "ada@example.com", "hi")
            .validate(None)
            .is_err());
    }
}
