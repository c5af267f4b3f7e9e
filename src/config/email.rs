use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP relay and recipients for emailed reports. The relay is reached with
/// STARTTLS and the user/password pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub sender_email: String,
    pub recipients: Vec<String>,
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl EmailConfig {
    /// Reads `SMTP_SERVER`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASSWORD`,
    /// `SENDER_EMAIL` and the comma-separated `EMAIL_RECIPIENTS`.
    /// `Ok(None)` when `SMTP_SERVER` is unset.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let Some(smtp_server) = lookup("SMTP_SERVER") else {
            return Ok(None);
        };

        let required = |key: &str| {
            lookup(key).ok_or_else(|| TrackerError::MissingConfigError {
                field: key.to_string(),
            })
        };

        let smtp_port = match lookup("SMTP_PORT") {
            None => DEFAULT_SMTP_PORT,
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| TrackerError::InvalidConfigValueError {
                    field: "SMTP_PORT".to_string(),
                    value: raw.clone(),
                    reason: "not a valid port".to_string(),
                })?,
        };

        Ok(Some(Self {
            smtp_server,
            smtp_port,
            smtp_user: required("SMTP_USER")?,
            smtp_password: required("SMTP_PASSWORD")?,
            sender_email: required("SENDER_EMAIL")?,
            recipients: required("EMAIL_RECIPIENTS")?
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        }))
    }
}

impl Validate for EmailConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("smtp_server", &self.smtp_server)?;
        validation::validate_range("smtp_port", self.smtp_port, 1, u16::MAX)?;
        validation::validate_non_empty_string("smtp_user", &self.smtp_user)?;
        validation::validate_email("sender_email", &self.sender_email)?;

        if self.recipients.is_empty() {
            return Err(TrackerError::ValidationError {
                message: "at least one email recipient must be configured".to_string(),
            });
        }
        for recipient in &self.recipients {
            validation::validate_email("recipients", recipient)?;
        }
        Ok(())
    }
}
