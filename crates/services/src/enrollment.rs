use std::env;

use progress_core::model::{ProgramId, UserId};
use reqwest::Client;
use serde::Deserialize;

use crate::error::EnrollmentError;

/// Enrollment is a gating fact owned by an external service: whether a user
/// may interact with a program's tasks at all. The core treats it as a
/// precondition checked by callers, never inside the progress operations.
#[derive(Clone, Debug)]
pub struct EnrollmentConfig {
    pub base_url: String,
}

impl EnrollmentConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("PROGRESS_ENROLLMENT_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url })
    }
}

#[derive(Clone)]
pub struct EnrollmentClient {
    client: Client,
    config: Option<EnrollmentConfig>,
}

impl EnrollmentClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(EnrollmentConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<EnrollmentConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Asks the enrollment service whether `user` may work on `program`.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError` when the client is not configured, the
    /// request fails, or the service answers with a non-success status.
    pub async fn check(
        &self,
        user: UserId,
        program: ProgramId,
    ) -> Result<bool, EnrollmentError> {
        let config = self.config.as_ref().ok_or(EnrollmentError::Disabled)?;

        let url = format!(
            "{}/enrollment-status",
            config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .query(&[
                ("user_id", user.to_string()),
                ("program_id", program.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EnrollmentError::HttpStatus(response.status()));
        }

        let body: EnrollmentStatusResponse = response.json().await?;
        Ok(body.is_enrolled)
    }
}

#[derive(Debug, Deserialize)]
struct EnrollmentStatusResponse {
    is_enrolled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_matches_the_service() {
        let body: EnrollmentStatusResponse =
            serde_json::from_str(r#"{"is_enrolled": true, "plan": "standard"}"#).unwrap();
        assert!(body.is_enrolled);
    }

    #[test]
    fn blank_base_url_counts_as_unconfigured() {
        let client = EnrollmentClient::new(None);
        assert!(!client.enabled());
    }
}
