//! Moodle web-service client.

pub mod client;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use client::MoodleClient;
pub use models::{Assignment, Course, SiteInfo};

#[derive(Error, Debug)]
pub enum LmsError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("LMS returned non-success status: {0}")]
    Status(reqwest::StatusCode),
    #[error("Malformed LMS response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("LMS exception {errorcode}: {message}")]
    Api { errorcode: String, message: String },
}

impl LmsError {
    /// Token rejected by the LMS, as opposed to the LMS being unreachable.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, LmsError::Api { errorcode, .. } if errorcode == "invalidtoken")
    }
}

/// The three read operations the bot needs from the LMS.
#[async_trait]
pub trait LmsApi: Send + Sync {
    async fn site_info(&self, token: &str) -> Result<SiteInfo, LmsError>;

    async fn user_courses(&self, token: &str, user_id: i64) -> Result<Vec<Course>, LmsError>;

    async fn course_assignments(
        &self,
        token: &str,
        course_id: i64,
    ) -> Result<Vec<Assignment>, LmsError>;
}
