use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::models::{Assignment, AssignmentsResponse, Course, LmsException, SiteInfo};
use super::{LmsApi, LmsError};

const FN_SITE_INFO: &str = "core_webservice_get_site_info";
const FN_USER_COURSES: &str = "core_enrol_get_users_courses";
const FN_ASSIGNMENTS: &str = "mod_assign_get_assignments";

/// REST client for a Moodle `webservice/rest/server.php` endpoint.
///
/// The token travels as the `wstoken` query parameter. Each call is bounded
/// by the client timeout and never retried.
pub struct MoodleClient {
    client: Client,
    endpoint: String,
}

impl MoodleClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LmsError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        token: &str,
        function: &str,
        extra: &[(&str, String)],
    ) -> Result<T, LmsError> {
        let mut params: Vec<(&str, String)> = vec![
            ("wstoken", token.to_string()),
            ("wsfunction", function.to_string()),
            ("moodlewsrestformat", "json".to_string()),
        ];
        params.extend(extra.iter().cloned());

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LmsError::Status(status));
        }

        let body = response.bytes().await?;
        debug!(function, bytes = body.len(), "LMS call completed.");
        decode_response(&body)
    }
}

/// Decodes a web-service body, turning an exception payload into `LmsError::Api`.
pub(crate) fn decode_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, LmsError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if value.get("exception").is_some() {
        let exception: LmsException = serde_json::from_value(value)?;
        return Err(LmsError::Api {
            errorcode: exception.errorcode.unwrap_or(exception.exception),
            message: exception.message.unwrap_or_default(),
        });
    }
    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl LmsApi for MoodleClient {
    async fn site_info(&self, token: &str) -> Result<SiteInfo, LmsError> {
        self.call(token, FN_SITE_INFO, &[]).await
    }

    async fn user_courses(&self, token: &str, user_id: i64) -> Result<Vec<Course>, LmsError> {
        self.call(token, FN_USER_COURSES, &[("userid", user_id.to_string())])
            .await
    }

    async fn course_assignments(
        &self,
        token: &str,
        course_id: i64,
    ) -> Result<Vec<Assignment>, LmsError> {
        let response: AssignmentsResponse = self
            .call(token, FN_ASSIGNMENTS, &[("courseids[0]", course_id.to_string())])
            .await?;
        Ok(response.into_assignments())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_site_info() {
        let body = br#"{"sitename":"AITU","userid":1234,"fullname":"Aida K"}"#;
        let info: SiteInfo = decode_response(body).unwrap();
        assert_eq!(info.userid, Some(1234));
    }

    #[test]
    fn test_decode_exception_payload() {
        let body = br#"{"exception":"moodle_exception","errorcode":"invalidtoken","message":"Invalid token - token not found"}"#;
        let err = decode_response::<SiteInfo>(body).unwrap_err();
        assert!(err.is_invalid_token());
        assert!(err.to_string().contains("token not found"));
    }

    #[test]
    fn test_decode_courses() {
        let body = br#"[{"id":10,"fullname":"Algorithms","shortname":"ALG"},{"id":11,"fullname":"Physics"}]"#;
        let courses: Vec<Course> = decode_response(body).unwrap();
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].full_name, "Algorithms");
        assert_eq!(courses[1].short_name, None);
    }

    #[test]
    fn test_decode_nested_assignments() {
        let body = br#"{
            "courses": [
                {"id": 10, "assignments": [
                    {"id": 1, "name": "Lab 1", "duedate": 1700000000},
                    {"id": 2, "name": "Essay", "duedate": 0}
                ]},
                {"id": 11, "assignments": []}
            ],
            "warnings": []
        }"#;
        let response: AssignmentsResponse = decode_response(body).unwrap();
        let assignments = response.into_assignments();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].due_timestamp, 1_700_000_000);
        assert_eq!(assignments[1].due_timestamp, 0);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(matches!(
            decode_response::<Vec<Course>>(b"<html>502</html>"),
            Err(LmsError::Decode(_))
        ));
    }
}
