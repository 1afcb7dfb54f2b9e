use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `core_webservice_get_site_info` response. Only the fields the bot reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInfo {
    pub userid: Option<i64>,
    pub fullname: Option<String>,
    pub sitename: Option<String>,
}

/// One entry of `core_enrol_get_users_courses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    #[serde(rename = "fullname")]
    pub full_name: String,
    #[serde(rename = "shortname", default)]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub name: String,
    /// Epoch seconds, UTC. `0` means the assignment has no due date.
    #[serde(rename = "duedate", default)]
    pub due_timestamp: i64,
}

impl Assignment {
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.due_timestamp, 0)
    }
}

/// `mod_assign_get_assignments` response: assignments nested per course.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentsResponse {
    #[serde(default)]
    pub courses: Vec<CourseAssignments>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseAssignments {
    pub id: i64,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl AssignmentsResponse {
    pub fn into_assignments(self) -> Vec<Assignment> {
        self.courses
            .into_iter()
            .flat_map(|course| course.assignments)
            .collect()
    }
}

/// Error payload the web service returns with HTTP 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmsException {
    pub exception: String,
    #[serde(default)]
    pub errorcode: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
