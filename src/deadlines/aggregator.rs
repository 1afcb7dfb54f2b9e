use chrono::{DateTime, FixedOffset, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use super::format::{TimeRemaining, format_due};
use crate::lms::{Assignment, Course, LmsApi};

/// Name fragments of assessments that belong to the scholarship calculator, not the digest.
const EXCLUDED_NAME_FRAGMENTS: [&str; 2] = ["midterm", "endterm"];

#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineEntry {
    /// 1-based, running across the whole digest.
    pub index: usize,
    pub course: String,
    pub name: String,
    pub due: DateTime<Utc>,
    pub remaining: TimeRemaining,
}

impl DeadlineEntry {
    pub fn render(&self, offset: &FixedOffset) -> String {
        format!(
            "{}. {} ({} left)\n📝 {} is due - {}",
            self.index,
            format_due(self.due, offset),
            self.remaining.render(),
            self.name,
            self.course
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DigestOutcome {
    /// The token did not resolve to an LMS user.
    InvalidToken,
    NoCourses,
    NoDeadlines,
    Digest(Vec<DeadlineEntry>),
}

pub fn is_tracked(assignment: &Assignment, now: DateTime<Utc>) -> bool {
    let Some(due) = assignment.due_at() else {
        return false;
    };
    let name = assignment.name.to_lowercase();
    due >= now
        && !EXCLUDED_NAME_FRAGMENTS
            .iter()
            .any(|fragment| name.contains(fragment))
}

/// Filters, sorts and numbers the fetched assignments.
///
/// Courses keep their order; entries inside a course are ordered by due time.
pub fn collect_upcoming(
    per_course: Vec<(Course, Vec<Assignment>)>,
    now: DateTime<Utc>,
) -> Vec<DeadlineEntry> {
    let mut entries = Vec::new();
    for (course, assignments) in per_course {
        let mut upcoming: Vec<(DateTime<Utc>, Assignment)> = assignments
            .into_iter()
            .filter(|a| is_tracked(a, now))
            .filter_map(|a| a.due_at().map(|due| (due, a)))
            .collect();
        upcoming.sort_by_key(|(due, _)| *due);

        for (due, assignment) in upcoming {
            entries.push(DeadlineEntry {
                index: entries.len() + 1,
                course: course.full_name.clone(),
                name: assignment.name,
                due,
                remaining: TimeRemaining::between(now, due),
            });
        }
    }
    entries
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid(i64),
    Rejected,
    Unreachable,
}

/// Builds deadline digests from the LMS.
///
/// Every remote failure degrades to an empty result for that call; only a
/// failed identity lookup ends the digest early.
pub struct DeadlineAggregator {
    lms: Arc<dyn LmsApi>,
    max_concurrent_requests: usize,
}

impl DeadlineAggregator {
    pub fn new(lms: Arc<dyn LmsApi>, max_concurrent_requests: usize) -> Self {
        Self {
            lms,
            max_concurrent_requests: max_concurrent_requests.max(1),
        }
    }

    /// Distinguishes a rejected token from an LMS that could not be reached.
    pub async fn check_token(&self, token: &str) -> TokenStatus {
        match self.lms.site_info(token).await {
            Ok(info) => match info.userid {
                Some(user_id) => TokenStatus::Valid(user_id),
                None => {
                    warn!("Site info response carried no user id.");
                    TokenStatus::Rejected
                }
            },
            Err(e) if e.is_invalid_token() => {
                info!("LMS rejected the token.");
                TokenStatus::Rejected
            }
            Err(e) => {
                warn!(error = %e, "Failed to resolve token identity.");
                TokenStatus::Unreachable
            }
        }
    }

    /// LMS user id owning `token`, or `None` if the token can't be resolved for any reason.
    pub async fn resolve_identity(&self, token: &str) -> Option<i64> {
        match self.check_token(token).await {
            TokenStatus::Valid(user_id) => Some(user_id),
            TokenStatus::Rejected | TokenStatus::Unreachable => None,
        }
    }

    pub async fn list_courses(&self, token: &str, user_id: i64) -> Vec<Course> {
        self.lms
            .user_courses(token, user_id)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id, error = %e, "Failed to retrieve courses.");
                Vec::new()
            })
    }

    pub async fn list_assignments(&self, token: &str, course_id: i64) -> Vec<Assignment> {
        self.lms
            .course_assignments(token, course_id)
            .await
            .unwrap_or_else(|e| {
                warn!(course_id, error = %e, "Failed to retrieve assignments, skipping course.");
                Vec::new()
            })
    }

    pub async fn build_digest(&self, token: &str, now: DateTime<Utc>) -> DigestOutcome {
        let Some(user_id) = self.resolve_identity(token).await else {
            return DigestOutcome::InvalidToken;
        };

        let courses = self.list_courses(token, user_id).await;
        if courses.is_empty() {
            return DigestOutcome::NoCourses;
        }
        let course_count = courses.len();

        // `buffered` keeps course order while running up to the cap concurrently.
        let per_course: Vec<(Course, Vec<Assignment>)> = stream::iter(courses)
            .map(|course| async move {
                let assignments = self.list_assignments(token, course.id).await;
                (course, assignments)
            })
            .buffered(self.max_concurrent_requests)
            .collect()
            .await;

        let entries = collect_upcoming(per_course, now);
        info!(
            user_id,
            courses = course_count,
            deadlines = entries.len(),
            "Deadline digest assembled."
        );
        if entries.is_empty() {
            DigestOutcome::NoDeadlines
        } else {
            DigestOutcome::Digest(entries)
        }
    }
}
