use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::models::annotation::Annotation;
use crate::models::drill::Drill;
use crate::models::relation::RelationStatus;
use crate::models::user::{User, UserRole};
use crate::models::video::Video;
use crate::policy::relation::{RelationView, RequestType};

/// Milliseconds since the Unix epoch, the timestamp format of every response body.
pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSignin {
    pub user_id: Uuid,
    pub role: UserRole,
    pub access_token: String,
    pub refresh_token: String,
    pub server_time: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputUser {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_timestamp: u64,
}

impl From<&User> for OutputUser {
    fn from(user: &User) -> Self {
        OutputUser {
            id: user.id,
            user_name: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.clone(),
            created_timestamp: unix_millis(user.created_timestamp),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputUserSummary {
    pub id: Uuid,
    pub user_name: String,
    pub display_name: String,
    pub role: String,
}

impl From<&User> for OutputUserSummary {
    fn from(user: &User) -> Self {
        OutputUserSummary {
            id: user.id,
            user_name: user.username.clone(),
            display_name: user.display_name(),
            role: user.role.clone(),
        }
    }
}

/// A relation as one of its parties sees it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRelation {
    pub counterpart: OutputUserSummary,
    pub status: RelationStatus,
    pub request_type: RequestType,
    pub request_timestamp: u64,
    pub decision_timestamp: Option<u64>,
    pub feedback: Option<String>,
}

impl OutputRelation {
    pub fn new(view: RelationView, counterpart: &User) -> Self {
        OutputRelation {
            counterpart: OutputUserSummary::from(counterpart),
            status: view.status,
            request_type: view.request_type,
            request_timestamp: unix_millis(view.request_timestamp),
            decision_timestamp: view.decision_timestamp.map(unix_millis),
            feedback: view.feedback,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputCoachRelations {
    pub pending: Vec<OutputRelation>,
    pub students: Vec<OutputRelation>,
    pub declined: Vec<OutputRelation>,
}

impl OutputCoachRelations {
    /// Groups a coach's relations by status. Pending requests the coach has to decide on come
    /// before the ones the coach sent; each group is otherwise newest first.
    pub fn from_relations(mut relations: Vec<OutputRelation>) -> Self {
        relations.sort_by(|a, b| b.request_timestamp.cmp(&a.request_timestamp));

        let mut overview = OutputCoachRelations::default();

        for relation in relations {
            match relation.status {
                RelationStatus::Requested => overview.pending.push(relation),
                RelationStatus::Approved => overview.students.push(relation),
                RelationStatus::Rejected => overview.declined.push(relation),
                RelationStatus::Removed => (),
            }
        }

        overview
            .pending
            .sort_by_key(|r| r.request_type != RequestType::Received);

        overview
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputStudentRelations {
    pub history: Vec<OutputRelation>,
}

impl OutputStudentRelations {
    pub fn from_relations(mut relations: Vec<OutputRelation>) -> Self {
        relations.sort_by(|a, b| {
            let a_latest = a.decision_timestamp.unwrap_or(a.request_timestamp);
            let b_latest = b.decision_timestamp.unwrap_or(b.request_timestamp);
            b_latest.cmp(&a_latest)
        });

        OutputStudentRelations { history: relations }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRelationRequested {
    pub relation: OutputRelation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRelationActionResult {
    pub status: RelationStatus,
    pub decision_timestamp: Option<u64>,
    pub feedback: Option<String>,
    pub revoked_video_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputVideo {
    pub id: Uuid,
    /// `None` when the stored file can no longer be found.
    pub url: Option<String>,
    pub title: String,
    pub is_favourite: bool,
    pub student_id: Uuid,
    pub coach_id: Option<Uuid>,
    pub student_name: String,
    pub has_access: bool,
    pub size_bytes: i64,
    pub created_timestamp: u64,
}

impl OutputVideo {
    pub fn new(
        video: &Video,
        student_name: String,
        is_favourite: bool,
        url: Option<String>,
    ) -> Self {
        let title = if video.original_name.is_empty() {
            video.file_name.clone()
        } else {
            video.original_name.clone()
        };

        OutputVideo {
            id: video.id,
            url,
            title,
            is_favourite,
            student_id: video.student_id,
            coach_id: video.coach_id,
            student_name,
            has_access: video.has_access,
            size_bytes: video.size_bytes,
            created_timestamp: unix_millis(video.created_timestamp),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputVideoList {
    pub list: Vec<OutputVideo>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDeletedCount {
    pub deleted_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputAnnotation {
    pub id: Uuid,
    pub video_id: Uuid,
    pub author_id: Uuid,
    pub data: serde_json::Value,
    pub created_timestamp: u64,
    pub modified_timestamp: Option<u64>,
}

impl From<Annotation> for OutputAnnotation {
    fn from(annotation: Annotation) -> Self {
        OutputAnnotation {
            id: annotation.id,
            video_id: annotation.video_id,
            author_id: annotation.author_id,
            data: annotation.data,
            created_timestamp: unix_millis(annotation.created_timestamp),
            modified_timestamp: annotation.modified_timestamp.map(unix_millis),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDrill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub owner_name: String,
    pub is_private: bool,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub created_timestamp: u64,
    pub modified_timestamp: u64,
}

impl OutputDrill {
    pub fn new(drill: &Drill, owner_name: String, url: Option<String>) -> Self {
        OutputDrill {
            id: drill.id,
            user_id: drill.user_id,
            owner_name,
            is_private: drill.is_private,
            title: drill.title.clone(),
            description: drill.description.clone(),
            url,
            created_timestamp: unix_millis(drill.created_timestamp),
            modified_timestamp: unix_millis(drill.modified_timestamp),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ErrorType {
    IncorrectlyFormed,
    ConflictWithExisting,
    IncorrectCredential,
    TokenExpired,
    TokenMissing,
    WrongTokenType,
    UserDisallowed,
    UserDoesNotExist,
    RelationDoesNotExist,
    VideoDoesNotExist,
    AnnotationDoesNotExist,
    DrillDoesNotExist,
    InputTooLarge,
    TooManyRequested,
    InternalError,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerErrorResponse {
    pub err_type: ErrorType,
    pub err_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn summary(name: &str) -> OutputUserSummary {
        OutputUserSummary {
            id: Uuid::now_v7(),
            user_name: String::from(name),
            display_name: String::from(name),
            role: String::from("student"),
        }
    }

    fn relation(
        status: RelationStatus,
        request_type: RequestType,
        requested: u64,
        decided: Option<u64>,
    ) -> OutputRelation {
        OutputRelation {
            counterpart: summary("someone"),
            status,
            request_type,
            request_timestamp: requested,
            decision_timestamp: decided,
            feedback: None,
        }
    }

    #[test]
    fn test_unix_millis() {
        assert_eq!(unix_millis(UNIX_EPOCH), 0);
        assert_eq!(unix_millis(UNIX_EPOCH + Duration::from_millis(1500)), 1500);
    }

    #[test]
    fn test_coach_overview_grouping() {
        let overview = OutputCoachRelations::from_relations(vec![
            relation(RelationStatus::Requested, RequestType::Sent, 50, None),
            relation(RelationStatus::Approved, RequestType::Received, 10, Some(20)),
            relation(RelationStatus::Requested, RequestType::Received, 30, None),
            relation(RelationStatus::Rejected, RequestType::Received, 5, Some(6)),
            relation(RelationStatus::Requested, RequestType::Received, 40, None),
            relation(RelationStatus::Approved, RequestType::Sent, 15, Some(16)),
        ]);

        assert_eq!(overview.pending.len(), 3);
        assert_eq!(overview.pending[0].request_timestamp, 40);
        assert_eq!(overview.pending[1].request_timestamp, 30);
        assert_eq!(overview.pending[2].request_type, RequestType::Sent);

        assert_eq!(overview.students.len(), 2);
        assert_eq!(overview.students[0].request_timestamp, 15);

        assert_eq!(overview.declined.len(), 1);
    }

    #[test]
    fn test_student_history_newest_first() {
        let history = OutputStudentRelations::from_relations(vec![
            relation(RelationStatus::Approved, RequestType::Sent, 10, Some(100)),
            relation(RelationStatus::Requested, RequestType::Sent, 50, None),
            relation(RelationStatus::Rejected, RequestType::Received, 20, Some(30)),
        ])
        .history;

        let order: Vec<u64> = history.iter().map(|r| r.request_timestamp).collect();
        assert_eq!(order, vec![10, 50, 20]);
    }

    #[test]
    fn test_relation_wire_format() {
        let json = serde_json::to_value(relation(
            RelationStatus::Requested,
            RequestType::Received,
            1,
            None,
        ))
        .unwrap();

        assert_eq!(json["status"], "requested");
        assert_eq!(json["requestType"], "received");
        assert_eq!(json["requestTimestamp"], 1);
        assert!(json["decisionTimestamp"].is_null());
        assert_eq!(json["counterpart"]["userName"], "someone");
    }
}
