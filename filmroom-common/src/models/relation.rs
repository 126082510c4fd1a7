use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::relations;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationStatus {
    Requested,
    Approved,
    Rejected,
    /// Never stored. Reported to callers after a relation row has been deleted.
    Removed,
}

impl RelationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationStatus::Requested => "requested",
            RelationStatus::Approved => "approved",
            RelationStatus::Rejected => "rejected",
            RelationStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for RelationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownRelationStatus;

impl std::error::Error for UnknownRelationStatus {}

impl fmt::Display for UnknownRelationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown relation status")
    }
}

impl FromStr for RelationStatus {
    type Err = UnknownRelationStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(RelationStatus::Requested),
            "approved" => Ok(RelationStatus::Approved),
            "rejected" => Ok(RelationStatus::Rejected),
            "removed" => Ok(RelationStatus::Removed),
            _ => Err(UnknownRelationStatus),
        }
    }
}

/// One row per unordered pair of users. `user_low_id` is always the smaller id.
#[derive(Clone, Debug, Serialize, Deserialize, Queryable, QueryableByName)]
#[diesel(table_name = relations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Relation {
    pub user_low_id: Uuid,
    pub user_high_id: Uuid,
    pub requester_id: Uuid,
    pub status: String,
    pub request_timestamp: SystemTime,
    pub decision_timestamp: Option<SystemTime>,
    pub feedback: Option<String>,
}

impl Relation {
    pub fn counterpart_of(&self, user_id: Uuid) -> Uuid {
        if self.user_low_id == user_id {
            self.user_high_id
        } else {
            self.user_low_id
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = relations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewRelation<'a> {
    pub user_low_id: Uuid,
    pub user_high_id: Uuid,
    pub requester_id: Uuid,
    pub status: &'a str,
    pub request_timestamp: SystemTime,
}
