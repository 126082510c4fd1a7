//! Relation lifecycle between a coach and a student.
//!
//! A relation is stored once per unordered pair of users. Each party sees it through a
//! [`RelationView`], where the direction of the original request is reported as a
//! [`RequestType`] relative to the viewer. The functions in this module decide whether a
//! request or an action may proceed; they never touch the database, so the DAO can run them
//! inside the transaction that holds the row lock.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::relation::{Relation, RelationStatus, UnknownRelationStatus};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RelationPair {
    low: Uuid,
    high: Uuid,
}

impl RelationPair {
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, RelationError> {
        match a.cmp(&b) {
            Ordering::Less => Ok(Self { low: a, high: b }),
            Ordering::Greater => Ok(Self { low: b, high: a }),
            Ordering::Equal => Err(RelationError::SelfRelation),
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.low == user_id || self.high == user_id
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Sent,
    Received,
}

pub fn request_type(requester_id: Uuid, viewer_id: Uuid) -> RequestType {
    if requester_id == viewer_id {
        RequestType::Sent
    } else {
        RequestType::Received
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationAction {
    #[serde(alias = "approve")]
    Approved,
    #[serde(alias = "reject", alias = "decline", alias = "declined")]
    Rejected,
    #[serde(alias = "remove")]
    Removed,
}

impl RelationAction {
    pub fn resulting_status(&self) -> RelationStatus {
        match self {
            RelationAction::Approved => RelationStatus::Approved,
            RelationAction::Rejected => RelationStatus::Rejected,
            RelationAction::Removed => RelationStatus::Removed,
        }
    }
}

/// The parts of a stored relation that the transition rules look at.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RelationState {
    pub requester_id: Uuid,
    pub status: RelationStatus,
}

impl TryFrom<&Relation> for RelationState {
    type Error = UnknownRelationStatus;

    fn try_from(relation: &Relation) -> Result<Self, Self::Error> {
        Ok(RelationState {
            requester_id: relation.requester_id,
            status: relation.status.parse()?,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    /// Set the status (approved or rejected), the decision time and the feedback.
    Decide(RelationStatus),
    /// Delete the relation and revoke coach access to the pair's videos.
    Remove,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationError {
    SelfRelation,
    AlreadyRequested,
    AlreadyConnected,
    AlreadyRejected,
    NotAuthorized(RelationAction),
    AlreadyDecided(RelationStatus),
}

impl std::error::Error for RelationError {}

impl fmt::Display for RelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationError::SelfRelation => {
                write!(f, "A user cannot form a relation with themselves")
            }
            RelationError::AlreadyRequested => write!(f, "Relation already requested"),
            RelationError::AlreadyConnected => write!(f, "Relation already approved"),
            RelationError::AlreadyRejected => write!(f, "Relation already rejected"),
            RelationError::NotAuthorized(RelationAction::Approved) => {
                write!(f, "Not authorized to approve this request")
            }
            RelationError::NotAuthorized(RelationAction::Rejected) => {
                write!(f, "Not authorized to decline this request")
            }
            RelationError::NotAuthorized(RelationAction::Removed) => {
                write!(f, "Not authorized to remove this relation")
            }
            RelationError::AlreadyDecided(status) => {
                write!(f, "Request has already been {status}")
            }
        }
    }
}

/// Checks whether a new request may be created given the relation currently stored for the
/// pair, if any.
pub fn check_request(existing: Option<RelationState>) -> Result<(), RelationError> {
    let Some(existing) = existing else {
        return Ok(());
    };

    match existing.status {
        RelationStatus::Requested => Err(RelationError::AlreadyRequested),
        RelationStatus::Approved => Err(RelationError::AlreadyConnected),
        RelationStatus::Rejected => Err(RelationError::AlreadyRejected),
        RelationStatus::Removed => Ok(()),
    }
}

/// Decides what `action` by `actor_id` does to the relation currently stored for the pair.
///
/// Only the receiving side of a pending request may approve or decline it. Either side may
/// remove an approved relation. Deciding a request that was already decided is reported
/// separately so the caller can tell a replay apart from a permission problem.
pub fn check_action(
    existing: Option<RelationState>,
    actor_id: Uuid,
    action: RelationAction,
) -> Result<Transition, RelationError> {
    let Some(existing) = existing else {
        return Err(RelationError::NotAuthorized(action));
    };

    match action {
        RelationAction::Approved | RelationAction::Rejected => {
            if request_type(existing.requester_id, actor_id) != RequestType::Received {
                return Err(RelationError::NotAuthorized(action));
            }

            match existing.status {
                RelationStatus::Requested => Ok(Transition::Decide(action.resulting_status())),
                RelationStatus::Approved | RelationStatus::Rejected => {
                    Err(RelationError::AlreadyDecided(existing.status))
                }
                RelationStatus::Removed => Err(RelationError::NotAuthorized(action)),
            }
        }
        RelationAction::Removed => match existing.status {
            RelationStatus::Approved => Ok(Transition::Remove),
            _ => Err(RelationError::NotAuthorized(action)),
        },
    }
}

/// A relation as seen by one of its two parties.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelationView {
    pub counterpart_id: Uuid,
    pub status: RelationStatus,
    pub request_type: RequestType,
    pub request_timestamp: SystemTime,
    pub decision_timestamp: Option<SystemTime>,
    pub feedback: Option<String>,
}

impl RelationView {
    pub fn for_viewer(relation: &Relation, viewer_id: Uuid) -> Result<Self, UnknownRelationStatus> {
        Ok(RelationView {
            counterpart_id: relation.counterpart_of(viewer_id),
            status: relation.status.parse()?,
            request_type: request_type(relation.requester_id, viewer_id),
            request_timestamp: relation.request_timestamp,
            decision_timestamp: relation.decision_timestamp,
            feedback: relation.feedback.clone(),
        })
    }
}
