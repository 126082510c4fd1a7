use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::user::UserRole;

/// How a coach becomes entitled to annotate a video.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AnnotationPolicy {
    /// A video without a coach is claimed by the first coach that annotates it.
    #[default]
    FirstClaim,
    /// Only the coach assigned at upload may annotate.
    Fixed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownAnnotationPolicy;

impl std::error::Error for UnknownAnnotationPolicy {}

impl fmt::Display for UnknownAnnotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Annotation policy must be 'first_claim' or 'fixed'")
    }
}

impl FromStr for AnnotationPolicy {
    type Err = UnknownAnnotationPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_claim" => Ok(AnnotationPolicy::FirstClaim),
            "fixed" => Ok(AnnotationPolicy::Fixed),
            _ => Err(UnknownAnnotationPolicy),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnnotationGrant {
    /// The annotating coach becomes the video's coach.
    ClaimVideo,
    AssignedCoach,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnnotationError {
    NotCoach,
    NoCoachAssigned,
    NotAssignedCoach,
    AccessRevoked,
    NotAuthor,
}

impl std::error::Error for AnnotationError {}

impl fmt::Display for AnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationError::NotCoach => write!(f, "Only coaches can annotate videos"),
            AnnotationError::NoCoachAssigned => {
                write!(f, "Video has no coach assigned to annotate it")
            }
            AnnotationError::NotAssignedCoach => {
                write!(f, "Video is assigned to a different coach")
            }
            AnnotationError::AccessRevoked => {
                write!(f, "Access to this video has been revoked")
            }
            AnnotationError::NotAuthor => {
                write!(f, "Only the author of an annotation can change it")
            }
        }
    }
}

pub fn authorize_annotation(
    policy: AnnotationPolicy,
    actor_id: Uuid,
    actor_role: UserRole,
    video_coach_id: Option<Uuid>,
    video_has_access: bool,
) -> Result<AnnotationGrant, AnnotationError> {
    if actor_role != UserRole::Coach {
        return Err(AnnotationError::NotCoach);
    }

    // A video whose relation was removed cannot be claimed either
    if !video_has_access {
        return Err(AnnotationError::AccessRevoked);
    }

    match (video_coach_id, policy) {
        (Some(coach_id), _) if coach_id == actor_id => Ok(AnnotationGrant::AssignedCoach),
        (Some(_), _) => Err(AnnotationError::NotAssignedCoach),
        (None, AnnotationPolicy::FirstClaim) => Ok(AnnotationGrant::ClaimVideo),
        (None, AnnotationPolicy::Fixed) => Err(AnnotationError::NoCoachAssigned),
    }
}

pub fn check_author(author_id: Uuid, actor_id: Uuid) -> Result<(), AnnotationError> {
    if author_id == actor_id {
        Ok(())
    } else {
        Err(AnnotationError::NotAuthor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy() {
        assert_eq!(
            "first_claim".parse::<AnnotationPolicy>(),
            Ok(AnnotationPolicy::FirstClaim)
        );
        assert_eq!("fixed".parse::<AnnotationPolicy>(), Ok(AnnotationPolicy::Fixed));
        assert_eq!(
            "firstClaim".parse::<AnnotationPolicy>(),
            Err(UnknownAnnotationPolicy)
        );
        assert_eq!(AnnotationPolicy::default(), AnnotationPolicy::FirstClaim);
    }

    #[test]
    fn test_students_cannot_annotate() {
        let student = Uuid::now_v7();

        for policy in [AnnotationPolicy::FirstClaim, AnnotationPolicy::Fixed] {
            assert_eq!(
                authorize_annotation(policy, student, UserRole::Student, None, true),
                Err(AnnotationError::NotCoach)
            );
            assert_eq!(
                authorize_annotation(policy, student, UserRole::Student, Some(student), true),
                Err(AnnotationError::NotCoach)
            );
        }
    }

    #[test]
    fn test_first_claim() {
        let coach = Uuid::now_v7();
        let other_coach = Uuid::now_v7();

        assert_eq!(
            authorize_annotation(
                AnnotationPolicy::FirstClaim,
                coach,
                UserRole::Coach,
                None,
                true
            ),
            Ok(AnnotationGrant::ClaimVideo)
        );
        assert_eq!(
            authorize_annotation(
                AnnotationPolicy::FirstClaim,
                coach,
                UserRole::Coach,
                Some(coach),
                true
            ),
            Ok(AnnotationGrant::AssignedCoach)
        );
        assert_eq!(
            authorize_annotation(
                AnnotationPolicy::FirstClaim,
                other_coach,
                UserRole::Coach,
                Some(coach),
                true
            ),
            Err(AnnotationError::NotAssignedCoach)
        );
    }

    #[test]
    fn test_fixed() {
        let coach = Uuid::now_v7();

        assert_eq!(
            authorize_annotation(AnnotationPolicy::Fixed, coach, UserRole::Coach, None, true),
            Err(AnnotationError::NoCoachAssigned)
        );
        assert_eq!(
            authorize_annotation(
                AnnotationPolicy::Fixed,
                coach,
                UserRole::Coach,
                Some(coach),
                true
            ),
            Ok(AnnotationGrant::AssignedCoach)
        );
        assert_eq!(
            authorize_annotation(
                AnnotationPolicy::Fixed,
                coach,
                UserRole::Coach,
                Some(Uuid::now_v7()),
                true
            ),
            Err(AnnotationError::NotAssignedCoach)
        );
    }

    #[test]
    fn test_revoked_access_blocks_assigned_coach() {
        let coach = Uuid::now_v7();

        for policy in [AnnotationPolicy::FirstClaim, AnnotationPolicy::Fixed] {
            assert_eq!(
                authorize_annotation(policy, coach, UserRole::Coach, Some(coach), false),
                Err(AnnotationError::AccessRevoked)
            );
        }
    }

    #[test]
    fn test_check_author() {
        let author = Uuid::now_v7();

        assert!(check_author(author, author).is_ok());
        assert_eq!(
            check_author(author, Uuid::now_v7()),
            Err(AnnotationError::NotAuthor)
        );
    }
}
