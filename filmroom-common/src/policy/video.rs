//! Who may see, favourite and delete a video.
//!
//! A coach sees a video only while its `has_access` flag holds. Whether an approved relation
//! with the owning student is also required is a deployment setting; the DAO applies that part
//! against the live relation table.

use std::fmt;
use uuid::Uuid;

use crate::models::user::UserRole;
use crate::models::video::Video;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VideoFilter {
    /// Videos owned by `student_id`, optionally narrowed to those shared with `coach_id`.
    Student {
        student_id: Uuid,
        coach_id: Option<Uuid>,
    },
    /// Videos assigned to `coach_id` whose access has not been revoked, optionally narrowed
    /// to one student.
    Coach {
        coach_id: Uuid,
        student_id: Option<Uuid>,
    },
}

impl VideoFilter {
    /// Builds the listing filter for `user_id`. Ids that would widen the result beyond what
    /// the role may see are ignored: a coach's own id always pins `coach_id` and a student's
    /// own id always pins `student_id`.
    pub fn for_listing(
        role: UserRole,
        user_id: Uuid,
        student_id: Option<Uuid>,
        coach_id: Option<Uuid>,
    ) -> Self {
        match role {
            UserRole::Coach => VideoFilter::Coach {
                coach_id: user_id,
                student_id,
            },
            UserRole::Student => VideoFilter::Student {
                student_id: user_id,
                coach_id,
            },
        }
    }

    pub fn requires_access(&self) -> bool {
        matches!(self, VideoFilter::Coach { .. })
    }

    pub fn admits(&self, video: &Video) -> bool {
        match *self {
            VideoFilter::Student {
                student_id,
                coach_id,
            } => {
                video.student_id == student_id
                    && coach_id.map_or(true, |coach_id| video.coach_id == Some(coach_id))
            }
            VideoFilter::Coach {
                coach_id,
                student_id,
            } => {
                video.has_access
                    && video.coach_id == Some(coach_id)
                    && student_id.map_or(true, |student_id| video.student_id == student_id)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VideoAccessError {
    NotVisible,
    NotParticipant,
    CoachCannotDelete,
}

impl std::error::Error for VideoAccessError {}

impl fmt::Display for VideoAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoAccessError::NotVisible => write!(f, "Video is not visible to this user"),
            VideoAccessError::NotParticipant => {
                write!(f, "Only the student or coach of a video may change it")
            }
            VideoAccessError::CoachCannotDelete => write!(f, "Coaches cannot delete videos"),
        }
    }
}

/// The owning student always sees a video. Its coach sees it while access holds.
pub fn check_visible(video: &Video, viewer_id: Uuid) -> Result<(), VideoAccessError> {
    if video.student_id == viewer_id || (video.coach_id == Some(viewer_id) && video.has_access) {
        Ok(())
    } else {
        Err(VideoAccessError::NotVisible)
    }
}

pub fn check_participant(video: &Video, user_id: Uuid) -> Result<(), VideoAccessError> {
    if video.student_id == user_id || video.coach_id == Some(user_id) {
        Ok(())
    } else {
        Err(VideoAccessError::NotParticipant)
    }
}

pub fn check_may_delete(role: UserRole) -> Result<(), VideoAccessError> {
    match role {
        UserRole::Student => Ok(()),
        UserRole::Coach => Err(VideoAccessError::CoachCannotDelete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::SystemTime;

    fn video(student_id: Uuid, coach_id: Option<Uuid>, has_access: bool) -> Video {
        Video {
            id: Uuid::now_v7(),
            student_id,
            coach_id,
            has_access,
            original_name: String::from("serve.mp4"),
            file_name: String::from("video_1_abcdef.mp4"),
            size_bytes: 1024,
            url: String::from("/data/videos/serve.mp4"),
            created_timestamp: SystemTime::now(),
            modified_timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn test_listing_filter_pins_own_id() {
        let user = Uuid::now_v7();
        let other = Uuid::now_v7();

        assert_eq!(
            VideoFilter::for_listing(UserRole::Coach, user, Some(other), None),
            VideoFilter::Coach {
                coach_id: user,
                student_id: Some(other)
            }
        );
        assert_eq!(
            VideoFilter::for_listing(UserRole::Coach, user, None, Some(other)),
            VideoFilter::Coach {
                coach_id: user,
                student_id: None
            }
        );
        assert_eq!(
            VideoFilter::for_listing(UserRole::Student, user, Some(other), Some(other)),
            VideoFilter::Student {
                student_id: user,
                coach_id: Some(other)
            }
        );
    }

    #[test]
    fn test_coach_filter_requires_access() {
        let student = Uuid::now_v7();
        let coach = Uuid::now_v7();

        let filter = VideoFilter::for_listing(UserRole::Coach, coach, None, None);
        assert!(filter.requires_access());
        assert!(filter.admits(&video(student, Some(coach), true)));
        assert!(!filter.admits(&video(student, Some(coach), false)));
        assert!(!filter.admits(&video(student, Some(Uuid::now_v7()), true)));
        assert!(!filter.admits(&video(student, None, true)));

        let narrowed = VideoFilter::for_listing(UserRole::Coach, coach, Some(student), None);
        assert!(narrowed.admits(&video(student, Some(coach), true)));
        assert!(!narrowed.admits(&video(Uuid::now_v7(), Some(coach), true)));
    }

    #[test]
    fn test_student_filter_ignores_access() {
        let student = Uuid::now_v7();
        let coach = Uuid::now_v7();

        let filter = VideoFilter::for_listing(UserRole::Student, student, None, None);
        assert!(!filter.requires_access());
        assert!(filter.admits(&video(student, Some(coach), false)));
        assert!(filter.admits(&video(student, None, true)));
        assert!(!filter.admits(&video(Uuid::now_v7(), Some(coach), true)));

        let narrowed = VideoFilter::for_listing(UserRole::Student, student, None, Some(coach));
        assert!(narrowed.admits(&video(student, Some(coach), false)));
        assert!(!narrowed.admits(&video(student, Some(Uuid::now_v7()), true)));
        assert!(!narrowed.admits(&video(student, None, true)));
    }

    #[test]
    fn test_revoked_video_stays_with_student() {
        let student = Uuid::now_v7();
        let coach = Uuid::now_v7();
        let revoked = video(student, Some(coach), false);

        assert!(check_visible(&revoked, student).is_ok());
        assert_eq!(
            check_visible(&revoked, coach),
            Err(VideoAccessError::NotVisible)
        );
        assert_eq!(
            check_visible(&revoked, Uuid::now_v7()),
            Err(VideoAccessError::NotVisible)
        );

        let shared = video(student, Some(coach), true);
        assert!(check_visible(&shared, coach).is_ok());
    }

    #[test]
    fn test_participants() {
        let student = Uuid::now_v7();
        let coach = Uuid::now_v7();
        let v = video(student, Some(coach), false);

        assert!(check_participant(&v, student).is_ok());
        assert!(check_participant(&v, coach).is_ok());
        assert_eq!(
            check_participant(&v, Uuid::now_v7()),
            Err(VideoAccessError::NotParticipant)
        );
    }

    #[test]
    fn test_only_students_delete() {
        assert!(check_may_delete(UserRole::Student).is_ok());
        assert_eq!(
            check_may_delete(UserRole::Coach),
            Err(VideoAccessError::CoachCannotDelete)
        );
    }
}
