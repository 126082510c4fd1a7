use diesel::{dsl, ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::annotation::{Annotation, NewAnnotation};
use crate::models::user::UserRole;
use crate::models::video::Video;
use crate::policy::annotation::{self, AnnotationGrant, AnnotationPolicy};

use crate::schema::annotations as annotation_fields;
use crate::schema::annotations::dsl::annotations;
use crate::schema::videos as video_fields;
use crate::schema::videos::dsl::videos;

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    /// Appends an annotation by `coach_id`. Under the first-claim policy the video row is
    /// locked so only one coach can claim an unassigned video.
    pub async fn add_annotation(
        &self,
        policy: AnnotationPolicy,
        video_id: Uuid,
        coach_id: Uuid,
        coach_role: UserRole,
        data: &serde_json::Value,
    ) -> Result<Annotation, DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let video = videos
                        .find(video_id)
                        .for_update()
                        .first::<Video>(conn)
                        .await?;

                    let grant = annotation::authorize_annotation(
                        policy,
                        coach_id,
                        coach_role,
                        video.coach_id,
                        video.has_access,
                    )?;

                    let now = SystemTime::now();

                    if grant == AnnotationGrant::ClaimVideo {
                        dsl::update(videos.find(video_id))
                            .set((
                                video_fields::coach_id.eq(coach_id),
                                video_fields::modified_timestamp.eq(now),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    let new_annotation = NewAnnotation {
                        id: Uuid::now_v7(),
                        video_id,
                        author_id: coach_id,
                        data,
                        created_timestamp: now,
                    };

                    Ok(dsl::insert_into(annotations)
                        .values(&new_annotation)
                        .get_result::<Annotation>(conn)
                        .await?)
                })
            })
            .await
    }

    pub async fn list_annotations(&self, video_id: Uuid) -> Result<Vec<Annotation>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(annotations
            .filter(annotation_fields::video_id.eq(video_id))
            .order(annotation_fields::created_timestamp.asc())
            .load::<Annotation>(&mut conn)
            .await?)
    }

    pub async fn update_annotation(
        &self,
        video_id: Uuid,
        annotation_id: Uuid,
        author_id: Uuid,
        data: &serde_json::Value,
    ) -> Result<Annotation, DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let existing = annotations
                        .find(annotation_id)
                        .filter(annotation_fields::video_id.eq(video_id))
                        .for_update()
                        .first::<Annotation>(conn)
                        .await?;

                    annotation::check_author(existing.author_id, author_id)?;

                    Ok(dsl::update(annotations.find(annotation_id))
                        .set((
                            annotation_fields::data.eq(data),
                            annotation_fields::modified_timestamp.eq(SystemTime::now()),
                        ))
                        .get_result::<Annotation>(conn)
                        .await?)
                })
            })
            .await
    }

    pub async fn delete_annotation(
        &self,
        video_id: Uuid,
        annotation_id: Uuid,
        author_id: Uuid,
    ) -> Result<(), DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let existing = annotations
                        .find(annotation_id)
                        .filter(annotation_fields::video_id.eq(video_id))
                        .for_update()
                        .first::<Annotation>(conn)
                        .await?;

                    annotation::check_author(existing.author_id, author_id)?;

                    diesel::delete(annotations.find(annotation_id))
                        .execute(conn)
                        .await?;

                    Ok(())
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::test_utils;
    use crate::db::video;
    use crate::policy::annotation::AnnotationError;

    fn dao() -> Dao {
        Dao::new(test_utils::db_async_pool())
    }

    #[tokio::test]
    #[ignore]
    async fn test_first_claim_assigns_coach() {
        let dao = dao();
        let video_dao = video::Dao::new(test_utils::db_async_pool());
        let student = test_utils::create_user_with_role(UserRole::Student).await;
        let coach = test_utils::create_user_with_role(UserRole::Coach).await;
        let other_coach = test_utils::create_user_with_role(UserRole::Coach).await;

        let video = video_dao
            .create_video(student.id, None, "a.mp4", "video_1_aaaaaa.mp4", 1, "/a")
            .await
            .unwrap();
        let data = serde_json::json!({ "frame": 12, "note": "Elbow up" });

        assert!(matches!(
            dao.add_annotation(
                AnnotationPolicy::Fixed,
                video.id,
                coach.id,
                UserRole::Coach,
                &data
            )
            .await,
            Err(DaoError::AnnotationRule(AnnotationError::NoCoachAssigned))
        ));

        let added = dao
            .add_annotation(
                AnnotationPolicy::FirstClaim,
                video.id,
                coach.id,
                UserRole::Coach,
                &data,
            )
            .await
            .unwrap();
        assert_eq!(added.data, data);
        assert_eq!(
            video_dao.get_video(video.id).await.unwrap().coach_id,
            Some(coach.id)
        );

        assert!(matches!(
            dao.add_annotation(
                AnnotationPolicy::FirstClaim,
                video.id,
                other_coach.id,
                UserRole::Coach,
                &data
            )
            .await,
            Err(DaoError::AnnotationRule(AnnotationError::NotAssignedCoach))
        ));

        test_utils::delete_user(student.id).await;
        test_utils::delete_user(coach.id).await;
        test_utils::delete_user(other_coach.id).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_only_author_edits() {
        let dao = dao();
        let video_dao = video::Dao::new(test_utils::db_async_pool());
        let student = test_utils::create_user_with_role(UserRole::Student).await;
        let coach = test_utils::create_user_with_role(UserRole::Coach).await;

        let video = video_dao
            .create_video(student.id, Some(coach.id), "a.mp4", "video_1_aaaaaa.mp4", 1, "/a")
            .await
            .unwrap();
        let added = dao
            .add_annotation(
                AnnotationPolicy::Fixed,
                video.id,
                coach.id,
                UserRole::Coach,
                &serde_json::json!([]),
            )
            .await
            .unwrap();

        let new_data = serde_json::json!([{ "frame": 3 }]);

        assert!(matches!(
            dao.update_annotation(video.id, added.id, student.id, &new_data)
                .await,
            Err(DaoError::AnnotationRule(AnnotationError::NotAuthor))
        ));
        assert!(dao
            .update_annotation(Uuid::now_v7(), added.id, coach.id, &new_data)
            .await
            .unwrap_err()
            .is_not_found());

        let updated = dao
            .update_annotation(video.id, added.id, coach.id, &new_data)
            .await
            .unwrap();
        assert_eq!(updated.data, new_data);
        assert!(updated.modified_timestamp.is_some());

        dao.delete_annotation(video.id, added.id, coach.id)
            .await
            .unwrap();
        assert!(dao.list_annotations(video.id).await.unwrap().is_empty());

        test_utils::delete_user(student.id).await;
        test_utils::delete_user(coach.id).await;
    }
}
