use diesel::{dsl, ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use std::collections::HashSet;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::user::display_name;
use crate::models::video::{NewVideo, Video};
use crate::models::video_favourite::NewVideoFavourite;
use crate::policy::video::VideoFilter;

use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;
use crate::schema::video_favourites as video_favourite_fields;
use crate::schema::video_favourites::dsl::video_favourites;
use crate::schema::videos as video_fields;
use crate::schema::videos::dsl::videos;

/// A video joined with what a listing shows alongside it.
#[derive(Clone, Debug)]
pub struct VideoListing {
    pub video: Video,
    pub student_name: String,
    pub is_favourite: bool,
}

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    pub async fn create_video(
        &self,
        student_id: Uuid,
        coach_id: Option<Uuid>,
        original_name: &str,
        file_name: &str,
        size_bytes: i64,
        url: &str,
    ) -> Result<Video, DaoError> {
        let now = SystemTime::now();

        let new_video = NewVideo {
            id: Uuid::now_v7(),
            student_id,
            coach_id,
            has_access: true,
            original_name,
            file_name,
            size_bytes,
            url,
            created_timestamp: now,
            modified_timestamp: now,
        };

        let mut conn = self.db_async_pool.get().await?;
        Ok(dsl::insert_into(videos)
            .values(&new_video)
            .get_result::<Video>(&mut conn)
            .await?)
    }

    pub async fn get_video(&self, video_id: Uuid) -> Result<Video, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(videos.find(video_id).first::<Video>(&mut conn).await?)
    }

    pub async fn get_listing(
        &self,
        video_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<VideoListing, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let (video, first_name, last_name) = videos
            .inner_join(users)
            .select((
                video_fields::all_columns,
                user_fields::first_name,
                user_fields::last_name,
            ))
            .filter(video_fields::id.eq(video_id))
            .first::<(Video, String, String)>(&mut conn)
            .await?;

        let favourite_count = video_favourites
            .filter(video_favourite_fields::video_id.eq(video_id))
            .filter(video_favourite_fields::user_id.eq(viewer_id))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        Ok(VideoListing {
            video,
            student_name: display_name(&first_name, &last_name),
            is_favourite: favourite_count > 0,
        })
    }

    /// Lists the videos `filter` admits, newest first. When `approved_students` is given, coach
    /// listings are further limited to videos owned by those students.
    pub async fn list_videos(
        &self,
        filter: VideoFilter,
        viewer_id: Uuid,
        approved_students: Option<&[Uuid]>,
    ) -> Result<Vec<VideoListing>, DaoError> {
        let mut query = videos
            .inner_join(users)
            .select((
                video_fields::all_columns,
                user_fields::first_name,
                user_fields::last_name,
            ))
            .order(video_fields::created_timestamp.desc())
            .into_boxed();

        match filter {
            VideoFilter::Student {
                student_id,
                coach_id,
            } => {
                query = query.filter(video_fields::student_id.eq(student_id));

                if let Some(coach_id) = coach_id {
                    query = query.filter(video_fields::coach_id.eq(coach_id));
                }
            }
            VideoFilter::Coach {
                coach_id,
                student_id,
            } => {
                query = query
                    .filter(video_fields::coach_id.eq(coach_id))
                    .filter(video_fields::has_access.eq(true));

                if let Some(student_id) = student_id {
                    query = query.filter(video_fields::student_id.eq(student_id));
                }

                if let Some(approved_students) = approved_students {
                    query = query.filter(video_fields::student_id.eq_any(approved_students));
                }
            }
        }

        let mut conn = self.db_async_pool.get().await?;
        let loaded = query.load::<(Video, String, String)>(&mut conn).await?;

        let video_ids: Vec<Uuid> = loaded.iter().map(|(v, _, _)| v.id).collect();
        let favourites: HashSet<Uuid> = video_favourites
            .select(video_favourite_fields::video_id)
            .filter(video_favourite_fields::user_id.eq(viewer_id))
            .filter(video_favourite_fields::video_id.eq_any(&video_ids))
            .load::<Uuid>(&mut conn)
            .await?
            .into_iter()
            .collect();

        Ok(loaded
            .into_iter()
            .map(|(video, first_name, last_name)| VideoListing {
                is_favourite: favourites.contains(&video.id),
                student_name: display_name(&first_name, &last_name),
                video,
            })
            .collect())
    }

    /// Adds `user_id` to or removes it from the video's favourites. Each user's flag is
    /// independent of everyone else's.
    pub async fn set_favourite(
        &self,
        video_id: Uuid,
        user_id: Uuid,
        is_favourite: bool,
    ) -> Result<(), DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        if is_favourite {
            dsl::insert_into(video_favourites)
                .values(&NewVideoFavourite { video_id, user_id })
                .on_conflict_do_nothing()
                .execute(&mut conn)
                .await?;
        } else {
            diesel::delete(video_favourites.find((video_id, user_id)))
                .execute(&mut conn)
                .await?;
        }

        Ok(())
    }

    /// Deletes those of `video_ids` that `student_id` owns and returns the deleted rows.
    pub async fn delete_videos(
        &self,
        student_id: Uuid,
        video_ids: &[Uuid],
    ) -> Result<Vec<Video>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(diesel::delete(
            videos
                .filter(video_fields::id.eq_any(video_ids))
                .filter(video_fields::student_id.eq(student_id)),
        )
        .get_results::<Video>(&mut conn)
        .await?)
    }
}
