use diesel::{dsl, BoolExpressionMethods, ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::drill::Drill;
use crate::models::user::{NewUser, User, UserChanges, UserRole};
use crate::models::video::Video;

use crate::schema::drills as drill_fields;
use crate::schema::drills::dsl::drills;
use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;
use crate::schema::videos as video_fields;
use crate::schema::videos::dsl::videos;

/// Files left behind by a deleted user. The rows are gone; the files still need removing.
#[derive(Debug, Default)]
pub struct OrphanedFiles {
    pub video_paths: Vec<String>,
    pub drill_paths: Vec<String>,
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

    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<Uuid, DaoError> {
        let user_id = Uuid::now_v7();
        let email_lowercase = email.to_lowercase();

        let new_user = NewUser {
            id: user_id,
            email: &email_lowercase,
            username,
            first_name,
            last_name,
            password_hash,
            role: role.as_str(),
            created_timestamp: SystemTime::now(),
        };

        let mut conn = self.db_async_pool.get().await?;
        dsl::insert_into(users)
            .values(&new_user)
            .execute(&mut conn)
            .await?;

        Ok(user_id)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(users.find(user_id).first::<User>(&mut conn).await?)
    }

    pub async fn get_users(&self, user_ids: &[Uuid]) -> Result<Vec<User>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(users
            .filter(user_fields::id.eq_any(user_ids))
            .load::<User>(&mut conn)
            .await?)
    }

    /// Looks a user up by email address (case-insensitively) or by exact username.
    pub async fn get_user_by_identifier(&self, identifier: &str) -> Result<User, DaoError> {
        let email_lowercase = identifier.to_lowercase();

        let mut conn = self.db_async_pool.get().await?;
        Ok(users
            .filter(
                user_fields::email
                    .eq(&email_lowercase)
                    .or(user_fields::username.eq(identifier)),
            )
            .first::<User>(&mut conn)
            .await?)
    }

    pub async fn list_users(
        &self,
        role: Option<UserRole>,
        username: Option<&str>,
    ) -> Result<Vec<User>, DaoError> {
        let mut query = users
            .order(user_fields::created_timestamp.desc())
            .into_boxed();

        if let Some(role) = role {
            query = query.filter(user_fields::role.eq(role.as_str()));
        }

        if let Some(username) = username {
            query = query.filter(user_fields::username.eq(username));
        }

        let mut conn = self.db_async_pool.get().await?;
        Ok(query.load::<User>(&mut conn).await?)
    }

    pub async fn update_user(
        &self,
        user_id: Uuid,
        changes: &UserChanges<'_>,
    ) -> Result<User, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(dsl::update(users.find(user_id))
            .set(changes)
            .get_result::<User>(&mut conn)
            .await?)
    }

    /// Deletes a user. Relations, favourites, annotations, drills and owned videos cascade in
    /// the database; the paths of the files those rows pointed at are returned.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<OrphanedFiles, DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let owned_videos = videos
                        .filter(video_fields::student_id.eq(user_id))
                        .load::<Video>(conn)
                        .await?;

                    let owned_drills = drills
                        .filter(drill_fields::user_id.eq(user_id))
                        .load::<Drill>(conn)
                        .await?;

                    let deleted_count = diesel::delete(users.find(user_id)).execute(conn).await?;

                    if deleted_count == 0 {
                        return Err(DaoError::QueryFailure(diesel::result::Error::NotFound));
                    }

                    Ok(OrphanedFiles {
                        video_paths: owned_videos.iter().map(Video::storage_path).collect(),
                        drill_paths: owned_drills.iter().map(Drill::storage_path).collect(),
                    })
                })
            })
            .await
    }
}
