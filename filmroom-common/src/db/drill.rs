use diesel::{dsl, BoolExpressionMethods, ExpressionMethods, PgTextExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::drill::{Drill, DrillChanges, NewDrill};
use crate::models::user::display_name;

use crate::schema::drills as drill_fields;
use crate::schema::drills::dsl::drills;
use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;

#[derive(Clone, Debug, Default)]
pub struct DrillFilter<'a> {
    pub owner_id: Option<Uuid>,
    pub is_private: Option<bool>,
    pub title_contains: Option<&'a str>,
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

    pub async fn create_drill(
        &self,
        user_id: Uuid,
        is_private: bool,
        file_name: &str,
        title: &str,
        description: &str,
        url: &str,
    ) -> Result<Drill, DaoError> {
        let now = SystemTime::now();

        let new_drill = NewDrill {
            id: Uuid::now_v7(),
            user_id,
            is_private,
            file_name,
            title,
            description,
            url,
            created_timestamp: now,
            modified_timestamp: now,
        };

        let mut conn = self.db_async_pool.get().await?;
        Ok(dsl::insert_into(drills)
            .values(&new_drill)
            .get_result::<Drill>(&mut conn)
            .await?)
    }

    /// Returns the drill and its owner's display name.
    pub async fn get_drill(&self, drill_id: Uuid) -> Result<(Drill, String), DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let (drill, first_name, last_name) = drills
            .inner_join(users)
            .select((
                drill_fields::all_columns,
                user_fields::first_name,
                user_fields::last_name,
            ))
            .filter(drill_fields::id.eq(drill_id))
            .first::<(Drill, String, String)>(&mut conn)
            .await?;

        Ok((drill, display_name(&first_name, &last_name)))
    }

    /// Lists drills visible to `viewer_id`: every public drill plus the viewer's private ones.
    pub async fn list_drills(
        &self,
        viewer_id: Uuid,
        filter: &DrillFilter<'_>,
    ) -> Result<Vec<(Drill, String)>, DaoError> {
        let mut query = drills
            .inner_join(users)
            .select((
                drill_fields::all_columns,
                user_fields::first_name,
                user_fields::last_name,
            ))
            .filter(
                drill_fields::is_private
                    .eq(false)
                    .or(drill_fields::user_id.eq(viewer_id)),
            )
            .order(drill_fields::created_timestamp.desc())
            .into_boxed();

        if let Some(owner_id) = filter.owner_id {
            query = query.filter(drill_fields::user_id.eq(owner_id));
        }

        if let Some(is_private) = filter.is_private {
            query = query.filter(drill_fields::is_private.eq(is_private));
        }

        if let Some(title) = filter.title_contains {
            let pattern = format!("%{}%", escape_like(title));
            query = query.filter(drill_fields::title.ilike(pattern));
        }

        let mut conn = self.db_async_pool.get().await?;
        Ok(query
            .load::<(Drill, String, String)>(&mut conn)
            .await?
            .into_iter()
            .map(|(drill, first_name, last_name)| (drill, display_name(&first_name, &last_name)))
            .collect())
    }

    /// Applies `changes` to a drill owned by `owner_id`. A drill that exists but belongs to
    /// someone else is reported as not found.
    pub async fn update_drill(
        &self,
        drill_id: Uuid,
        owner_id: Uuid,
        changes: &DrillChanges<'_>,
    ) -> Result<Drill, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(dsl::update(
            drills
                .find(drill_id)
                .filter(drill_fields::user_id.eq(owner_id)),
        )
        .set(changes)
        .get_result::<Drill>(&mut conn)
        .await?)
    }

    pub async fn delete_drills(
        &self,
        owner_id: Uuid,
        drill_ids: &[Uuid],
    ) -> Result<Vec<Drill>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(diesel::delete(
            drills
                .filter(drill_fields::id.eq_any(drill_ids))
                .filter(drill_fields::user_id.eq(owner_id)),
        )
        .get_results::<Drill>(&mut conn)
        .await?)
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
