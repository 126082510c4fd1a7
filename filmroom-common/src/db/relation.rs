use diesel::{dsl, BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::collections::HashMap;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::relation::{NewRelation, Relation, RelationStatus};
use crate::models::user::User;
use crate::policy::relation::{
    self, RelationAction, RelationError, RelationPair, RelationState, Transition,
};

use crate::schema::relations as relation_fields;
use crate::schema::relations::dsl::relations;
use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;
use crate::schema::videos as video_fields;
use crate::schema::videos::dsl::videos;

#[derive(Debug)]
pub enum ActionOutcome {
    Decided(Relation),
    Removed { revoked_video_count: usize },
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

    pub async fn request_relation(
        &self,
        requester_id: Uuid,
        target_id: Uuid,
    ) -> Result<Relation, DaoError> {
        let pair = RelationPair::new(requester_id, target_id)?;

        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    // Fails with NotFound when the target does not exist
                    users
                        .select(user_fields::id)
                        .find(target_id)
                        .first::<Uuid>(conn)
                        .await?;

                    let existing = locked_relation_state(conn, pair).await?;
                    relation::check_request(existing)?;

                    let new_relation = NewRelation {
                        user_low_id: pair.low(),
                        user_high_id: pair.high(),
                        requester_id,
                        status: RelationStatus::Requested.as_str(),
                        request_timestamp: SystemTime::now(),
                    };

                    Ok(dsl::insert_into(relations)
                        .values(&new_relation)
                        .get_result::<Relation>(conn)
                        .await?)
                })
            })
            .await
    }

    /// Applies `action` by `actor_id` to the relation shared with `counterpart_id`.
    ///
    /// Removing a relation also revokes access to every video shared between the pair, in
    /// either direction, within the same transaction.
    pub async fn handle_action(
        &self,
        actor_id: Uuid,
        counterpart_id: Uuid,
        action: RelationAction,
        feedback: Option<&str>,
    ) -> Result<ActionOutcome, DaoError> {
        // No relation can exist between a user and themselves
        let pair = RelationPair::new(actor_id, counterpart_id)
            .map_err(|_| RelationError::NotAuthorized(action))?;

        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let existing = locked_relation_state(conn, pair).await?;
                    let transition = relation::check_action(existing, actor_id, action)?;

                    let relation_row = relations.find((pair.low(), pair.high()));

                    match transition {
                        Transition::Decide(status) => {
                            let decided = dsl::update(relation_row)
                                .set((
                                    relation_fields::status.eq(status.as_str()),
                                    relation_fields::decision_timestamp.eq(SystemTime::now()),
                                    relation_fields::feedback.eq(feedback),
                                ))
                                .get_result::<Relation>(conn)
                                .await?;

                            Ok(ActionOutcome::Decided(decided))
                        }
                        Transition::Remove => {
                            diesel::delete(relation_row).execute(conn).await?;

                            let revoked_video_count = dsl::update(
                                videos
                                    .filter(
                                        video_fields::student_id
                                            .eq(pair.low())
                                            .and(video_fields::coach_id.eq(pair.high()))
                                            .or(video_fields::student_id
                                                .eq(pair.high())
                                                .and(video_fields::coach_id.eq(pair.low()))),
                                    )
                                    .filter(video_fields::has_access.eq(true)),
                            )
                            .set((
                                video_fields::has_access.eq(false),
                                video_fields::modified_timestamp.eq(SystemTime::now()),
                            ))
                            .execute(conn)
                            .await?;

                            Ok(ActionOutcome::Removed {
                                revoked_video_count,
                            })
                        }
                    }
                })
            })
            .await
    }

    pub async fn get_relation(
        &self,
        user_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<Option<Relation>, DaoError> {
        let Ok(pair) = RelationPair::new(user_id, other_user_id) else {
            return Ok(None);
        };

        let mut conn = self.db_async_pool.get().await?;
        Ok(relations
            .find((pair.low(), pair.high()))
            .first::<Relation>(&mut conn)
            .await
            .optional()?)
    }

    pub async fn is_approved(&self, user_id: Uuid, other_user_id: Uuid) -> Result<bool, DaoError> {
        Ok(self
            .get_relation(user_id, other_user_id)
            .await?
            .is_some_and(|r| r.status == RelationStatus::Approved.as_str()))
    }

    /// Ids of every user holding an approved relation with `user_id`.
    pub async fn approved_counterparts(&self, user_id: Uuid) -> Result<Vec<Uuid>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let approved = relations
            .filter(
                relation_fields::user_low_id
                    .eq(user_id)
                    .or(relation_fields::user_high_id.eq(user_id)),
            )
            .filter(relation_fields::status.eq(RelationStatus::Approved.as_str()))
            .load::<Relation>(&mut conn)
            .await?;

        Ok(approved.iter().map(|r| r.counterpart_of(user_id)).collect())
    }

    /// Every relation `user_id` takes part in, paired with the user on the other side.
    pub async fn relations_with_counterparts(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(Relation, User)>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let loaded_relations = relations
            .filter(
                relation_fields::user_low_id
                    .eq(user_id)
                    .or(relation_fields::user_high_id.eq(user_id)),
            )
            .order(relation_fields::request_timestamp.desc())
            .load::<Relation>(&mut conn)
            .await?;

        let counterpart_ids: Vec<Uuid> = loaded_relations
            .iter()
            .map(|r| r.counterpart_of(user_id))
            .collect();

        let mut counterparts: HashMap<Uuid, User> = users
            .filter(user_fields::id.eq_any(&counterpart_ids))
            .load::<User>(&mut conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(loaded_relations
            .into_iter()
            .filter_map(|r| {
                let counterpart = counterparts.remove(&r.counterpart_of(user_id))?;
                Some((r, counterpart))
            })
            .collect())
    }
}

async fn locked_relation_state(
    conn: &mut AsyncPgConnection,
    pair: RelationPair,
) -> Result<Option<RelationState>, DaoError> {
    let existing = relations
        .find((pair.low(), pair.high()))
        .for_update()
        .first::<Relation>(conn)
        .await
        .optional()?;

    existing
        .as_ref()
        .map(RelationState::try_from)
        .transpose()
        .map_err(|_| DaoError::CannotRunQuery("Stored relation has an unknown status"))
}
