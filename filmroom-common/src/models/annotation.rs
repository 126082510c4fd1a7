use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::annotations;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, QueryableByName)]
#[diesel(table_name = annotations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Annotation {
    pub id: Uuid,
    pub video_id: Uuid,
    pub author_id: Uuid,
    pub data: serde_json::Value,
    pub created_timestamp: SystemTime,
    pub modified_timestamp: Option<SystemTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = annotations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewAnnotation<'a> {
    pub id: Uuid,
    pub video_id: Uuid,
    pub author_id: Uuid,
    pub data: &'a serde_json::Value,
    pub created_timestamp: SystemTime,
}
