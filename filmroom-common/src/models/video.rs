use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::videos;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, QueryableByName)]
#[diesel(table_name = videos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Video {
    pub id: Uuid,
    pub student_id: Uuid,
    pub coach_id: Option<Uuid>,
    pub has_access: bool,
    pub original_name: String,
    pub file_name: String,
    pub size_bytes: i64,
    pub url: String,
    pub created_timestamp: SystemTime,
    pub modified_timestamp: SystemTime,
}

impl Video {
    /// Path of the stored file relative to the video container.
    pub fn storage_path(&self) -> String {
        video_storage_path(self.student_id, &self.file_name)
    }
}

pub fn video_storage_path(student_id: Uuid, file_name: &str) -> String {
    format!("{}/raw/{}", student_id, file_name)
}

#[derive(Debug, Insertable)]
#[diesel(table_name = videos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewVideo<'a> {
    pub id: Uuid,
    pub student_id: Uuid,
    pub coach_id: Option<Uuid>,
    pub has_access: bool,
    pub original_name: &'a str,
    pub file_name: &'a str,
    pub size_bytes: i64,
    pub url: &'a str,
    pub created_timestamp: SystemTime,
    pub modified_timestamp: SystemTime,
}
