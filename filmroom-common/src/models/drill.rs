use diesel::{AsChangeset, Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::drills;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, QueryableByName)]
#[diesel(table_name = drills)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Drill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_private: bool,
    pub file_name: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub created_timestamp: SystemTime,
    pub modified_timestamp: SystemTime,
}

impl Drill {
    pub fn storage_path(&self) -> String {
        format!("{}/{}", self.user_id, self.file_name)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = drills)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDrill<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_private: bool,
    pub file_name: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub url: &'a str,
    pub created_timestamp: SystemTime,
    pub modified_timestamp: SystemTime,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = drills)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DrillChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub is_private: Option<bool>,
    pub modified_timestamp: SystemTime,
}
