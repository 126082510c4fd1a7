use diesel::Insertable;
use uuid::Uuid;

use crate::schema::video_favourites;

#[derive(Debug, Insertable)]
#[diesel(table_name = video_favourites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewVideoFavourite {
    pub video_id: Uuid,
    pub user_id: Uuid,
}
