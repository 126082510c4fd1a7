use filmroom_common::db::{self, DbAsyncPool};
use filmroom_common::models::user::UserChanges;
use filmroom_common::request_io::inputs::{InputUserFilter, InputUserUpdate};
use filmroom_common::request_io::outputs::{OutputUser, OutputUserSummary};
use filmroom_common::storage::{FileStorage, DRILL_CONTAINER, VIDEO_CONTAINER};
use filmroom_common::validators::Validity;

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::handlers::error::{DoesNotExistType, HttpErrorResponse};
use crate::handlers::{files, verification};
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;

/// Users see their own full profile; anyone else gets the public summary.
pub async fn get(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_id = user_id.into_inner();

    let user = db::user::Dao::new(&db_async_pool)
        .get_user(user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "get user"))?;

    if user_id == token.claims.user_id {
        Ok(HttpResponse::Ok().json(OutputUser::from(&user)))
    } else {
        Ok(HttpResponse::Ok().json(OutputUserSummary::from(&user)))
    }
}

pub async fn list(
    db_async_pool: web::Data<DbAsyncPool>,
    _token: VerifiedToken<Access, FromHeader>,
    filter: web::Json<InputUserFilter>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_name = filter
        .user_name
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let users = db::user::Dao::new(&db_async_pool)
        .list_users(filter.role, user_name)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "get users"))?;

    Ok(HttpResponse::Ok().json(users.iter().map(OutputUserSummary::from).collect::<Vec<_>>()))
}

pub async fn update(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    user_id: web::Path<Uuid>,
    changes: web::Json<InputUserUpdate>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_id = user_id.into_inner();
    verification::ensure_actor(user_id, &token.claims)?;

    if let Validity::Invalid(msg) = changes.validate() {
        return Err(HttpErrorResponse::IncorrectlyFormed(msg));
    }

    let user_changes = UserChanges {
        username: changes.user_name.as_deref(),
        first_name: changes.first_name.as_deref().map(str::trim),
        last_name: changes.last_name.as_deref().map(str::trim),
    };

    let user = match db::user::Dao::new(&db_async_pool)
        .update_user(user_id, &user_changes)
        .await
    {
        Ok(u) => u,
        Err(e) if e.is_unique_violation() => {
            return Err(HttpErrorResponse::ConflictWithExisting(String::from(
                "Username is already taken",
            )));
        }
        Err(e) => {
            return Err(HttpErrorResponse::from_dao(
                e,
                DoesNotExistType::User,
                "update user",
            ));
        }
    };

    Ok(HttpResponse::Ok().json(OutputUser::from(&user)))
}

pub async fn delete(
    db_async_pool: web::Data<DbAsyncPool>,
    file_storage: web::Data<FileStorage>,
    token: VerifiedToken<Access, FromHeader>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_id = user_id.into_inner();
    verification::ensure_actor(user_id, &token.claims)?;

    let orphaned = db::user::Dao::new(&db_async_pool)
        .delete_user(user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "delete user"))?;

    files::discard(&file_storage, VIDEO_CONTAINER, &orphaned.video_paths).await;
    files::discard(&file_storage, DRILL_CONTAINER, &orphaned.drill_paths).await;

    log::info!(
        "Deleted user {user_id} along with {} videos and {} drills",
        orphaned.video_paths.len(),
        orphaned.drill_paths.len()
    );

    Ok(HttpResponse::Ok().finish())
}
