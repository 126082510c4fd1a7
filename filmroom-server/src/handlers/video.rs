use filmroom_common::db::{self, DbAsyncPool};
use filmroom_common::models::user::UserRole;
use filmroom_common::models::video::{video_storage_path, Video};
use filmroom_common::policy::video::{self as video_policy, VideoFilter};
use filmroom_common::request_io::inputs::{
    InputDeleteItems, InputFavourite, InputVideoList, InputVideoUpload,
};
use filmroom_common::request_io::outputs::{OutputDeletedCount, OutputVideo, OutputVideoList};
use filmroom_common::storage::{self, FileStorage, VIDEO_CONTAINER};
use filmroom_common::token::auth_token::AuthTokenClaims;
use filmroom_common::validators::{self, Validity};

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::env;
use crate::handlers::error::{DoesNotExistType, HttpErrorResponse};
use crate::handlers::{files, verification};
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;

pub async fn list(
    db_async_pool: web::Data<DbAsyncPool>,
    file_storage: web::Data<FileStorage>,
    token: VerifiedToken<Access, FromHeader>,
    list_request: web::Json<InputVideoList>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let params = list_request.into_inner().params;
    verification::ensure_actor(params.user_id, &token.claims)?;

    let filter = VideoFilter::for_listing(
        token.claims.role,
        params.user_id,
        params.student_id,
        params.coach_id,
    );

    let approved_students = if filter.requires_access() && env::CONF.coach_view_requires_approval
    {
        let relation_dao = db::relation::Dao::new(&db_async_pool);
        let approved = relation_dao
            .approved_counterparts(params.user_id)
            .await
            .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "get videos"))?;
        Some(approved)
    } else {
        None
    };

    let video_dao = db::video::Dao::new(&db_async_pool);
    let listings = video_dao
        .list_videos(filter, params.user_id, approved_students.as_deref())
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "get videos"))?;

    let mut list = Vec::with_capacity(listings.len());
    for listing in listings {
        let url = files::resolve_url(
            &file_storage,
            VIDEO_CONTAINER,
            &listing.video.storage_path(),
        )
        .await;

        list.push(OutputVideo::new(
            &listing.video,
            listing.student_name,
            listing.is_favourite,
            url,
        ));
    }

    Ok(HttpResponse::Ok().json(OutputVideoList { list }))
}

pub async fn upload(
    db_async_pool: web::Data<DbAsyncPool>,
    file_storage: web::Data<FileStorage>,
    token: VerifiedToken<Access, FromHeader>,
    upload_info: web::Query<InputVideoUpload>,
    body: web::Bytes,
) -> Result<HttpResponse, HttpErrorResponse> {
    let upload_info = upload_info.into_inner();
    verification::ensure_actor(upload_info.student_id, &token.claims)?;

    if token.claims.role != UserRole::Student {
        return Err(HttpErrorResponse::UserDisallowed(String::from(
            "Only students can upload videos",
        )));
    }

    let original_name = upload_info.original_name.trim();
    if let Validity::Invalid(msg) =
        validators::validate_text(original_name, validators::MAX_TITLE_LENGTH, "File name")
    {
        return Err(HttpErrorResponse::IncorrectlyFormed(msg));
    }

    let Some(extension) = storage::upload_extension(original_name) else {
        return Err(HttpErrorResponse::IncorrectlyFormed(String::from(
            "Video must be an .mp4, .mov or .avi file",
        )));
    };

    if body.is_empty() {
        return Err(HttpErrorResponse::IncorrectlyFormed(String::from(
            "Video file is empty",
        )));
    }

    if body.len() > env::CONF.max_video_size_bytes {
        return Err(HttpErrorResponse::InputTooLarge(format!(
            "Video cannot be larger than {} bytes",
            env::CONF.max_video_size_bytes
        )));
    }

    let user_dao = db::user::Dao::new(&db_async_pool);

    if let Some(coach_id) = upload_info.coach_id {
        let coach = user_dao
            .get_user(coach_id)
            .await
            .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "find coach"))?;

        if !matches!(coach.parsed_role(), Ok(UserRole::Coach)) {
            return Err(HttpErrorResponse::IncorrectlyFormed(String::from(
                "coachId does not belong to a coach",
            )));
        }
    }

    let student = user_dao
        .get_user(upload_info.student_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "find student"))?;

    let file_name = storage::generate_file_name("video", extension);
    let subfolder = format!("{}/raw", upload_info.student_id);

    let url = match file_storage
        .save_file(VIDEO_CONTAINER, &subfolder, &file_name, &body)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to store video",
            )));
        }
    };

    let video_dao = db::video::Dao::new(&db_async_pool);
    let video = match video_dao
        .create_video(
            upload_info.student_id,
            upload_info.coach_id,
            original_name,
            &file_name,
            body.len() as i64,
            &url,
        )
        .await
    {
        Ok(v) => v,
        Err(e) => {
            let path = video_storage_path(upload_info.student_id, &file_name);
            files::discard(&file_storage, VIDEO_CONTAINER, &[path]).await;
            return Err(HttpErrorResponse::from_dao(
                e,
                DoesNotExistType::User,
                "save video",
            ));
        }
    };

    log::info!(
        "Student {} uploaded video {} ({} bytes)",
        video.student_id,
        video.id,
        video.size_bytes
    );

    Ok(HttpResponse::Created().json(OutputVideo::new(
        &video,
        student.display_name(),
        false,
        Some(url),
    )))
}

pub async fn get(
    db_async_pool: web::Data<DbAsyncPool>,
    file_storage: web::Data<FileStorage>,
    token: VerifiedToken<Access, FromHeader>,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let video_dao = db::video::Dao::new(&db_async_pool);
    let listing = video_dao
        .get_listing(video_id.into_inner(), token.claims.user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "get video"))?;

    ensure_video_visible(&db_async_pool, &listing.video, &token.claims).await?;

    let url = files::resolve_url(
        &file_storage,
        VIDEO_CONTAINER,
        &listing.video.storage_path(),
    )
    .await;

    Ok(HttpResponse::Ok().json(OutputVideo::new(
        &listing.video,
        listing.student_name,
        listing.is_favourite,
        url,
    )))
}

pub async fn set_favourite(
    db_async_pool: web::Data<DbAsyncPool>,
    file_storage: web::Data<FileStorage>,
    token: VerifiedToken<Access, FromHeader>,
    video_id: web::Path<Uuid>,
    favourite: web::Json<InputFavourite>,
) -> Result<HttpResponse, HttpErrorResponse> {
    verification::ensure_actor(favourite.user_id, &token.claims)?;

    let video_id = video_id.into_inner();
    let video_dao = db::video::Dao::new(&db_async_pool);

    let video = video_dao
        .get_video(video_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "get video"))?;

    video_policy::check_participant(&video, favourite.user_id)?;
    ensure_video_visible(&db_async_pool, &video, &token.claims).await?;

    video_dao
        .set_favourite(video_id, favourite.user_id, favourite.is_favourite)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "update video"))?;

    let listing = video_dao
        .get_listing(video_id, favourite.user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "get video"))?;

    let url = files::resolve_url(
        &file_storage,
        VIDEO_CONTAINER,
        &listing.video.storage_path(),
    )
    .await;

    Ok(HttpResponse::Ok().json(OutputVideo::new(
        &listing.video,
        listing.student_name,
        listing.is_favourite,
        url,
    )))
}

pub async fn delete(
    db_async_pool: web::Data<DbAsyncPool>,
    file_storage: web::Data<FileStorage>,
    token: VerifiedToken<Access, FromHeader>,
    to_delete: web::Json<InputDeleteItems>,
) -> Result<HttpResponse, HttpErrorResponse> {
    verification::ensure_actor(to_delete.user_id, &token.claims)?;
    video_policy::check_may_delete(token.claims.role)?;

    if to_delete.ids.is_empty() {
        return Err(HttpErrorResponse::IncorrectlyFormed(String::from(
            "No videos were specified",
        )));
    }

    let video_dao = db::video::Dao::new(&db_async_pool);
    let deleted = video_dao
        .delete_videos(to_delete.user_id, &to_delete.ids)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "delete videos"))?;

    let paths = deleted.iter().map(Video::storage_path).collect::<Vec<_>>();
    files::discard(&file_storage, VIDEO_CONTAINER, &paths).await;

    log::info!(
        "Student {} deleted {} of {} requested videos",
        to_delete.user_id,
        deleted.len(),
        to_delete.ids.len()
    );

    Ok(HttpResponse::Ok().json(OutputDeletedCount {
        deleted_count: deleted.len(),
    }))
}

/// Fails unless `claims` may see `video`. When the deployment requires it, a coach also needs
/// an approved relation with the owning student.
pub async fn ensure_video_visible(
    db_async_pool: &DbAsyncPool,
    video: &Video,
    claims: &AuthTokenClaims,
) -> Result<(), HttpErrorResponse> {
    video_policy::check_visible(video, claims.user_id)?;

    if video.student_id == claims.user_id || !env::CONF.coach_view_requires_approval {
        return Ok(());
    }

    ensure_approved_coach(db_async_pool, claims.user_id, video.student_id).await
}

pub async fn ensure_approved_coach(
    db_async_pool: &DbAsyncPool,
    coach_id: Uuid,
    student_id: Uuid,
) -> Result<(), HttpErrorResponse> {
    let relation_dao = db::relation::Dao::new(db_async_pool);
    let is_approved = relation_dao
        .is_approved(coach_id, student_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Relation, "check relation"))?;

    if !is_approved {
        return Err(HttpErrorResponse::UserDisallowed(String::from(
            "Coach is not connected to the student who owns this video",
        )));
    }

    Ok(())
}
