use filmroom_common::db::{self, DbAsyncPool};
use filmroom_common::models::user::UserRole;
use filmroom_common::request_io::inputs::{InputAnnotation, InputAnnotationData};
use filmroom_common::request_io::outputs::OutputAnnotation;

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::env;
use crate::handlers::error::{DoesNotExistType, HttpErrorResponse};
use crate::handlers::verification;
use crate::handlers::video::{ensure_approved_coach, ensure_video_visible};
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;

pub const MAX_ANNOTATION_SIZE_BYTES: usize = 64 * 1024;

pub async fn add(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    video_id: web::Path<Uuid>,
    annotation: web::Json<InputAnnotation>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let video_id = video_id.into_inner();
    let annotation = annotation.into_inner();

    verification::ensure_actor(annotation.coach_id, &token.claims)?;
    check_size(&annotation.data)?;

    let video = db::video::Dao::new(&db_async_pool)
        .get_video(video_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "get video"))?;

    if token.claims.role == UserRole::Coach && env::CONF.coach_view_requires_approval {
        ensure_approved_coach(&db_async_pool, annotation.coach_id, video.student_id).await?;
    }

    let annotation_dao = db::annotation::Dao::new(&db_async_pool);
    let added = annotation_dao
        .add_annotation(
            env::CONF.annotation_policy,
            video_id,
            annotation.coach_id,
            token.claims.role,
            &annotation.data,
        )
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "add annotation"))?;

    log::info!("Coach {} annotated video {video_id}", annotation.coach_id);

    Ok(HttpResponse::Created().json(OutputAnnotation::from(added)))
}

pub async fn list(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let video_id = video_id.into_inner();

    let video = db::video::Dao::new(&db_async_pool)
        .get_video(video_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "get video"))?;

    ensure_video_visible(&db_async_pool, &video, &token.claims).await?;

    let annotations = db::annotation::Dao::new(&db_async_pool)
        .list_annotations(video_id)
        .await
        .map_err(|e| {
            HttpErrorResponse::from_dao(e, DoesNotExistType::Annotation, "get annotations")
        })?;

    let output = annotations
        .into_iter()
        .map(OutputAnnotation::from)
        .collect::<Vec<_>>();

    Ok(HttpResponse::Ok().json(output))
}

pub async fn update(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    ids: web::Path<(Uuid, Uuid)>,
    annotation: web::Json<InputAnnotationData>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let (video_id, annotation_id) = ids.into_inner();
    check_size(&annotation.data)?;

    ensure_visible_by_id(&db_async_pool, video_id, &token).await?;

    let updated = db::annotation::Dao::new(&db_async_pool)
        .update_annotation(video_id, annotation_id, token.claims.user_id, &annotation.data)
        .await
        .map_err(|e| {
            HttpErrorResponse::from_dao(e, DoesNotExistType::Annotation, "update annotation")
        })?;

    Ok(HttpResponse::Ok().json(OutputAnnotation::from(updated)))
}

pub async fn delete(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    ids: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let (video_id, annotation_id) = ids.into_inner();

    ensure_visible_by_id(&db_async_pool, video_id, &token).await?;

    db::annotation::Dao::new(&db_async_pool)
        .delete_annotation(video_id, annotation_id, token.claims.user_id)
        .await
        .map_err(|e| {
            HttpErrorResponse::from_dao(e, DoesNotExistType::Annotation, "delete annotation")
        })?;

    Ok(HttpResponse::Ok().finish())
}

async fn ensure_visible_by_id(
    db_async_pool: &DbAsyncPool,
    video_id: Uuid,
    token: &VerifiedToken<Access, FromHeader>,
) -> Result<(), HttpErrorResponse> {
    let video = db::video::Dao::new(db_async_pool)
        .get_video(video_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::Video, "get video"))?;

    ensure_video_visible(db_async_pool, &video, &token.claims).await
}

fn check_size(data: &serde_json::Value) -> Result<(), HttpErrorResponse> {
    let size = match serde_json::to_vec(data) {
        Ok(bytes) => bytes.len(),
        Err(_) => {
            return Err(HttpErrorResponse::IncorrectlyFormed(String::from(
                "Annotation data could not be read",
            )))
        }
    };

    if size > MAX_ANNOTATION_SIZE_BYTES {
        return Err(HttpErrorResponse::InputTooLarge(format!(
            "Annotation data cannot be larger than {MAX_ANNOTATION_SIZE_BYTES} bytes"
        )));
    }

    Ok(())
}
