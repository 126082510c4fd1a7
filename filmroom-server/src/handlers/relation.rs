use filmroom_common::db::relation::ActionOutcome;
use filmroom_common::db::{self, DbAsyncPool};
use filmroom_common::models::relation::{Relation, RelationStatus};
use filmroom_common::models::user::{User, UserRole};
use filmroom_common::policy::relation::RelationView;
use filmroom_common::request_io::inputs::{InputRelationAction, InputRelationRequest};
use filmroom_common::request_io::outputs::{
    unix_millis, OutputCoachRelations, OutputRelation, OutputRelationActionResult,
    OutputRelationRequested, OutputStudentRelations,
};
use filmroom_common::validators::{self, Validity};

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::handlers::error::{DoesNotExistType, HttpErrorResponse};
use crate::handlers::verification;
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;

pub async fn request(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    relation_request: web::Json<InputRelationRequest>,
) -> Result<HttpResponse, HttpErrorResponse> {
    verification::ensure_actor(relation_request.requester_id, &token.claims)?;

    let relation_dao = db::relation::Dao::new(&db_async_pool);
    let relation = relation_dao
        .request_relation(relation_request.requester_id, relation_request.target_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "request relation"))?;

    let target = db::user::Dao::new(&db_async_pool)
        .get_user(relation_request.target_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "look up user"))?;

    log::info!(
        "User {} requested a relation with {}",
        relation_request.requester_id,
        relation_request.target_id
    );

    Ok(HttpResponse::Created().json(OutputRelationRequested {
        relation: output_relation(&relation, token.claims.user_id, &target)?,
    }))
}

pub async fn action(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    relation_action: web::Json<InputRelationAction>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let relation_action = relation_action.into_inner();

    verification::ensure_actor(relation_action.approver_id, &token.claims)?;

    let feedback = relation_action
        .feedback
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    if let Some(feedback) = feedback {
        if let Validity::Invalid(msg) =
            validators::validate_text(feedback, validators::MAX_FEEDBACK_LENGTH, "Feedback")
        {
            return Err(HttpErrorResponse::IncorrectlyFormed(msg));
        }
    }

    let relation_dao = db::relation::Dao::new(&db_async_pool);
    let outcome = relation_dao
        .handle_action(
            relation_action.approver_id,
            relation_action.requester_id,
            relation_action.action,
            feedback,
        )
        .await
        .map_err(|e| {
            HttpErrorResponse::from_dao(e, DoesNotExistType::Relation, "update relation")
        })?;

    let result = match outcome {
        ActionOutcome::Decided(relation) => {
            let Ok(status) = relation.status.parse::<RelationStatus>() else {
                log::error!("Relation has an unrecognized status '{}'", relation.status);
                return Err(HttpErrorResponse::InternalError(String::from(
                    "Failed to read relation",
                )));
            };

            OutputRelationActionResult {
                status,
                decision_timestamp: relation.decision_timestamp.map(unix_millis),
                feedback: relation.feedback,
                revoked_video_count: 0,
            }
        }
        ActionOutcome::Removed {
            revoked_video_count,
        } => OutputRelationActionResult {
            status: relation_action.action.resulting_status(),
            decision_timestamp: None,
            feedback: None,
            revoked_video_count,
        },
    };

    log::info!(
        "User {} set the relation with {} to {}",
        relation_action.approver_id,
        relation_action.requester_id,
        result.status
    );

    Ok(HttpResponse::Ok().json(result))
}

pub async fn coach_overview(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    coach_id: web::Path<Uuid>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let relations =
        load_relations(&db_async_pool, &token, coach_id.into_inner(), UserRole::Coach).await?;
    Ok(HttpResponse::Ok().json(OutputCoachRelations::from_relations(relations)))
}

pub async fn student_history(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Access, FromHeader>,
    student_id: web::Path<Uuid>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let relations = load_relations(
        &db_async_pool,
        &token,
        student_id.into_inner(),
        UserRole::Student,
    )
    .await?;
    Ok(HttpResponse::Ok().json(OutputStudentRelations::from_relations(relations)))
}

/// Loads every relation of `user_id` as that user sees it. Only the user themselves may read
/// their relations, and only through the overview for their own role.
async fn load_relations(
    db_async_pool: &DbAsyncPool,
    token: &VerifiedToken<Access, FromHeader>,
    user_id: Uuid,
    role: UserRole,
) -> Result<Vec<OutputRelation>, HttpErrorResponse> {
    verification::ensure_actor(user_id, &token.claims)?;

    if token.claims.role != role {
        return Err(HttpErrorResponse::UserDisallowed(format!(
            "Only a {role} can view this overview"
        )));
    }

    let relation_dao = db::relation::Dao::new(db_async_pool);
    let relations = relation_dao
        .relations_with_counterparts(user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "get relations"))?;

    relations
        .iter()
        .map(|(relation, counterpart)| output_relation(relation, user_id, counterpart))
        .collect()
}

fn output_relation(
    relation: &Relation,
    viewer_id: Uuid,
    counterpart: &User,
) -> Result<OutputRelation, HttpErrorResponse> {
    match RelationView::for_viewer(relation, viewer_id) {
        Ok(view) => Ok(OutputRelation::new(view, counterpart)),
        Err(e) => {
            log::error!("{e}");
            Err(HttpErrorResponse::InternalError(String::from(
                "Failed to read relation",
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use filmroom_common::policy::relation::RequestType;
    use filmroom_common::request_io::outputs::{ErrorType, OutputSignin, ServerErrorResponse};

    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use serde_json::json;

    use crate::handlers::test_utils;

    fn overview_request(signin: &OutputSignin, path: &str) -> TestRequest {
        TestRequest::get()
            .uri(path)
            .insert_header(("AccessToken", signin.access_token.as_str()))
    }

    #[actix_web::test]
    async fn test_actor_must_be_token_owner() {
        let app = init_test_app!();

        let user_id = Uuid::now_v7();
        let token = test_utils::access_token(user_id, UserRole::Student);

        let req = TestRequest::post()
            .uri("/api/relation/request")
            .insert_header(("AccessToken", token.as_str()))
            .set_json(json!({ "requesterId": Uuid::now_v7(), "targetId": Uuid::now_v7() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body: ServerErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.err_type, ErrorType::UserDisallowed);

        let req = TestRequest::post()
            .uri("/api/relation/request")
            .set_json(json!({ "requesterId": user_id, "targetId": Uuid::now_v7() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = TestRequest::post()
            .uri("/api/relation/action")
            .insert_header(("AccessToken", token.as_str()))
            .set_json(json!({
                "approverId": user_id,
                "requesterId": Uuid::now_v7(),
                "action": "approved",
                "feedback": "x".repeat(validators::MAX_FEEDBACK_LENGTH + 1),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    #[ignore]
    async fn test_request_approve_and_views() {
        let app = init_test_app!();

        let student = test_utils::create_user(UserRole::Student).await;
        let coach = test_utils::create_user(UserRole::Coach).await;

        let req = TestRequest::post()
            .uri("/api/relation/request")
            .insert_header(("AccessToken", student.access_token.as_str()))
            .set_json(json!({ "requesterId": student.user_id, "targetId": coach.user_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let requested: OutputRelationRequested = test::read_body_json(resp).await;
        assert_eq!(requested.relation.counterpart.id, coach.user_id);
        assert_eq!(requested.relation.status, RelationStatus::Requested);
        assert_eq!(requested.relation.request_type, RequestType::Sent);

        // A second request while pending does not create another relation
        let req = TestRequest::post()
            .uri("/api/relation/request")
            .insert_header(("AccessToken", coach.access_token.as_str()))
            .set_json(json!({ "requesterId": coach.user_id, "targetId": student.user_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = overview_request(&coach, &format!("/api/relation/coach/{}", coach.user_id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let overview: OutputCoachRelations = test::read_body_json(resp).await;
        assert_eq!(overview.pending.len(), 1);
        assert_eq!(overview.pending[0].counterpart.id, student.user_id);
        assert_eq!(overview.pending[0].request_type, RequestType::Received);
        assert!(overview.students.is_empty());

        // The requester cannot decide its own request
        let req = TestRequest::post()
            .uri("/api/relation/action")
            .insert_header(("AccessToken", student.access_token.as_str()))
            .set_json(json!({
                "approverId": student.user_id,
                "requesterId": coach.user_id,
                "action": "approved",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::post()
            .uri("/api/relation/action")
            .insert_header(("AccessToken", coach.access_token.as_str()))
            .set_json(json!({
                "approverId": coach.user_id,
                "requesterId": student.user_id,
                "action": "approved",
                "feedback": "  See you Tuesday  ",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let decided: OutputRelationActionResult = test::read_body_json(resp).await;
        assert_eq!(decided.status, RelationStatus::Approved);
        assert_eq!(decided.feedback.as_deref(), Some("See you Tuesday"));
        assert!(decided.decision_timestamp.is_some());

        // Deciding again is a conflict and keeps the original decision time
        let req = TestRequest::post()
            .uri("/api/relation/action")
            .insert_header(("AccessToken", coach.access_token.as_str()))
            .set_json(json!({
                "approverId": coach.user_id,
                "requesterId": student.user_id,
                "action": "rejected",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = overview_request(&student, &format!("/api/relation/student/{}", student.user_id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let history: OutputStudentRelations = test::read_body_json(resp).await;
        assert_eq!(history.history.len(), 1);
        assert_eq!(history.history[0].status, RelationStatus::Approved);
        assert_eq!(history.history[0].request_type, RequestType::Sent);
        assert_eq!(
            history.history[0].decision_timestamp,
            decided.decision_timestamp
        );

        let req = overview_request(&coach, &format!("/api/relation/coach/{}", coach.user_id)).to_request();
        let resp = test::call_service(&app, req).await;
        let overview: OutputCoachRelations = test::read_body_json(resp).await;
        assert!(overview.pending.is_empty());
        assert_eq!(overview.students.len(), 1);
        assert_eq!(
            overview.students[0].decision_timestamp,
            decided.decision_timestamp
        );

        test_utils::delete_user(student.user_id).await;
        test_utils::delete_user(coach.user_id).await;
    }

    #[actix_web::test]
    #[ignore]
    async fn test_overviews_are_private_and_role_bound() {
        let app = init_test_app!();

        let student = test_utils::create_user(UserRole::Student).await;
        let coach = test_utils::create_user(UserRole::Coach).await;

        let req = overview_request(&student, &format!("/api/relation/coach/{}", coach.user_id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = overview_request(&student, &format!("/api/relation/coach/{}", student.user_id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = overview_request(&coach, &format!("/api/relation/coach/{}", coach.user_id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        test_utils::delete_user(student.user_id).await;
        test_utils::delete_user(coach.user_id).await;
    }

    #[actix_web::test]
    #[ignore]
    async fn test_missing_relation_is_forbidden_not_missing() {
        let app = init_test_app!();

        let student = test_utils::create_user(UserRole::Student).await;
        let coach = test_utils::create_user(UserRole::Coach).await;

        for action in ["approved", "rejected", "removed"] {
            let req = TestRequest::post()
                .uri("/api/relation/action")
                .insert_header(("AccessToken", coach.access_token.as_str()))
                .set_json(json!({
                    "approverId": coach.user_id,
                    "requesterId": student.user_id,
                    "action": action,
                }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        }

        let req = TestRequest::post()
            .uri("/api/relation/request")
            .insert_header(("AccessToken", coach.access_token.as_str()))
            .set_json(json!({ "requesterId": coach.user_id, "targetId": Uuid::now_v7() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = TestRequest::post()
            .uri("/api/relation/request")
            .insert_header(("AccessToken", coach.access_token.as_str()))
            .set_json(json!({ "requesterId": coach.user_id, "targetId": coach.user_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        test_utils::delete_user(student.user_id).await;
        test_utils::delete_user(coach.user_id).await;
    }
}
