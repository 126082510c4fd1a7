use filmroom_common::db::{self, DbAsyncPool};
use filmroom_common::models::user::UserRole;
use filmroom_common::request_io::inputs::{InputLogin, InputRegister};
use filmroom_common::request_io::outputs::{unix_millis, OutputSignin};
use filmroom_common::token::auth_token::{AuthToken, AuthTokenClaims, AuthTokenType};
use filmroom_common::validators::{self, Validity};

use actix_web::{web, HttpResponse};
use std::time::SystemTime;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::env;
use crate::handlers::error::{DoesNotExistType, HttpErrorResponse};
use crate::handlers::verification;
use crate::middleware::auth::{Refresh, VerifiedToken};
use crate::middleware::FromHeader;

const WRONG_CREDENTIALS_MSG: &str = "The username, email address or password was incorrect";

pub async fn register(
    db_async_pool: web::Data<DbAsyncPool>,
    user_data: web::Json<InputRegister>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_data = user_data.into_inner();

    if let Validity::Invalid(msg) = user_data.validate() {
        return Err(HttpErrorResponse::IncorrectlyFormed(msg));
    }

    let password_hash = verification::hash_password(Zeroizing::new(user_data.password)).await?;

    let user_dao = db::user::Dao::new(&db_async_pool);
    let user_id = match user_dao
        .create_user(
            &user_data.email,
            &user_data.user_name,
            user_data.first_name.trim(),
            user_data.last_name.trim(),
            &password_hash,
            user_data.role,
        )
        .await
    {
        Ok(id) => id,
        Err(e) if e.is_unique_violation() => {
            return Err(HttpErrorResponse::ConflictWithExisting(String::from(
                "A user with this email address or username already exists",
            )));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to create user",
            )));
        }
    };

    log::info!("Registered {} {user_id}", user_data.role);

    Ok(HttpResponse::Created().json(issue_tokens(user_id, user_data.role)?))
}

pub async fn login(
    db_async_pool: web::Data<DbAsyncPool>,
    credentials: web::Json<InputLogin>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let credentials = credentials.into_inner();

    if credentials.identifier.is_empty()
        || credentials.password.len() > validators::MAX_PASSWORD_LENGTH
    {
        return Err(HttpErrorResponse::IncorrectCredential(String::from(
            WRONG_CREDENTIALS_MSG,
        )));
    }

    let user_dao = db::user::Dao::new(&db_async_pool);
    let user = match user_dao.get_user_by_identifier(&credentials.identifier).await {
        Ok(u) => u,
        // Report a missing user the same way as a wrong password
        Err(e) if e.is_not_found() => {
            return Err(HttpErrorResponse::IncorrectCredential(String::from(
                WRONG_CREDENTIALS_MSG,
            )));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to look up user",
            )));
        }
    };

    verification::verify_password(Zeroizing::new(credentials.password), user.password_hash.clone())
        .await?;

    let Ok(role) = user.parsed_role() else {
        log::error!("User {} has an unrecognized role '{}'", user.id, user.role);
        return Err(HttpErrorResponse::UserDisallowed(String::from(
            "User role is not recognized",
        )));
    };

    Ok(HttpResponse::Ok().json(issue_tokens(user.id, role)?))
}

pub async fn refresh_tokens(
    db_async_pool: web::Data<DbAsyncPool>,
    token: VerifiedToken<Refresh, FromHeader>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_dao = db::user::Dao::new(&db_async_pool);
    let user = user_dao
        .get_user(token.claims.user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, DoesNotExistType::User, "look up user"))?;

    let Ok(role) = user.parsed_role() else {
        return Err(HttpErrorResponse::UserDisallowed(String::from(
            "User role is not recognized",
        )));
    };

    Ok(HttpResponse::Ok().json(issue_tokens(user.id, role)?))
}

fn issue_tokens(user_id: Uuid, role: UserRole) -> Result<OutputSignin, HttpErrorResponse> {
    let access_claims = AuthTokenClaims::new(
        user_id,
        role,
        AuthTokenType::Access,
        env::CONF.access_token_lifetime,
    )?;
    let refresh_claims = AuthTokenClaims::new(
        user_id,
        role,
        AuthTokenType::Refresh,
        env::CONF.refresh_token_lifetime,
    )?;

    Ok(OutputSignin {
        user_id,
        role,
        access_token: AuthToken::sign_new(&access_claims, &env::CONF.token_signing_key)?,
        refresh_token: AuthToken::sign_new(&refresh_claims, &env::CONF.token_signing_key)?,
        server_time: unix_millis(SystemTime::now()),
    })
}
