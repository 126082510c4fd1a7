#[cfg(test)]
macro_rules! init_test_app {
    () => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(
                    crate::env::testing::DB_ASYNC_POOL.clone(),
                ))
                .app_data(actix_web::web::Data::from(
                    crate::env::testing::FILE_STORE.clone(),
                ))
                .configure(|cfg| {
                    crate::services::api::configure(
                        cfg,
                        crate::services::api::RouteLimiters::default(),
                    )
                }),
        )
        .await
    };
}

pub mod annotation;
pub mod auth;
pub mod drill;
pub mod health;
pub mod relation;
pub mod user;
pub mod video;

pub mod verification {
    use filmroom_common::token::auth_token::AuthTokenClaims;

    use std::str::FromStr;
    use tokio::sync::oneshot;
    use uuid::Uuid;
    use zeroize::Zeroizing;

    use super::error::HttpErrorResponse;
    use crate::env;

    /// Body fields that name the acting user must name the token's owner.
    pub fn ensure_actor(claimed_id: Uuid, claims: &AuthTokenClaims) -> Result<(), HttpErrorResponse> {
        if claimed_id != claims.user_id {
            return Err(HttpErrorResponse::UserDisallowed(String::from(
                "Request was made on behalf of a different user",
            )));
        }

        Ok(())
    }

    pub async fn hash_password(password: Zeroizing<String>) -> Result<String, HttpErrorResponse> {
        let (sender, receiver) = oneshot::channel();

        rayon::spawn(move || {
            let hash_result = argon2_kdf::Hasher::default()
                .algorithm(argon2_kdf::Algorithm::Argon2id)
                .salt_length(env::CONF.hash_salt_length)
                .hash_length(env::CONF.hash_length)
                .iterations(env::CONF.hash_iterations)
                .memory_cost_kib(env::CONF.hash_mem_cost_kib)
                .threads(env::CONF.hash_threads)
                .secret(argon2_kdf::Secret::using_bytes(&env::CONF.hashing_key))
                .hash(password.as_bytes());

            // The receiver only goes away if the request was dropped
            let _ = sender.send(hash_result.map(|h| h.to_string()));
        });

        match receiver.await? {
            Ok(hash) => Ok(hash),
            Err(e) => {
                log::error!("{e}");
                Err(HttpErrorResponse::InternalError(String::from(
                    "Failed to hash password",
                )))
            }
        }
    }

    pub async fn verify_password(
        password: Zeroizing<String>,
        password_hash: String,
    ) -> Result<(), HttpErrorResponse> {
        let (sender, receiver) = oneshot::channel();

        rayon::spawn(move || {
            let result = argon2_kdf::Hash::from_str(&password_hash).map(|hash| {
                hash.verify_with_secret(
                    password.as_bytes(),
                    argon2_kdf::Secret::using_bytes(&env::CONF.hashing_key),
                )
            });

            let _ = sender.send(result);
        });

        match receiver.await? {
            Ok(true) => Ok(()),
            Ok(false) => Err(HttpErrorResponse::IncorrectCredential(String::from(
                "The username, email address or password was incorrect",
            ))),
            Err(e) => {
                log::error!("{e}");
                Err(HttpErrorResponse::InternalError(String::from(
                    "Failed to validate password",
                )))
            }
        }
    }
}

pub mod files {
    use filmroom_common::storage::FileStorage;

    /// Resolves the public URL of a stored file. A file that is missing or cannot be checked
    /// resolves to `None`.
    pub async fn resolve_url(storage: &FileStorage, container: &str, path: &str) -> Option<String> {
        match storage.file_url(container, path).await {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Could not resolve {container}/{path}: {e}");
                None
            }
        }
    }

    /// Deletes files whose rows are already gone. Failures are logged and otherwise ignored.
    pub async fn discard(storage: &FileStorage, container: &str, paths: &[String]) {
        for path in paths {
            if let Err(e) = storage.delete_file(container, path).await {
                log::warn!("Failed to delete {container}/{path}: {e}");
            }
        }
    }
}

pub mod error {
    use filmroom_common::db::DaoError;
    use filmroom_common::policy::annotation::AnnotationError;
    use filmroom_common::policy::relation::RelationError;
    use filmroom_common::policy::video::VideoAccessError;
    use filmroom_common::request_io::outputs::{ErrorType, ServerErrorResponse};
    use filmroom_common::token::TokenError;

    use actix_web::http::StatusCode;
    use actix_web::{HttpResponse, HttpResponseBuilder};
    use std::fmt;
    use tokio::sync::oneshot;

    #[derive(Clone, Copy, Debug)]
    pub enum DoesNotExistType {
        User,
        Relation,
        Video,
        Annotation,
        Drill,
    }

    #[derive(Debug)]
    pub enum HttpErrorResponse {
        // 400
        IncorrectlyFormed(String),

        // 401
        IncorrectCredential(String),
        TokenExpired(String),
        TokenMissing(String),
        WrongTokenType(String),

        // 403
        UserDisallowed(String),

        // 404
        DoesNotExist(String, DoesNotExistType),

        // 409
        ConflictWithExisting(String),

        // 413
        InputTooLarge(String),

        // 429
        TooManyRequested(String),

        // 500
        InternalError(String),
    }

    impl HttpErrorResponse {
        /// Maps a failed DAO call onto a response. A missing row becomes a 404 of `dne_type`
        /// and rule violations keep their meaning. Anything else is logged and reported as
        /// `Failed to {failed_to}`.
        pub fn from_dao(err: DaoError, dne_type: DoesNotExistType, failed_to: &str) -> Self {
            match err {
                DaoError::QueryFailure(diesel::result::Error::NotFound) => {
                    let subject = match dne_type {
                        DoesNotExistType::User => "User",
                        DoesNotExistType::Relation => "Relation",
                        DoesNotExistType::Video => "Video",
                        DoesNotExistType::Annotation => "Annotation",
                        DoesNotExistType::Drill => "Drill",
                    };

                    HttpErrorResponse::DoesNotExist(format!("{subject} not found"), dne_type)
                }
                DaoError::RelationRule(e) => e.into(),
                DaoError::AnnotationRule(e) => e.into(),
                e if e.is_unique_violation() => {
                    HttpErrorResponse::ConflictWithExisting(String::from(
                        "A record with the same identity already exists",
                    ))
                }
                e => {
                    log::error!("{e}");
                    HttpErrorResponse::InternalError(format!("Failed to {failed_to}"))
                }
            }
        }
    }

    impl std::error::Error for HttpErrorResponse {}

    impl fmt::Display for HttpErrorResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let server_error: ServerErrorResponse = self.into();
            write!(f, "{:?}", server_error)
        }
    }

    impl From<HttpErrorResponse> for ServerErrorResponse {
        fn from(resp: HttpErrorResponse) -> Self {
            (&resp).into()
        }
    }

    impl From<&HttpErrorResponse> for ServerErrorResponse {
        fn from(resp: &HttpErrorResponse) -> Self {
            match resp {
                // 400
                HttpErrorResponse::IncorrectlyFormed(msg) => ServerErrorResponse {
                    err_type: ErrorType::IncorrectlyFormed,
                    err_message: format!("Incorrectly formed request: {msg}"),
                },

                // 401
                HttpErrorResponse::IncorrectCredential(msg) => ServerErrorResponse {
                    err_type: ErrorType::IncorrectCredential,
                    err_message: format!("Incorrect credential: {msg}"),
                },
                HttpErrorResponse::TokenExpired(msg) => ServerErrorResponse {
                    err_type: ErrorType::TokenExpired,
                    err_message: format!("Token expired: {msg}"),
                },
                HttpErrorResponse::TokenMissing(msg) => ServerErrorResponse {
                    err_type: ErrorType::TokenMissing,
                    err_message: format!("Token missing: {msg}"),
                },
                HttpErrorResponse::WrongTokenType(msg) => ServerErrorResponse {
                    err_type: ErrorType::WrongTokenType,
                    err_message: format!("Wrong token type: {msg}"),
                },

                // 403
                HttpErrorResponse::UserDisallowed(msg) => ServerErrorResponse {
                    err_type: ErrorType::UserDisallowed,
                    err_message: format!("User disallowed: {msg}"),
                },

                // 404
                HttpErrorResponse::DoesNotExist(msg, dne_type) => ServerErrorResponse {
                    err_type: match dne_type {
                        DoesNotExistType::User => ErrorType::UserDoesNotExist,
                        DoesNotExistType::Relation => ErrorType::RelationDoesNotExist,
                        DoesNotExistType::Video => ErrorType::VideoDoesNotExist,
                        DoesNotExistType::Annotation => ErrorType::AnnotationDoesNotExist,
                        DoesNotExistType::Drill => ErrorType::DrillDoesNotExist,
                    },
                    err_message: format!("Does not exist: {msg}"),
                },

                // 409
                HttpErrorResponse::ConflictWithExisting(msg) => ServerErrorResponse {
                    err_type: ErrorType::ConflictWithExisting,
                    err_message: format!("Conflict with existing data: {msg}"),
                },

                // 413
                HttpErrorResponse::InputTooLarge(msg) => ServerErrorResponse {
                    err_type: ErrorType::InputTooLarge,
                    err_message: format!("Input is too large: {msg}"),
                },

                // 429
                HttpErrorResponse::TooManyRequested(msg) => ServerErrorResponse {
                    err_type: ErrorType::TooManyRequested,
                    err_message: format!("Too many requested: {msg}"),
                },

                // 500
                HttpErrorResponse::InternalError(msg) => ServerErrorResponse {
                    err_type: ErrorType::InternalError,
                    err_message: format!("Internal error: {msg}"),
                },
            }
        }
    }

    impl actix_web::error::ResponseError for HttpErrorResponse {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code()).json(ServerErrorResponse::from(self))
        }

        fn status_code(&self) -> StatusCode {
            match *self {
                HttpErrorResponse::IncorrectlyFormed(_) => StatusCode::BAD_REQUEST,
                HttpErrorResponse::IncorrectCredential(_)
                | HttpErrorResponse::TokenExpired(_)
                | HttpErrorResponse::TokenMissing(_)
                | HttpErrorResponse::WrongTokenType(_) => StatusCode::UNAUTHORIZED,
                HttpErrorResponse::UserDisallowed(_) => StatusCode::FORBIDDEN,
                HttpErrorResponse::DoesNotExist(_, _) => StatusCode::NOT_FOUND,
                HttpErrorResponse::ConflictWithExisting(_) => StatusCode::CONFLICT,
                HttpErrorResponse::InputTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                HttpErrorResponse::TooManyRequested(_) => StatusCode::TOO_MANY_REQUESTS,
                HttpErrorResponse::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl From<oneshot::error::RecvError> for HttpErrorResponse {
        fn from(_err: oneshot::error::RecvError) -> Self {
            HttpErrorResponse::InternalError(String::from("Rayon thread pool failure"))
        }
    }

    impl From<TokenError> for HttpErrorResponse {
        fn from(err: TokenError) -> Self {
            match err {
                TokenError::TokenInvalid => {
                    HttpErrorResponse::IncorrectCredential(String::from("Invalid token"))
                }
                TokenError::TokenExpired => {
                    HttpErrorResponse::TokenExpired(String::from("Token expired"))
                }
                TokenError::TokenMissing => {
                    HttpErrorResponse::TokenMissing(String::from("Missing token"))
                }
                TokenError::WrongTokenType => {
                    HttpErrorResponse::WrongTokenType(String::from("Wrong token type"))
                }
                TokenError::SigningFailed => {
                    HttpErrorResponse::InternalError(String::from("Failed to sign token"))
                }
            }
        }
    }

    impl From<RelationError> for HttpErrorResponse {
        fn from(err: RelationError) -> Self {
            match err {
                RelationError::SelfRelation => HttpErrorResponse::IncorrectlyFormed(err.to_string()),
                RelationError::AlreadyRequested
                | RelationError::AlreadyConnected
                | RelationError::AlreadyRejected
                | RelationError::AlreadyDecided(_) => {
                    HttpErrorResponse::ConflictWithExisting(err.to_string())
                }
                RelationError::NotAuthorized(_) => {
                    HttpErrorResponse::UserDisallowed(err.to_string())
                }
            }
        }
    }

    impl From<AnnotationError> for HttpErrorResponse {
        fn from(err: AnnotationError) -> Self {
            HttpErrorResponse::UserDisallowed(err.to_string())
        }
    }

    impl From<VideoAccessError> for HttpErrorResponse {
        fn from(err: VideoAccessError) -> Self {
            HttpErrorResponse::UserDisallowed(err.to_string())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        use actix_web::body::to_bytes;
        use actix_web::ResponseError;
        use filmroom_common::models::relation::RelationStatus;
        use filmroom_common::policy::relation::RelationAction;

        #[test]
        fn test_relation_errors_map_to_statuses() {
            let cases = [
                (RelationError::SelfRelation, StatusCode::BAD_REQUEST),
                (RelationError::AlreadyRequested, StatusCode::CONFLICT),
                (RelationError::AlreadyConnected, StatusCode::CONFLICT),
                (RelationError::AlreadyRejected, StatusCode::CONFLICT),
                (
                    RelationError::AlreadyDecided(RelationStatus::Approved),
                    StatusCode::CONFLICT,
                ),
                (
                    RelationError::NotAuthorized(RelationAction::Approved),
                    StatusCode::FORBIDDEN,
                ),
                (
                    RelationError::NotAuthorized(RelationAction::Removed),
                    StatusCode::FORBIDDEN,
                ),
            ];

            for (err, status) in cases {
                assert_eq!(HttpErrorResponse::from(err).status_code(), status);
            }
        }

        #[test]
        fn test_dao_errors_map_to_statuses() {
            let not_found = HttpErrorResponse::from_dao(
                DaoError::QueryFailure(diesel::result::Error::NotFound),
                DoesNotExistType::Video,
                "get video",
            );
            assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
            assert!(matches!(
                not_found,
                HttpErrorResponse::DoesNotExist(_, DoesNotExistType::Video)
            ));

            let rule = HttpErrorResponse::from_dao(
                DaoError::AnnotationRule(AnnotationError::NotAssignedCoach),
                DoesNotExistType::Video,
                "add annotation",
            );
            assert_eq!(rule.status_code(), StatusCode::FORBIDDEN);

            let failure = HttpErrorResponse::from_dao(
                DaoError::DbAsyncPoolFailure(String::from("timed out")),
                DoesNotExistType::Video,
                "get video",
            );
            assert_eq!(failure.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(!failure.to_string().contains("timed out"));
        }

        #[actix_web::test]
        async fn test_error_body_is_json() {
            let resp = HttpErrorResponse::ConflictWithExisting(String::from(
                "Relation already requested",
            ))
            .error_response();

            assert_eq!(resp.status(), StatusCode::CONFLICT);

            let body = to_bytes(resp.into_body()).await.unwrap();
            let body: ServerErrorResponse = serde_json::from_slice(&body).unwrap();

            assert_eq!(body.err_type, ErrorType::ConflictWithExisting);
            assert!(body.err_message.contains("already requested"));
        }
    }
}
