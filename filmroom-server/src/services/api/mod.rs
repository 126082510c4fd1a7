use std::time::Duration;

use actix_web::error::JsonPayloadError;
use actix_web::web::*;

use crate::handlers::error::HttpErrorResponse;
use crate::middleware::Limiter;

mod auth;
mod drill;
mod relation;
mod user;
mod video;

const MAX_JSON_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct RouteLimiters {
    pub credentials: Limiter,
    pub uploads: Limiter,
}

impl Default for RouteLimiters {
    fn default() -> Self {
        const CLEAR_FREQUENCY: Duration = Duration::from_secs(3600 * 24);

        Self {
            credentials: Limiter::new(20, Duration::from_secs(300), CLEAR_FREQUENCY),
            uploads: Limiter::new(30, Duration::from_secs(600), CLEAR_FREQUENCY),
        }
    }
}

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    cfg.service(
        scope("/api")
            .app_data(
                JsonConfig::default()
                    .limit(MAX_JSON_BODY_BYTES)
                    .error_handler(|err, _req| {
                        let resp = match err {
                            JsonPayloadError::Overflow { .. }
                            | JsonPayloadError::OverflowKnownLength { .. } => {
                                HttpErrorResponse::InputTooLarge(err.to_string())
                            }
                            _ => HttpErrorResponse::IncorrectlyFormed(err.to_string()),
                        };

                        resp.into()
                    }),
            )
            .app_data(QueryConfig::default().error_handler(|err, _req| {
                HttpErrorResponse::IncorrectlyFormed(err.to_string()).into()
            }))
            .app_data(PathConfig::default().error_handler(|err, _req| {
                HttpErrorResponse::IncorrectlyFormed(err.to_string()).into()
            }))
            .configure(|cfg| auth::configure(cfg, limiters.clone()))
            .configure(relation::configure)
            .configure(|cfg| video::configure(cfg, limiters.clone()))
            .configure(user::configure)
            .configure(|cfg| drill::configure(cfg, limiters)),
    );
}
