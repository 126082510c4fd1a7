use actix_web::web::*;

use crate::handlers::auth;

use super::RouteLimiters;

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    cfg.service(
        scope("/auth")
            .service(
                resource("/register").route(
                    post()
                        .to(auth::register)
                        .wrap(limiters.credentials.clone()),
                ),
            )
            .service(
                resource("/login").route(post().to(auth::login).wrap(limiters.credentials.clone())),
            )
            .service(
                resource("/token/refresh").route(
                    post()
                        .to(auth::refresh_tokens)
                        .wrap(limiters.credentials),
                ),
            ),
    );
}
