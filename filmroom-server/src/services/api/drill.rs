use actix_web::web::*;

use crate::env;
use crate::handlers::drill;

use super::RouteLimiters;

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    cfg.service(
        scope("/drill")
            .service(
                resource("")
                    .app_data(PayloadConfig::new(env::CONF.max_drill_size_bytes))
                    .route(post().to(drill::create).wrap(limiters.uploads))
                    .route(delete().to(drill::delete)),
            )
            .service(resource("/list").route(post().to(drill::list)))
            .service(
                resource("/{drill_id}")
                    .route(get().to(drill::get))
                    .route(put().to(drill::update)),
            ),
    );
}
