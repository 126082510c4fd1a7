use actix_web::web::*;

use crate::env;
use crate::handlers::{annotation, video};

use super::RouteLimiters;

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    // Fixed paths are registered ahead of `/{video_id}` so they are not taken for ids
    cfg.service(
        scope("/video")
            .service(resource("/list").route(post().to(video::list)))
            .service(
                resource("/upload")
                    .app_data(PayloadConfig::new(env::CONF.max_video_size_bytes))
                    .route(post().to(video::upload).wrap(limiters.uploads)),
            )
            .service(resource("/delete").route(delete().to(video::delete)))
            .service(
                resource("/{video_id}/annotations")
                    .route(get().to(annotation::list))
                    .route(post().to(annotation::add)),
            )
            .service(
                resource("/{video_id}/annotations/{annotation_id}")
                    .route(put().to(annotation::update))
                    .route(delete().to(annotation::delete)),
            )
            .service(
                resource("/{video_id}")
                    .route(get().to(video::get))
                    .route(put().to(video::set_favourite)),
            ),
    );
}
