use actix_web::web::*;

use crate::handlers::user;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/user")
            .service(resource("/list").route(post().to(user::list)))
            .service(
                resource("/{user_id}")
                    .route(get().to(user::get))
                    .route(put().to(user::update))
                    .route(delete().to(user::delete)),
            ),
    );
}
