use actix_web::web::*;

use crate::handlers::relation;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/relation")
            .service(resource("/request").route(post().to(relation::request)))
            .service(resource("/action").route(post().to(relation::action)))
            .service(resource("/coach/{coach_id}").route(get().to(relation::coach_overview)))
            .service(resource("/student/{student_id}").route(get().to(relation::student_history))),
    );
}
