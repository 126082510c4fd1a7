use filmroom_common::db::DbAsyncPool;

use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::env;

#[derive(Deserialize)]
pub struct HealthKeyQuery {
    pub key: Option<String>,
}

pub async fn heartbeat() -> impl Responder {
    HttpResponse::Ok()
}

pub async fn health(
    db_async_pool: web::Data<DbAsyncPool>,
    query: web::Query<HealthKeyQuery>,
) -> impl Responder {
    if !health_key_matches(query.key.as_deref()) {
        return HttpResponse::Unauthorized().finish();
    }

    let pool_state = db_async_pool.state();
    HttpResponse::Ok().json(json!({
        "db_async_pool_state": {
            "connections": pool_state.connections,
            "idle_connections": pool_state.idle_connections,
        },
        "storage_enabled": env::CONF.storage_enabled,
    }))
}

/// Compares in time independent of where the keys differ.
fn health_key_matches(key: Option<&str>) -> bool {
    let Some(key) = key else {
        return false;
    };

    let correct_key = env::CONF.health_endpoint_key.as_bytes();
    let key = key.as_bytes();

    if key.is_empty() || correct_key.len() != key.len() {
        return false;
    }

    let difference = correct_key
        .iter()
        .zip(key)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    difference == 0
}
